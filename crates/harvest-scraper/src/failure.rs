//! Failure classification.
//!
//! Maps every [`HarvestError`] onto the four-kind taxonomy the scheduler acts
//! on, and decides whether the session collaborator must drop cookies before
//! a retry.

use serde::{Deserialize, Serialize};

use crate::error::HarvestError;
use crate::fetch::Response;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No page kind or module for the URL. Terminal.
    Unsupported,
    /// Anti-bot block. Retry with a fresh session.
    AccessDenied,
    /// Expected structured data absent or malformed.
    ExtractionFailure,
    /// Surfaced from the transport, passed through unchanged.
    TransportFailure,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Unsupported => write!(f, "unsupported"),
            FailureKind::AccessDenied => write!(f, "access_denied"),
            FailureKind::ExtractionFailure => write!(f, "extraction_failure"),
            FailureKind::TransportFailure => write!(f, "transport_failure"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Failure {
    pub kind: FailureKind,
    /// Cookies/session for the domain must be cleared before retrying.
    pub requires_session_reset: bool,
    pub retryable: bool,
}

impl Failure {
    /// Classifies `err`.
    ///
    /// | error | kind | reset | retry |
    /// |-------|------|-------|-------|
    /// | `Unsupported`, `InvalidUrl` | Unsupported | no | no |
    /// | `AccessDenied` | AccessDenied | yes | yes |
    /// | `MissingPayload` | ExtractionFailure | yes | yes |
    /// | `Extraction`, `Deserialize`, `Normalization`, `Entity` | ExtractionFailure | no | yes |
    /// | `HttpStatus`, `Transport` | TransportFailure | no | yes |
    #[must_use]
    pub fn classify(err: &HarvestError) -> Self {
        let (kind, requires_session_reset, retryable) = match err {
            HarvestError::Unsupported { .. } | HarvestError::InvalidUrl { .. } => {
                (FailureKind::Unsupported, false, false)
            }
            HarvestError::AccessDenied { .. } => (FailureKind::AccessDenied, true, true),
            HarvestError::MissingPayload { .. } => (FailureKind::ExtractionFailure, true, true),
            HarvestError::Extraction { .. }
            | HarvestError::Deserialize { .. }
            | HarvestError::Normalization { .. }
            | HarvestError::Entity(_) => (FailureKind::ExtractionFailure, false, true),
            HarvestError::HttpStatus { .. } | HarvestError::Transport { .. } => {
                (FailureKind::TransportFailure, false, true)
            }
        };
        Self {
            kind,
            requires_session_reset,
            retryable,
        }
    }
}

impl HarvestError {
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        Failure::classify(self).kind
    }

    #[must_use]
    pub fn requires_session_reset(&self) -> bool {
        Failure::classify(self).requires_session_reset
    }

    /// Logs the error at the level its kind calls for: `Unsupported` as a
    /// configuration error, block and extraction failures as transient.
    pub fn log(&self, task_id: &str) {
        let failure = Failure::classify(self);
        match failure.kind {
            FailureKind::Unsupported => tracing::error!(
                task_id,
                kind = %failure.kind,
                error = %self,
                "unsupported URL, module patterns may have drifted from the site"
            ),
            FailureKind::AccessDenied | FailureKind::ExtractionFailure => tracing::warn!(
                task_id,
                kind = %failure.kind,
                requires_session_reset = failure.requires_session_reset,
                error = %self,
                "transient harvest failure, retry with fresh session state"
            ),
            FailureKind::TransportFailure => tracing::warn!(
                task_id,
                kind = %failure.kind,
                error = %self,
                "transport failure"
            ),
        }
    }
}

/// Detects an anti-bot block: HTTP 403, or any of `markers` appearing in the
/// body (case-insensitive).
#[must_use]
pub fn detect_block(response: &Response, markers: &[&str]) -> Option<HarvestError> {
    if response.status == 403 {
        return Some(HarvestError::AccessDenied {
            url: response.url.clone(),
            reason: "HTTP 403".to_owned(),
        });
    }
    if markers.is_empty() {
        return None;
    }
    let body = response.body.to_lowercase();
    markers
        .iter()
        .find(|m| body.contains(&m.to_lowercase()))
        .map(|m| HarvestError::AccessDenied {
            url: response.url.clone(),
            reason: format!("block marker \"{m}\" in body"),
        })
}
