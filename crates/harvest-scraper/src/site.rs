//! The contract every site module satisfies.

use crate::canonical::canonicalize;
use crate::classify::{Classifier, PageKind};
use crate::cursor::{PaginationCursor, TaskState};
use crate::engine::{Emission, Engine, TaskOutcome};
use crate::error::HarvestError;
use crate::extract::Output;
use crate::fetch::{CrawlOptions, Response};

/// A per-site harvesting module.
///
/// Modules own only site knowledge: which URLs mean which [`PageKind`], and
/// how each kind's payload maps onto the catalog model. Traversal, cursor
/// bookkeeping, block detection and emission belong to [`Engine`].
pub trait SiteModule: Send + Sync {
    /// Stable identity, e.g. `"shopify"`.
    fn id(&self) -> &'static str;

    /// Bumped when extraction output changes shape.
    fn version(&self) -> u32;

    /// Host globs this module serves (`"shop.example.com"`, `"*.example.com"`).
    fn allowed_domains(&self) -> &[String];

    fn classifier(&self) -> &Classifier;

    /// Transport options for fetching `url`.
    fn default_options(&self, _url: &str) -> CrawlOptions {
        CrawlOptions::default()
    }

    /// Case-insensitive body markers that identify an anti-bot page.
    fn block_markers(&self) -> &[&'static str] {
        &[]
    }

    /// Canonical product URL for `raw`; relative URLs resolve against the
    /// module's first exact domain.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::InvalidUrl`] when `raw` cannot be resolved.
    fn canonical_url(&self, raw: &str) -> Result<String, HarvestError> {
        let base = self
            .allowed_domains()
            .iter()
            .find(|d| !d.contains('*'))
            .map(|d| format!("https://{d}"));
        canonicalize(raw, base.as_deref())
    }

    /// Extracts one classified response.
    ///
    /// `cursor` is the task position before this page; modules use it only to
    /// annotate output, never to advance it.
    ///
    /// # Errors
    ///
    /// - [`HarvestError::MissingPayload`] when the expected structured data
    ///   is absent.
    /// - [`HarvestError::Deserialize`] / [`HarvestError::Extraction`] when it
    ///   is present but malformed.
    /// - [`HarvestError::Unsupported`] when called with a kind the module
    ///   does not implement.
    fn extract(
        &self,
        kind: PageKind,
        response: &Response,
        cursor: PaginationCursor,
    ) -> Result<Vec<Output>, HarvestError>;

    /// Runs one traversal step for `response` with a default [`Engine`].
    ///
    /// # Errors
    ///
    /// See [`Engine::handle`].
    fn handle(
        &self,
        state: TaskState,
        response: &Response,
        emit: &mut dyn FnMut(Emission),
    ) -> Result<TaskOutcome, HarvestError>
    where
        Self: Sized,
    {
        Engine::default().handle(self, state, response, emit)
    }
}

impl std::fmt::Debug for dyn SiteModule + '_ {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteModule").field("id", &self.id()).finish()
    }
}
