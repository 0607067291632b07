use thiserror::Error;

/// Everything that can stop one traversal step.
///
/// Each variant maps onto exactly one [`crate::FailureKind`]; see
/// [`crate::Failure::classify`].
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("no page kind matches {url}")]
    Unsupported { url: String },

    #[error("invalid URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("access denied at {url}: {reason}")]
    AccessDenied { url: String, reason: String },

    #[error("expected {payload} not found at {url}")]
    MissingPayload { url: String, payload: &'static str },

    #[error("extraction failed at {url}: {reason}")]
    Extraction { url: String, reason: String },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("normalization error for product {source_id}: {reason}")]
    Normalization { source_id: String, reason: String },

    #[error("invalid entity: {0}")]
    Entity(#[from] harvest_core::CoreError),

    #[error("unexpected HTTP status {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("transport error fetching {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}
