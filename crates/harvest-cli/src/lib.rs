//! Reference collaborators for the harvesting protocol: an HTTP transport
//! with per-domain sessions, retry with backoff, and a scheduler that feeds
//! responses back to the engine.

pub mod retry;
pub mod scheduler;
pub mod transport;

pub use retry::{is_retriable, retry_with_backoff, RetryPolicy};
pub use scheduler::{build_registry, Scheduler, SchedulerConfig, TaskReport};
pub use transport::HttpTransport;
