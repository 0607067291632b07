pub mod canonical;
pub mod classify;
pub mod cursor;
pub mod engine;
pub mod error;
pub mod extract;
pub mod failure;
pub mod fetch;
pub mod pagination;
pub mod registry;
pub mod site;
pub mod sites;

pub use canonical::canonicalize;
pub use classify::{Classifier, PageKind};
pub use cursor::{PaginationCursor, TaskState};
pub use engine::{Emission, Emitted, Engine, TaskOutcome};
pub use error::HarvestError;
pub use extract::Output;
pub use failure::{Failure, FailureKind};
pub use fetch::{CrawlOptions, FetchDescriptor, Method, ReliabilityTier, Response};
pub use pagination::PageWindow;
pub use registry::{domain_matches, ModuleRegistry};
pub use site::SiteModule;
pub use sites::{
    register_site, register_site_with_currencies, DemandwareModule, ShopifyModule, SITE_IDS,
};
