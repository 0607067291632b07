//! Canonical catalog model and shared configuration for the harvesting
//! workspace.

pub mod app_config;
pub mod catalog;
pub mod config;
pub mod error;
pub mod price;
pub mod seeds;

pub use app_config::{AppConfig, Environment};
pub use catalog::{
    ensure_single_default, CanonicalProduct, CategoryPath, Media, MediaKind, Price, ReviewStats,
    Sku, SkuSpecOption, SpecAxis, Stock, StockStatus, CATEGORY_DEPTH,
};
pub use config::{load_app_config, load_app_config_from_env};
pub use error::{ConfigError, CoreError};
pub use price::{compute_discount, currency_exponent, parse_minor_units};
pub use seeds::{load_seeds, parse_seeds, SeedConfig, SeedsFile};
