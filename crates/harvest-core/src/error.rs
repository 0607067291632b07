use thiserror::Error;

/// Violations of the canonical entity invariants.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid price \"{raw}\": {reason}")]
    InvalidPrice { raw: String, reason: String },

    #[error("product {source_id}: sku {sku_id} is priced in {sku_currency}, product in {product_currency}")]
    CurrencyMismatch {
        source_id: String,
        sku_id: String,
        sku_currency: String,
        product_currency: String,
    },

    #[error("product {source_id}: duplicate sku id {sku_id}")]
    DuplicateSku { source_id: String, sku_id: String },

    #[error("product {source_id}: sku {sku_id} has more than one {axis} option")]
    DuplicateSpecAxis {
        source_id: String,
        sku_id: String,
        axis: String,
    },

    #[error("product {source_id}: {reason}")]
    Invalid { source_id: String, reason: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read seeds file {path}: {source}")]
    SeedsFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse seeds file: {0}")]
    SeedsFileParse(#[from] serde_yaml::Error),

    #[error("seeds validation failed: {0}")]
    Validation(String),
}
