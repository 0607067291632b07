use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// One top-level harvesting task: a start URL and the site module that
/// handles it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedConfig {
    /// Site module id, e.g. `"shopify"`.
    pub site: String,
    pub url: String,
    /// Extra domain globs to register with the module. Platform modules
    /// (Shopify) have no fixed domains and rely on this list.
    #[serde(default)]
    pub domains: Vec<String>,
    pub label: Option<String>,
    /// ISO 4217 code of the store's prices when the payloads do not carry
    /// one. Modules fall back to their own default when unset.
    #[serde(default)]
    pub currency: Option<String>,
}

impl SeedConfig {
    /// Host portion of `url`, lower-cased, without port.
    #[must_use]
    pub fn host(&self) -> Option<String> {
        let rest = self
            .url
            .strip_prefix("https://")
            .or_else(|| self.url.strip_prefix("http://"))?;
        let authority = rest.split(['/', '?', '#']).next()?;
        let host = authority.rsplit('@').next()?.split(':').next()?;
        (!host.is_empty()).then(|| host.to_ascii_lowercase())
    }
}

#[derive(Debug, Deserialize)]
pub struct SeedsFile {
    pub seeds: Vec<SeedConfig>,
}

/// Load and validate the seeds file from YAML.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_seeds(path: &Path) -> Result<SeedsFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::SeedsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_seeds(&content)
}

/// Parse and validate seeds from a YAML string.
///
/// # Errors
///
/// Returns `ConfigError` if the YAML is malformed or fails validation.
pub fn parse_seeds(content: &str) -> Result<SeedsFile, ConfigError> {
    let seeds_file: SeedsFile = serde_yaml::from_str(content)?;
    validate_seeds(&seeds_file)?;
    Ok(seeds_file)
}

fn validate_seeds(seeds_file: &SeedsFile) -> Result<(), ConfigError> {
    let mut seen_urls = HashSet::new();

    for seed in &seeds_file.seeds {
        if seed.site.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "seed '{}' has an empty site id",
                seed.url
            )));
        }

        if seed.host().is_none() {
            return Err(ConfigError::Validation(format!(
                "seed url '{}' is not an absolute http(s) URL",
                seed.url
            )));
        }

        if let Some(currency) = &seed.currency {
            if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(ConfigError::Validation(format!(
                    "seed '{}' has invalid currency '{currency}', expected a 3-letter ISO 4217 code",
                    seed.url
                )));
            }
        }

        if !seen_urls.insert(seed.url.trim_end_matches('/')) {
            return Err(ConfigError::Validation(format!(
                "duplicate seed url: '{}'",
                seed.url
            )));
        }
    }

    Ok(())
}
