//! URL-driven response classification.
//!
//! A [`Classifier`] holds an ordered list of `(PageKind, Regex)` rules and
//! tests them against the URL's path plus `?query`. The first matching rule
//! wins; no match is [`HarvestError::Unsupported`].

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::HarvestError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageKind {
    /// Keyword search results.
    Search,
    /// Category or collection grid.
    Listing,
    /// Whole-store product feed.
    Catalog,
    /// Single product page.
    Detail,
}

impl std::fmt::Display for PageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PageKind::Search => write!(f, "search"),
            PageKind::Listing => write!(f, "listing"),
            PageKind::Catalog => write!(f, "catalog"),
            PageKind::Detail => write!(f, "detail"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<(PageKind, Regex)>,
}

impl Classifier {
    /// Compiles `rules` in priority order.
    ///
    /// # Errors
    ///
    /// Returns the first pattern that fails to compile.
    pub fn new(rules: &[(PageKind, &str)]) -> Result<Self, regex::Error> {
        let rules = rules
            .iter()
            .map(|(kind, pattern)| Regex::new(pattern).map(|re| (*kind, re)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    /// Maps `url` to the first matching [`PageKind`].
    ///
    /// # Errors
    ///
    /// - [`HarvestError::InvalidUrl`] when `url` is not absolute.
    /// - [`HarvestError::Unsupported`] when no rule matches.
    pub fn classify(&self, url: &str) -> Result<PageKind, HarvestError> {
        let parsed = Url::parse(url).map_err(|e| HarvestError::InvalidUrl {
            url: url.to_owned(),
            reason: e.to_string(),
        })?;
        let target = match parsed.query() {
            Some(query) => format!("{}?{query}", parsed.path()),
            None => parsed.path().to_owned(),
        };

        self.rules
            .iter()
            .find(|(_, re)| re.is_match(&target))
            .map(|(kind, _)| *kind)
            .ok_or_else(|| HarvestError::Unsupported {
                url: url.to_owned(),
            })
    }

    /// Page kinds this classifier can produce, in priority order.
    pub fn kinds(&self) -> impl Iterator<Item = PageKind> + '_ {
        self.rules.iter().map(|(kind, _)| *kind)
    }
}
