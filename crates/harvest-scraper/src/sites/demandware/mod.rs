//! Salesforce Commerce Cloud (Demandware) storefronts.
//!
//! Category grids and search results embed a search-state object with the
//! page window (`start`, `end`, `pageSize`, `totalProductCount`) and one tile
//! per product. Product pages carry a JSON-LD `Product` block and, on most
//! storefronts, a `window.pdpData` object with the variation matrix.
//!
//! Continuation rewrites the current URL's `start` and `sz` query parameters,
//! which both the HTML grid and the `Search-UpdateGrid` AJAX endpoint accept.

mod detail;
mod listing;

use url::Url;

use crate::canonical::origin_of;
use crate::classify::{Classifier, PageKind};
use crate::cursor::PaginationCursor;
use crate::error::HarvestError;
use crate::extract::Output;
use crate::fetch::{CrawlOptions, FetchDescriptor, ReliabilityTier, Response};
use crate::pagination::PageWindow;
use crate::site::SiteModule;
use crate::sites::StoreCurrencies;

/// Body markers of the storefront's bot-management interstitials.
pub const BLOCK_MARKERS: &[&str] = &["automation detected", "px-captcha"];

#[derive(Debug, Clone)]
pub struct DemandwareModule {
    domains: Vec<String>,
    currencies: StoreCurrencies,
    classifier: Classifier,
}

impl DemandwareModule {
    pub const ID: &'static str = "demandware";

    /// # Errors
    ///
    /// Returns an error if a built-in URL pattern fails to compile.
    pub fn new(domains: Vec<String>) -> Result<Self, regex::Error> {
        let classifier = Classifier::new(&[
            (PageKind::Detail, r"^/p/[^/]+/[\w-]+\.html(?:\?|$)"),
            (PageKind::Listing, r"/Search-UpdateGrid(?:\?|$)"),
            (PageKind::Search, r"^/search/?\?(?:.*&)?q="),
            (PageKind::Listing, r"^/c/[^?]+"),
        ])?;
        Ok(Self {
            domains,
            currencies: StoreCurrencies::new("USD"),
            classifier,
        })
    }

    /// Currency assumed for hosts matching `domain` when a payload omits it.
    #[must_use]
    pub fn with_store_currency(mut self, domain: &str, currency: &str) -> Self {
        self.currencies.insert(domain, currency);
        self
    }

    fn extract_grid(&self, kind: PageKind, response: &Response) -> Result<Vec<Output>, HarvestError> {
        let origin = origin_of(&response.url).unwrap_or_default();
        let currency = self.currencies.for_url(&response.url);
        let page = listing::parse_grid(response, &origin, currency)?;

        let mut outputs: Vec<Output> = page.products.into_iter().map(Output::product).collect();
        if let Some(next) = page.window.next_offset() {
            let url = continuation_url(&response.url, next, page.window.page_size)?;
            outputs.push(Output::fetch(FetchDescriptor::get(url), kind));
        }
        Ok(outputs)
    }
}

impl SiteModule for DemandwareModule {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn version(&self) -> u32 {
        1
    }

    fn allowed_domains(&self) -> &[String] {
        &self.domains
    }

    fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// The bot manager sets its cookies on the first HTML hit, so sessions
    /// start at the site root and ride a residential tier.
    fn default_options(&self, _url: &str) -> CrawlOptions {
        CrawlOptions {
            session_init_enabled: true,
            reliability_tier: ReliabilityTier::Residential,
            required_headers: vec![("accept-language".to_owned(), "en-US,en;q=0.9".to_owned())],
            ..CrawlOptions::default()
        }
    }

    fn block_markers(&self) -> &[&'static str] {
        BLOCK_MARKERS
    }

    fn extract(
        &self,
        kind: PageKind,
        response: &Response,
        _cursor: PaginationCursor,
    ) -> Result<Vec<Output>, HarvestError> {
        match kind {
            PageKind::Listing | PageKind::Search => self.extract_grid(kind, response),
            PageKind::Detail => {
                let origin = origin_of(&response.url).unwrap_or_default();
                let currency = self.currencies.for_url(&response.url);
                let product = detail::parse_detail(response, &origin, currency)?;
                Ok(vec![Output::product(product)])
            }
            PageKind::Catalog => Err(HarvestError::Unsupported {
                url: response.url.clone(),
            }),
        }
    }
}

/// The window one grid page covered.
#[derive(Debug)]
pub(crate) struct GridPage {
    pub products: Vec<harvest_core::CanonicalProduct>,
    pub window: PageWindow,
}

/// `url` with `start` and `sz` replaced, all other parameters kept in order.
fn continuation_url(url: &str, start: u64, size: u64) -> Result<String, HarvestError> {
    let mut parsed = Url::parse(url).map_err(|e| HarvestError::InvalidUrl {
        url: url.to_owned(),
        reason: e.to_string(),
    })?;
    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| k != "start" && k != "sz")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    {
        let mut query = parsed.query_pairs_mut();
        query.clear();
        for (k, v) in &kept {
            query.append_pair(k, v);
        }
        query
            .append_pair("start", &start.to_string())
            .append_pair("sz", &size.to_string());
    }
    Ok(parsed.to_string())
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
