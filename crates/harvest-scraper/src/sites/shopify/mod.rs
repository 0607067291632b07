//! Shopify storefronts.
//!
//! Shopify is a platform, so the served domains come from configuration.
//! HTML collection and product pages are not parsed; they emit a fetch for
//! the matching JSON endpoint, whose response is then extracted.
//!
//! ## Pagination
//!
//! Stores on cursor pagination send a `Link` header with a `page_info`
//! cursor; its absence on such a store marks the last page. Stores without
//! a `Link` header get page-number continuation while pages come back full.

mod normalize;
mod types;

pub use normalize::{normalize_product, StoreContext};
pub use types::{ShopifyProduct, ShopifyProductResponse, ShopifyProductsResponse};

use url::Url;

use crate::canonical::origin_of;
use crate::classify::{Classifier, PageKind};
use crate::cursor::PaginationCursor;
use crate::error::HarvestError;
use crate::extract::Output;
use crate::fetch::{FetchDescriptor, Response};
use crate::pagination::{next_link_cursor, PageWindow};
use crate::site::SiteModule;
use crate::sites::StoreCurrencies;

/// Maximum page size the storefront API accepts.
pub const MAX_PAGE_LIMIT: u32 = 250;

pub const DEFAULT_CURRENCY: &str = "USD";

#[derive(Debug, Clone)]
pub struct ShopifyModule {
    domains: Vec<String>,
    currencies: StoreCurrencies,
    page_limit: u32,
    classifier: Classifier,
}

impl ShopifyModule {
    pub const ID: &'static str = "shopify";

    /// # Errors
    ///
    /// Returns an error if a built-in URL pattern fails to compile.
    pub fn new(domains: Vec<String>) -> Result<Self, regex::Error> {
        let classifier = Classifier::new(&[
            (PageKind::Detail, r"^/products/[^/]+\.js(?:on)?(?:\?|$)"),
            (
                PageKind::Detail,
                r"^/(?:collections/[^/]+/)?products/[^/.?]+/?(?:\?|$)",
            ),
            (PageKind::Catalog, r"^/products\.json(?:\?|$)"),
            (PageKind::Listing, r"^/collections/[^/]+/products\.json(?:\?|$)"),
            (PageKind::Listing, r"^/collections/[^/.?]+/?(?:\?|$)"),
        ])?;
        Ok(Self {
            domains,
            currencies: StoreCurrencies::new(DEFAULT_CURRENCY),
            page_limit: MAX_PAGE_LIMIT,
            classifier,
        })
    }

    /// Prices of stores matching `domain` are in `currency`. Product JSON
    /// carries no currency, so stores outside USD need this.
    #[must_use]
    pub fn with_store_currency(mut self, domain: &str, currency: &str) -> Self {
        self.currencies.insert(domain, currency);
        self
    }

    /// Page size requested on JSON list endpoints, capped at
    /// [`MAX_PAGE_LIMIT`].
    #[must_use]
    pub fn with_page_limit(mut self, limit: u32) -> Self {
        self.page_limit = limit.clamp(1, MAX_PAGE_LIMIT);
        self
    }

    fn extract_detail(&self, response: &Response, url: &Url) -> Result<Vec<Output>, HarvestError> {
        let path = url.path();
        if !is_json_endpoint(path) {
            let handle = path
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .unwrap_or_default();
            let json_url = join(url, &format!("/products/{handle}.json"))?;
            return Ok(vec![Output::fetch(
                FetchDescriptor::get(json_url.to_string()),
                PageKind::Detail,
            )]);
        }

        ensure_json_body(response, "product JSON")?;
        let product = if path.ends_with(".js") {
            serde_json::from_str::<ShopifyProduct>(&response.body)
        } else {
            serde_json::from_str::<ShopifyProductResponse>(&response.body).map(|r| r.product)
        }
        .map_err(|source| HarvestError::Deserialize {
            context: format!("shopify product {}", response.url),
            source,
        })?;

        let origin = origin_of(&response.url).unwrap_or_default();
        let store = StoreContext {
            origin: &origin,
            crawl_url: &response.url,
            currency: self.currencies.for_url(&response.url),
        };
        Ok(vec![Output::product(normalize_product(product, &store)?)])
    }

    fn extract_list(
        &self,
        kind: PageKind,
        response: &Response,
        url: &Url,
    ) -> Result<Vec<Output>, HarvestError> {
        if !is_json_endpoint(url.path()) {
            let json_path = format!("{}/products.json", url.path().trim_end_matches('/'));
            let mut json_url = join(url, &json_path)?;
            json_url
                .query_pairs_mut()
                .append_pair("limit", &self.page_limit.to_string());
            return Ok(vec![Output::fetch(
                FetchDescriptor::get(json_url.to_string()),
                kind,
            )]);
        }

        ensure_json_body(response, "products JSON")?;
        let page: ShopifyProductsResponse =
            serde_json::from_str(&response.body).map_err(|source| HarvestError::Deserialize {
                context: format!("shopify products {}", response.url),
                source,
            })?;
        let observed = page.products.len();

        let origin = origin_of(&response.url).unwrap_or_default();
        let store = StoreContext {
            origin: &origin,
            crawl_url: &response.url,
            currency: self.currencies.for_url(&response.url),
        };

        let mut outputs: Vec<Output> = page
            .products
            .into_iter()
            .filter_map(|raw| {
                let id = raw.id;
                let normalized = normalize_product(raw, &store).and_then(|product| {
                    product.validate()?;
                    Ok(product)
                });
                match normalized {
                    Ok(product) => Some(Output::product(product)),
                    Err(e) => {
                        tracing::warn!(
                            url = %response.url,
                            product_id = id,
                            error = %e,
                            "skipping invalid product"
                        );
                        None
                    }
                }
            })
            .collect();

        if let Some(next) = self.next_page_url(response, url, observed as u64) {
            outputs.push(Output::fetch(FetchDescriptor::get(next), kind));
        }
        Ok(outputs)
    }

    /// URL of the page after this one, if any.
    fn next_page_url(
        &self,
        response: &Response,
        url: &Url,
        observed: u64,
    ) -> Option<String> {
        let query = |key: &str| {
            url.query_pairs()
                .find(|(k, _)| k == key)
                .and_then(|(_, v)| v.parse::<u64>().ok())
        };
        let limit = query("limit").unwrap_or(u64::from(self.page_limit));

        let mut next = url.clone();
        if let Some(link) = response.header("link") {
            let cursor = next_link_cursor(Some(link), "page_info")?;
            next.query_pairs_mut()
                .clear()
                .append_pair("limit", &limit.to_string())
                .append_pair("page_info", &cursor);
            return Some(next.to_string());
        }

        let page = query("page").unwrap_or(1).max(1);
        let window = PageWindow {
            offset: (page - 1).saturating_mul(limit),
            observed,
            page_size: limit,
            total: None,
            reported_end: None,
        };
        window.next_offset()?;
        next.query_pairs_mut()
            .clear()
            .append_pair("limit", &limit.to_string())
            .append_pair("page", &(page + 1).to_string());
        Some(next.to_string())
    }
}

impl SiteModule for ShopifyModule {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn version(&self) -> u32 {
        2
    }

    fn allowed_domains(&self) -> &[String] {
        &self.domains
    }

    fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    fn block_markers(&self) -> &[&'static str] {
        &["challenge-platform", "cf-chl-"]
    }

    fn extract(
        &self,
        kind: PageKind,
        response: &Response,
        _cursor: PaginationCursor,
    ) -> Result<Vec<Output>, HarvestError> {
        let url = Url::parse(&response.url).map_err(|e| HarvestError::InvalidUrl {
            url: response.url.clone(),
            reason: e.to_string(),
        })?;
        match kind {
            PageKind::Detail => self.extract_detail(response, &url),
            PageKind::Listing | PageKind::Catalog => self.extract_list(kind, response, &url),
            PageKind::Search => Err(HarvestError::Unsupported {
                url: response.url.clone(),
            }),
        }
    }
}

fn is_json_endpoint(path: &str) -> bool {
    path.ends_with(".json") || path.ends_with(".js")
}

/// A storefront serving HTML where JSON was requested is showing a
/// password or challenge page.
fn ensure_json_body(response: &Response, payload: &'static str) -> Result<(), HarvestError> {
    if response.body.trim_start().starts_with('<') || response.body.trim().is_empty() {
        return Err(HarvestError::MissingPayload {
            url: response.url.clone(),
            payload,
        });
    }
    Ok(())
}

fn join(base: &Url, path: &str) -> Result<Url, HarvestError> {
    base.join(path).map_err(|e| HarvestError::InvalidUrl {
        url: base.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
