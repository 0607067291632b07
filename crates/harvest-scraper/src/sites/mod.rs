//! Built-in site modules.

pub mod demandware;
pub mod shopify;

pub use demandware::DemandwareModule;
pub use shopify::ShopifyModule;

use url::Url;

use crate::registry::{domain_matches, ModuleRegistry};

/// Ids of the built-in modules.
pub const SITE_IDS: [&str; 2] = [ShopifyModule::ID, DemandwareModule::ID];

/// Currency per store domain glob, with a fallback for unlisted hosts.
#[derive(Debug, Clone)]
pub(crate) struct StoreCurrencies {
    fallback: String,
    by_domain: Vec<(String, String)>,
}

impl StoreCurrencies {
    pub(crate) fn new(fallback: &str) -> Self {
        Self {
            fallback: fallback.to_ascii_uppercase(),
            by_domain: Vec::new(),
        }
    }

    /// Earlier entries win when globs overlap.
    pub(crate) fn insert(&mut self, domain: &str, currency: &str) {
        self.by_domain
            .push((domain.to_owned(), currency.to_ascii_uppercase()));
    }

    pub(crate) fn for_url(&self, url: &str) -> &str {
        let host = Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_owned));
        host.and_then(|host| {
            self.by_domain
                .iter()
                .find(|(glob, _)| domain_matches(glob, &host))
        })
        .map_or(self.fallback.as_str(), |(_, currency)| currency.as_str())
    }
}

/// Registers built-in module `site` serving `domains`.
///
/// Returns `Ok(false)` when `site` names no built-in module.
///
/// # Errors
///
/// Returns an error if a built-in URL pattern fails to compile.
pub fn register_site(
    registry: &mut ModuleRegistry,
    site: &str,
    domains: Vec<String>,
) -> Result<bool, regex::Error> {
    register_site_with_currencies(registry, site, domains, &[])
}

/// [`register_site`] with `(domain glob, currency)` pairs for stores whose
/// prices are not in the module's default currency.
///
/// # Errors
///
/// Returns an error if a built-in URL pattern fails to compile.
pub fn register_site_with_currencies(
    registry: &mut ModuleRegistry,
    site: &str,
    domains: Vec<String>,
    currencies: &[(String, String)],
) -> Result<bool, regex::Error> {
    match site {
        ShopifyModule::ID => {
            let module = currencies
                .iter()
                .fold(ShopifyModule::new(domains)?, |m, (domain, currency)| {
                    m.with_store_currency(domain, currency)
                });
            registry.register(module);
        }
        DemandwareModule::ID => {
            let module = currencies
                .iter()
                .fold(DemandwareModule::new(domains)?, |m, (domain, currency)| {
                    m.with_store_currency(domain, currency)
                });
            registry.register(module);
        }
        _ => return Ok(false),
    }
    Ok(true)
}
