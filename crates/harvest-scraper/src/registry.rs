//! Site module lookup by host.

use url::Url;

use crate::cursor::TaskState;
use crate::engine::{Emission, Engine, TaskOutcome};
use crate::error::HarvestError;
use crate::fetch::Response;
use crate::site::SiteModule;

/// Holds the registered site modules and routes URLs to them.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: Vec<Box<dyn SiteModule>>,
    engine: Engine,
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.modules.iter().map(|m| m.id()).collect::<Vec<_>>())
            .field("engine", &self.engine)
            .finish()
    }
}

impl ModuleRegistry {
    #[must_use]
    pub fn new(engine: Engine) -> Self {
        Self {
            modules: Vec::new(),
            engine,
        }
    }

    /// Adds `module`. Modules registered earlier win when domains overlap.
    pub fn register(&mut self, module: impl SiteModule + 'static) -> &mut Self {
        self.modules.push(Box::new(module));
        self
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&dyn SiteModule> {
        self.modules
            .iter()
            .find(|m| m.id() == id)
            .map(Box::as_ref)
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn SiteModule> {
        self.modules.iter().map(Box::as_ref)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Finds the module whose `allowed_domains` match the host of `url`.
    ///
    /// # Errors
    ///
    /// - [`HarvestError::InvalidUrl`] when `url` has no host.
    /// - [`HarvestError::Unsupported`] when no module serves the host.
    pub fn resolve(&self, url: &str) -> Result<&dyn SiteModule, HarvestError> {
        let host = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_owned))
            .ok_or_else(|| HarvestError::InvalidUrl {
                url: url.to_owned(),
                reason: "no host".to_owned(),
            })?;

        self.iter()
            .find(|m| m.allowed_domains().iter().any(|g| domain_matches(g, &host)))
            .ok_or_else(|| HarvestError::Unsupported {
                url: url.to_owned(),
            })
    }

    /// Runs one engine step with the module named by `state.site`.
    ///
    /// # Errors
    ///
    /// [`HarvestError::Unsupported`] when no module has that id, otherwise
    /// see [`Engine::handle`].
    pub fn handle(
        &self,
        state: TaskState,
        response: &Response,
        emit: &mut dyn FnMut(Emission),
    ) -> Result<TaskOutcome, HarvestError> {
        let module = self
            .get(&state.site)
            .ok_or_else(|| HarvestError::Unsupported {
                url: response.url.clone(),
            })?;
        self.engine.handle(module, state, response, emit)
    }
}

/// Case-insensitive host match. `*` matches any host; `*.example.com`
/// matches `example.com` and any subdomain of it.
#[must_use]
pub fn domain_matches(glob: &str, host: &str) -> bool {
    let glob = glob.trim().to_ascii_lowercase();
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    if glob == "*" {
        return true;
    }
    match glob.strip_prefix("*.") {
        Some(apex) => host == apex || host.ends_with(&format!(".{apex}")),
        None => host == glob,
    }
}
