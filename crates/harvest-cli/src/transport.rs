//! HTTP transport with one cookie session per domain.
//!
//! Each host gets its own `reqwest` client and cookie jar so that
//! [`HttpTransport::clear`] can drop one site's session without touching the
//! others. The transport never interprets status codes; every response,
//! including 4xx/5xx, goes back to the engine for classification.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use harvest_scraper::{CrawlOptions, FetchDescriptor, HarvestError, Method, Response};
use reqwest::cookie::Jar;
use reqwest::Client;
use tokio::sync::Mutex;
use url::Url;

struct Session {
    client: Client,
    jar: Arc<Jar>,
    initialized: bool,
}

pub struct HttpTransport {
    timeout: Duration,
    user_agent: String,
    sessions: Mutex<HashMap<String, Session>>,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    #[must_use]
    pub fn new(timeout_secs: u64, user_agent: &str) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_secs),
            user_agent: user_agent.to_owned(),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Drops the cookie session for `domain`. The next request to it starts
    /// a fresh session, re-running session init when the module asks for it.
    pub async fn clear(&self, domain: &str) {
        let removed = self
            .sessions
            .lock()
            .await
            .remove(&domain.to_ascii_lowercase())
            .is_some();
        tracing::info!(domain, removed, "cleared session");
    }

    /// `true` when a session for `domain` is live.
    pub async fn has_session(&self, domain: &str) -> bool {
        self.sessions
            .lock()
            .await
            .contains_key(&domain.to_ascii_lowercase())
    }

    /// Executes `descriptor` with the session of its host.
    ///
    /// # Errors
    ///
    /// - [`HarvestError::InvalidUrl`] when the URL does not parse or has no
    ///   host.
    /// - [`HarvestError::Transport`] on connection, timeout or body read
    ///   failures.
    pub async fn fetch(
        &self,
        descriptor: &FetchDescriptor,
        options: &CrawlOptions,
    ) -> Result<Response, HarvestError> {
        let url = Url::parse(&descriptor.url).map_err(|e| HarvestError::InvalidUrl {
            url: descriptor.url.clone(),
            reason: e.to_string(),
        })?;
        let domain = session_domain(&url)?;

        if options.headless_enabled {
            tracing::debug!(url = %url, "headless rendering unavailable, fetching directly");
        }
        tracing::debug!(
            method = %descriptor.method,
            url = %url,
            reliability_tier = ?options.reliability_tier,
            "fetch"
        );

        let (client, jar, needs_init) = self.session(&domain, options).await?;
        for (name, value) in &options.required_cookies {
            jar.add_cookie_str(&format!("{name}={value}"), &url);
        }
        if needs_init {
            initialize(&client, &url).await;
        }

        let mut request = match descriptor.method {
            Method::Get => client.get(url.clone()),
            Method::Post => client.post(url.clone()),
        };
        for (name, value) in options.required_headers.iter().chain(&descriptor.headers) {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &descriptor.body {
            request = request.body(body.clone());
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(&descriptor.url, e))?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_owned(), v.to_owned()))
            })
            .collect();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(&descriptor.url, e))?;

        tracing::debug!(url = %final_url, status, bytes = body.len(), "fetched");
        Ok(Response {
            url: final_url,
            status,
            headers,
            body,
        })
    }

    /// Client and jar for `domain`, creating the session on first use.
    /// The flag is `true` when the caller must run session init.
    async fn session(
        &self,
        domain: &str,
        options: &CrawlOptions,
    ) -> Result<(Client, Arc<Jar>, bool), HarvestError> {
        let mut sessions = self.sessions.lock().await;
        let session = match sessions.entry(domain.to_owned()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let jar = Arc::new(Jar::default());
                let client = Client::builder()
                    .timeout(self.timeout)
                    .connect_timeout(Duration::from_secs(10))
                    .user_agent(&self.user_agent)
                    .cookie_provider(Arc::clone(&jar))
                    .build()
                    .map_err(|e| transport_error(domain, e))?;
                tracing::debug!(domain, "new session");
                entry.insert(Session {
                    client,
                    jar,
                    initialized: false,
                })
            }
        };
        let needs_init = options.session_init_enabled && !session.initialized;
        session.initialized |= needs_init;
        Ok((session.client.clone(), Arc::clone(&session.jar), needs_init))
    }
}

/// Visits the site root so the session picks up its cookies. Failures are
/// logged; the real request still goes out.
async fn initialize(client: &Client, url: &Url) {
    let mut root = url.clone();
    root.set_path("/");
    root.set_query(None);
    root.set_fragment(None);
    match client.get(root.clone()).send().await {
        Ok(response) => {
            tracing::debug!(url = %root, status = response.status().as_u16(), "session initialized");
        }
        Err(e) => tracing::warn!(url = %root, error = %e, "session init request failed"),
    }
}

fn session_domain(url: &Url) -> Result<String, HarvestError> {
    url.host_str()
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| HarvestError::InvalidUrl {
            url: url.to_string(),
            reason: "no host".to_owned(),
        })
}

fn transport_error(url: &str, source: reqwest::Error) -> HarvestError {
    HarvestError::Transport {
        url: url.to_owned(),
        source: Box::new(source),
    }
}
