//! Task scheduler: fetches, re-invokes the engine, follows emitted fetches.
//!
//! Pages of one task run strictly in sequence because each continuation
//! depends on the page before it. Different top-level tasks run
//! concurrently, bounded by `max_concurrent_tasks`.

use std::borrow::Borrow;
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use harvest_core::{AppConfig, SeedConfig};
use harvest_scraper::{
    register_site_with_currencies, CrawlOptions, Emission, Emitted, FetchDescriptor, HarvestError,
    ModuleRegistry, TaskOutcome, TaskState, SITE_IDS,
};
use tracing::Instrument;
use url::Url;

use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::transport::HttpTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub max_concurrent_tasks: usize,
    /// Steps allowed per task before it is cut short.
    pub max_requests_per_task: usize,
    /// Pause between consecutive steps of one task.
    pub inter_request_delay: Duration,
    pub retry: RetryPolicy,
}

impl SchedulerConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_concurrent_tasks: config.max_concurrent_tasks,
            max_requests_per_task: config.max_requests_per_task,
            inter_request_delay: Duration::from_millis(config.inter_request_delay_ms),
            retry: RetryPolicy::new(
                config.max_retries,
                config.retry_backoff_base_secs.saturating_mul(1_000),
            ),
        }
    }
}

/// How one top-level task ended.
#[derive(Debug)]
pub struct TaskReport {
    pub seed_url: String,
    /// `None` when the seed never resolved to a module.
    pub task_id: Option<String>,
    pub products: usize,
    /// Steps executed, not counting retries.
    pub requests: usize,
    /// The task hit `max_requests_per_task` with fetches still queued.
    pub truncated: bool,
    pub error: Option<HarvestError>,
}

impl TaskReport {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

struct Job {
    descriptor: FetchDescriptor,
    state: TaskState,
    options: CrawlOptions,
}

/// A failed step and whatever it emitted before failing.
struct StepFailure {
    error: HarvestError,
    emitted: Vec<Emission>,
}

impl Borrow<HarvestError> for StepFailure {
    fn borrow(&self) -> &HarvestError {
        &self.error
    }
}

impl From<HarvestError> for StepFailure {
    fn from(error: HarvestError) -> Self {
        Self {
            error,
            emitted: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct Scheduler {
    registry: ModuleRegistry,
    transport: HttpTransport,
    config: SchedulerConfig,
}

impl Scheduler {
    #[must_use]
    pub fn new(registry: ModuleRegistry, transport: HttpTransport, config: SchedulerConfig) -> Self {
        Self {
            registry,
            transport,
            config,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    #[must_use]
    pub fn transport(&self) -> &HttpTransport {
        &self.transport
    }

    /// Runs one task per seed URL and returns the reports in completion
    /// order. `sink` sees every committed emission of every task.
    pub async fn run(&self, seed_urls: &[String], sink: &dyn Fn(&Emission)) -> Vec<TaskReport> {
        let max_concurrent = self.config.max_concurrent_tasks.max(1);
        stream::iter(seed_urls)
            .map(|url| self.run_task(url, sink))
            .buffer_unordered(max_concurrent)
            .collect()
            .await
    }

    /// Runs the task rooted at `seed_url` until no fetches remain, a step
    /// fails after retries, or the request budget is spent.
    ///
    /// A step's emissions reach `sink` only once the step is final: a
    /// retried step contributes the output of its successful attempt, and a
    /// failed step the partial output of its last attempt.
    pub async fn run_task(&self, seed_url: &str, sink: &dyn Fn(&Emission)) -> TaskReport {
        let mut report = TaskReport {
            seed_url: seed_url.to_owned(),
            task_id: None,
            products: 0,
            requests: 0,
            truncated: false,
            error: None,
        };

        let module = match self.registry.resolve(seed_url) {
            Ok(module) => module,
            Err(err) => {
                tracing::error!(url = seed_url, error = %err, "seed matches no site module");
                report.error = Some(err);
                return report;
            }
        };
        let root = TaskState::root(module.id());
        report.task_id = Some(root.task_id.clone());

        let span = tracing::info_span!("task", task_id = %root.task_id, site = module.id());
        let mut queue = VecDeque::from([Job {
            descriptor: FetchDescriptor::get(seed_url),
            options: module.default_options(seed_url),
            state: root,
        }]);

        async {
            while let Some(job) = queue.pop_front() {
                if report.requests >= self.config.max_requests_per_task {
                    tracing::warn!(
                        max_requests_per_task = self.config.max_requests_per_task,
                        queued = queue.len() + 1,
                        "request budget spent, stopping task"
                    );
                    report.truncated = true;
                    break;
                }
                if report.requests > 0 && !self.config.inter_request_delay.is_zero() {
                    tokio::time::sleep(self.config.inter_request_delay).await;
                }
                report.requests += 1;

                match retry_with_backoff(self.config.retry, || self.step(&job)).await {
                    Ok((emitted, outcome)) => {
                        tracing::debug!(
                            url = %job.descriptor.url,
                            page_kind = ?outcome.kind,
                            products = outcome.products,
                            fetches = outcome.fetches,
                            item_index = outcome.cursor.item_index(),
                            "step complete"
                        );
                        for emission in &emitted {
                            commit(emission, &mut report, &mut queue, sink);
                        }
                    }
                    Err(failure) => {
                        for emission in &failure.emitted {
                            commit(emission, &mut report, &mut queue, sink);
                        }
                        tracing::error!(
                            url = %job.descriptor.url,
                            kind = %failure.error.kind(),
                            error = %failure.error,
                            "task failed"
                        );
                        report.error = Some(failure.error);
                        break;
                    }
                }
            }
            tracing::info!(
                products = report.products,
                requests = report.requests,
                truncated = report.truncated,
                succeeded = report.error.is_none(),
                "task finished"
            );
        }
        .instrument(span)
        .await;

        report
    }

    /// One fetch plus one engine step. Errors that call for a session reset
    /// clear the host's cookies before they are returned.
    async fn step(&self, job: &Job) -> Result<(Vec<Emission>, TaskOutcome), StepFailure> {
        let response = self.transport.fetch(&job.descriptor, &job.options).await?;

        let mut emitted = Vec::new();
        let result = self
            .registry
            .handle(job.state.clone(), &response, &mut |e| emitted.push(e));
        match result {
            Ok(outcome) => Ok((emitted, outcome)),
            Err(error) => {
                if error.requires_session_reset() {
                    if let Some(domain) = host_of(&job.descriptor.url) {
                        self.transport.clear(&domain).await;
                    }
                }
                Err(StepFailure { error, emitted })
            }
        }
    }
}

/// Counts and forwards one emission, queueing the fetches it carries.
fn commit(
    emission: &Emission,
    report: &mut TaskReport,
    queue: &mut VecDeque<Job>,
    sink: &dyn Fn(&Emission),
) {
    match &emission.emitted {
        Emitted::Product(_) => report.products += 1,
        Emitted::Fetch {
            descriptor,
            state,
            options,
            ..
        } => queue.push_back(Job {
            descriptor: descriptor.clone(),
            state: state.clone(),
            options: options.clone(),
        }),
    }
    sink(emission);
}

fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
}

/// Builds a registry serving every seed: one module per site id, serving the
/// seeds' `domains`, or their hosts when a seed lists none. A seed's
/// `currency` applies to those same domains.
///
/// # Errors
///
/// Returns an error if a seed names an unknown site module or a built-in
/// pattern fails to compile.
pub fn build_registry(seeds: &[SeedConfig]) -> anyhow::Result<ModuleRegistry> {
    let mut by_site: BTreeMap<&str, SiteSetup> = BTreeMap::new();
    for seed in seeds {
        let setup = by_site.entry(seed.site.as_str()).or_default();
        let seed_domains = if seed.domains.is_empty() {
            seed.host().into_iter().collect()
        } else {
            seed.domains.clone()
        };
        for domain in seed_domains {
            if let Some(currency) = &seed.currency {
                setup.currencies.push((domain.clone(), currency.clone()));
            }
            if !setup.domains.contains(&domain) {
                setup.domains.push(domain);
            }
        }
    }

    let mut registry = ModuleRegistry::default();
    for (site, setup) in by_site {
        tracing::debug!(
            site,
            domains = ?setup.domains,
            currencies = ?setup.currencies,
            "registering site module"
        );
        if !register_site_with_currencies(&mut registry, site, setup.domains, &setup.currencies)? {
            anyhow::bail!(
                "unknown site module '{site}', expected one of: {}",
                SITE_IDS.join(", ")
            );
        }
    }
    Ok(registry)
}

#[derive(Debug, Default)]
struct SiteSetup {
    domains: Vec<String>,
    currencies: Vec<(String, String)>,
}
