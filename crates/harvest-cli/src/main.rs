use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{CommandFactory, Parser, Subcommand};
use harvest_cli::{build_registry, HttpTransport, Scheduler, SchedulerConfig};
use harvest_core::{AppConfig, CanonicalProduct, SeedConfig};
use harvest_scraper::{register_site, Emission, Emitted, ModuleRegistry, SiteModule, SITE_IDS};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "harvest")]
#[command(about = "Catalog harvesting command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Crawl seeds and write products to stdout as JSON lines.
    Crawl {
        /// Seeds file; defaults to `HARVEST_SEEDS_PATH`.
        #[arg(long, conflicts_with = "url")]
        seeds: Option<PathBuf>,
        /// Crawl a single URL instead of a seeds file.
        #[arg(long, requires = "site")]
        url: Option<String>,
        /// Site module for `--url`.
        #[arg(long, requires = "url")]
        site: Option<String>,
    },
    /// Print the page kind each site module assigns to a URL.
    Classify {
        url: String,
        /// Only ask this site module.
        #[arg(long)]
        site: Option<String>,
    },
    /// List site modules with their versions, page kinds and configured domains.
    Modules {
        #[arg(long)]
        seeds: Option<PathBuf>,
    },
}

/// One product as written to stdout.
#[derive(Debug, Serialize)]
struct ProductLine<'a> {
    task_id: &'a str,
    item_index: u64,
    emitted_at: DateTime<Utc>,
    product: &'a CanonicalProduct,
}

impl<'a> ProductLine<'a> {
    fn from_emission(emission: &'a Emission) -> Option<Self> {
        match &emission.emitted {
            Emitted::Product(product) => Some(Self {
                task_id: &emission.task_id,
                item_index: emission.item_index,
                emitted_at: emission.emitted_at,
                product,
            }),
            Emitted::Fetch { .. } => None,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = harvest_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Crawl { seeds, url, site }) => run_crawl(&config, seeds, url, site).await,
        Some(Commands::Classify { url, site }) => run_classify(&url, site.as_deref()),
        Some(Commands::Modules { seeds }) => {
            run_modules(seeds.as_deref().unwrap_or(&config.seeds_path))
        }
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    }
}

async fn run_crawl(
    config: &AppConfig,
    seeds_path: Option<PathBuf>,
    url: Option<String>,
    site: Option<String>,
) -> anyhow::Result<()> {
    let seeds = match (url, site) {
        (Some(url), Some(site)) => {
            let seed = SeedConfig {
                site,
                url,
                domains: Vec::new(),
                label: None,
                currency: None,
            };
            if seed.host().is_none() {
                anyhow::bail!("'{}' is not an absolute http(s) URL", seed.url);
            }
            vec![seed]
        }
        _ => {
            let path = seeds_path.unwrap_or_else(|| config.seeds_path.clone());
            harvest_core::load_seeds(&path)
                .with_context(|| format!("failed to load seeds from {}", path.display()))?
                .seeds
        }
    };
    if seeds.is_empty() {
        tracing::warn!("no seeds configured, nothing to crawl");
        return Ok(());
    }

    let registry = build_registry(&seeds)?;
    let transport = HttpTransport::new(config.request_timeout_secs, &config.user_agent);
    let scheduler = Scheduler::new(registry, transport, SchedulerConfig::from_app_config(config));

    let urls: Vec<String> = seeds.iter().map(|s| s.url.clone()).collect();
    let reports = scheduler.run(&urls, &write_product_line).await;

    let failed = reports.iter().filter(|r| !r.succeeded()).count();
    let products: usize = reports.iter().map(|r| r.products).sum();
    tracing::info!(tasks = reports.len(), failed, products, "crawl finished");
    if failed > 0 {
        anyhow::bail!("{failed} of {} tasks failed", reports.len());
    }
    Ok(())
}

fn write_product_line(emission: &Emission) {
    let Some(line) = ProductLine::from_emission(emission) else {
        return;
    };
    match serde_json::to_string(&line) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::error!(
            task_id = %emission.task_id,
            item_index = emission.item_index,
            error = %e,
            "failed to serialize product"
        ),
    }
}

fn run_classify(url: &str, site: Option<&str>) -> anyhow::Result<()> {
    let host = url::Url::parse(url)
        .with_context(|| format!("invalid URL '{url}'"))?
        .host_str()
        .map(str::to_owned)
        .with_context(|| format!("URL '{url}' has no host"))?;

    let sites: Vec<&str> = match site {
        Some(site) => vec![site],
        None => SITE_IDS.to_vec(),
    };
    let mut registry = ModuleRegistry::default();
    for site in sites {
        if !register_site(&mut registry, site, vec![host.clone()])? {
            anyhow::bail!(
                "unknown site module '{site}', expected one of: {}",
                SITE_IDS.join(", ")
            );
        }
    }

    for module in registry.iter() {
        match module.classifier().classify(url) {
            Ok(kind) => println!("{}\t{kind}", module.id()),
            Err(_) => println!("{}\tunsupported", module.id()),
        }
    }
    Ok(())
}

fn run_modules(seeds_path: &Path) -> anyhow::Result<()> {
    let configured = if seeds_path.exists() {
        let seeds = harvest_core::load_seeds(seeds_path)
            .with_context(|| format!("failed to load seeds from {}", seeds_path.display()))?;
        build_registry(&seeds.seeds)?
    } else {
        tracing::debug!(path = %seeds_path.display(), "no seeds file, listing built-ins only");
        ModuleRegistry::default()
    };

    let mut builtin = ModuleRegistry::default();
    for site in SITE_IDS {
        register_site(&mut builtin, site, Vec::new())?;
    }

    for module in builtin.iter() {
        let domains = configured
            .get(module.id())
            .map(|m| m.allowed_domains().join(","))
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| "-".to_owned());
        println!("{}", module_line(module, &domains));
    }
    Ok(())
}

/// `id`, version, the page kinds the module classifies (deduplicated, in
/// rule order) and its domains, tab separated.
fn module_line(module: &dyn SiteModule, domains: &str) -> String {
    let mut kinds: Vec<String> = Vec::new();
    for kind in module.classifier().kinds() {
        let kind = kind.to_string();
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    format!(
        "{}\tv{}\t{}\t{domains}",
        module.id(),
        module.version(),
        kinds.join(",")
    )
}
