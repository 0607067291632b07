//! Scheduler and transport against a wiremock server.

use std::sync::Mutex;
use std::time::Duration;

use harvest_cli::{HttpTransport, RetryPolicy, Scheduler, SchedulerConfig};
use harvest_scraper::{
    register_site, CrawlOptions, Emission, Emitted, FetchDescriptor, HarvestError, ModuleRegistry,
};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(max_retries: u32, max_requests_per_task: usize) -> SchedulerConfig {
    SchedulerConfig {
        max_concurrent_tasks: 2,
        max_requests_per_task,
        inter_request_delay: Duration::ZERO,
        retry: RetryPolicy::new(max_retries, 0),
    }
}

fn scheduler(site: &str, config: SchedulerConfig) -> Scheduler {
    let mut registry = ModuleRegistry::default();
    register_site(&mut registry, site, vec!["127.0.0.1".to_owned()]).unwrap();
    Scheduler::new(registry, HttpTransport::new(5, "harvest-test/0.1"), config)
}

fn grid_page(total: u64, page_size: u64, start: u64) -> String {
    let count = page_size.min(total - start);
    let products: Vec<_> = (start..start + count)
        .map(|i| {
            json!({
                "id": format!("P{i}"),
                "name": format!("Jacket {i}"),
                "url": format!("/p/jacket-{i}/P{i}.html"),
                "price": {"sales": {"value": "50.00", "currency": "USD"}}
            })
        })
        .collect();
    let state = json!({
        "totalProductCount": total,
        "pageSize": page_size,
        "start": start,
        "end": start + count - 1,
        "products": products
    });
    format!(r#"<html><script id="searchState" type="application/json">{state}</script></html>"#)
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/html")
}

/// Runs `seed` and returns the item indices of everything committed.
async fn crawl(scheduler: &Scheduler, seed: &str) -> (harvest_cli::TaskReport, Vec<u64>) {
    let seen = Mutex::new(Vec::new());
    let sink = |e: &Emission| seen.lock().unwrap().push(e.item_index);
    let report = scheduler.run_task(seed, &sink).await;
    (report, seen.into_inner().unwrap())
}

async fn mount_listing(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/c/men"))
        .and(query_param("start", "56"))
        .respond_with(html(grid_page(80, 56, 56)))
        .with_priority(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/c/men"))
        .respond_with(html(grid_page(80, 56, 0)))
        .mount(server)
        .await;
}

#[tokio::test]
async fn follows_listing_continuation_to_the_last_page() {
    let server = MockServer::start().await;
    mount_listing(&server).await;

    let scheduler = scheduler("demandware", config(0, 10));
    let (report, indices) = crawl(&scheduler, &format!("{}/c/men", server.uri())).await;

    assert!(report.succeeded(), "unexpected error: {:?}", report.error);
    assert_eq!(report.products, 80);
    assert_eq!(report.requests, 2);
    assert!(!report.truncated);
    // 80 products plus the one continuation fetch, one running cursor.
    assert_eq!(indices, (1..=81).collect::<Vec<_>>());
}

#[tokio::test]
async fn blocked_step_is_retried_with_a_fresh_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/c/men"))
        .respond_with(ResponseTemplate::new(403))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/c/men"))
        .respond_with(html(grid_page(3, 56, 0)))
        .mount(&server)
        .await;

    let scheduler = scheduler("demandware", config(2, 10));
    let (report, indices) = crawl(&scheduler, &format!("{}/c/men", server.uri())).await;

    assert!(report.succeeded(), "unexpected error: {:?}", report.error);
    assert_eq!(report.products, 3);
    assert_eq!(report.requests, 1);
    // Only the successful attempt is committed.
    assert_eq!(indices, vec![1, 2, 3]);

    let requests = server.received_requests().await.unwrap();
    let listing_hits = requests.iter().filter(|r| r.url.path() == "/c/men").count();
    let root_hits = requests.iter().filter(|r| r.url.path() == "/").count();
    assert_eq!(listing_hits, 2);
    // The reset forces session init to run again.
    assert_eq!(root_hits, 2);
}

#[tokio::test]
async fn persistent_server_error_fails_the_task_after_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/c/men"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let scheduler = scheduler("demandware", config(2, 10));
    let (report, indices) = crawl(&scheduler, &format!("{}/c/men", server.uri())).await;

    assert!(matches!(
        report.error,
        Some(HarvestError::HttpStatus { status: 503, .. })
    ));
    assert_eq!(report.products, 0);
    assert!(indices.is_empty());
}

#[tokio::test]
async fn failure_mid_chain_keeps_earlier_pages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/c/men"))
        .and(query_param("start", "56"))
        .respond_with(html("<p>Automation detected</p>".to_owned()))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/c/men"))
        .respond_with(html(grid_page(80, 56, 0)))
        .mount(&server)
        .await;

    let scheduler = scheduler("demandware", config(1, 10));
    let (report, indices) = crawl(&scheduler, &format!("{}/c/men", server.uri())).await;

    let err = report.error.unwrap();
    assert!(matches!(err, HarvestError::AccessDenied { .. }));
    assert_eq!(report.products, 56);
    assert_eq!(indices.len(), 57);
}

#[tokio::test]
async fn request_budget_truncates_the_task() {
    let server = MockServer::start().await;
    mount_listing(&server).await;

    let scheduler = scheduler("demandware", config(0, 1));
    let (report, _) = crawl(&scheduler, &format!("{}/c/men", server.uri())).await;

    assert!(report.succeeded());
    assert!(report.truncated);
    assert_eq!(report.products, 56);
    assert_eq!(report.requests, 1);
}

#[tokio::test]
async fn unknown_host_never_fetches() {
    let scheduler = scheduler("demandware", config(3, 10));
    let (report, indices) = crawl(&scheduler, "https://elsewhere.example.org/c/men").await;

    assert!(matches!(report.error, Some(HarvestError::Unsupported { .. })));
    assert!(report.task_id.is_none());
    assert_eq!(report.requests, 0);
    assert!(indices.is_empty());
}

#[tokio::test]
async fn shopify_collection_hops_to_products_json() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections/tees"))
        .respond_with(html("<html>collection</html>".to_owned()))
        .mount(&server)
        .await;
    let products: Vec<_> = (1..=2)
        .map(|id| {
            json!({
                "id": id,
                "title": format!("Tee {id}"),
                "handle": format!("tee-{id}"),
                "variants": [{"id": id * 10, "title": "Default Title", "price": "15.00"}]
            })
        })
        .collect();
    Mock::given(method("GET"))
        .and(path("/collections/tees/products.json"))
        .and(query_param("limit", "250"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "products": products })))
        .mount(&server)
        .await;

    let scheduler = scheduler("shopify", config(0, 10));
    let seen = Mutex::new(Vec::new());
    let sink = |e: &Emission| {
        if let Emitted::Product(product) = &e.emitted {
            seen.lock().unwrap().push(product.source_id.clone());
        }
    };
    let report = scheduler
        .run_task(&format!("{}/collections/tees", server.uri()), &sink)
        .await;

    assert!(report.succeeded(), "unexpected error: {:?}", report.error);
    assert_eq!(report.requests, 2);
    assert_eq!(seen.into_inner().unwrap(), vec!["1", "2"]);
}

#[tokio::test]
async fn run_reports_every_seed() {
    let server = MockServer::start().await;
    mount_listing(&server).await;

    let scheduler = scheduler("demandware", config(0, 10));
    let seeds = vec![
        format!("{}/c/men", server.uri()),
        "https://elsewhere.example.org/c/men".to_owned(),
    ];
    let reports = scheduler.run(&seeds, &|_| {}).await;

    assert_eq!(reports.len(), 2);
    assert_eq!(reports.iter().filter(|r| r.succeeded()).count(), 1);
    assert_eq!(reports.iter().map(|r| r.products).sum::<usize>(), 80);
}

#[tokio::test]
async fn transport_sends_required_headers_and_cookies() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/grid"))
        .and(header("accept-language", "en-US"))
        .and(header("cookie", "dwsid=abc"))
        .and(header("x-requested-with", "XMLHttpRequest"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let transport = HttpTransport::new(5, "harvest-test/0.1");
    let options = CrawlOptions {
        required_headers: vec![("accept-language".to_owned(), "en-US".to_owned())],
        required_cookies: vec![("dwsid".to_owned(), "abc".to_owned())],
        ..CrawlOptions::default()
    };
    let descriptor = FetchDescriptor::get(format!("{}/api/grid", server.uri()))
        .with_header("x-requested-with", "XMLHttpRequest");
    let response = transport.fetch(&descriptor, &options).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.body, "ok");
}

#[tokio::test]
async fn transport_passes_error_statuses_through() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(410).insert_header("x-trace", "t1"))
        .mount(&server)
        .await;

    let transport = HttpTransport::new(5, "harvest-test/0.1");
    let response = transport
        .fetch(
            &FetchDescriptor::get(format!("{}/gone", server.uri())),
            &CrawlOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(response.status, 410);
    assert_eq!(response.header("X-Trace"), Some("t1"));
}

#[tokio::test]
async fn session_init_runs_once_per_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", "dwsid=fresh; Path=/"))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/c/men"))
        .and(header("cookie", "dwsid=fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_string("grid"))
        .expect(3)
        .mount(&server)
        .await;

    let transport = HttpTransport::new(5, "harvest-test/0.1");
    let options = CrawlOptions {
        session_init_enabled: true,
        ..CrawlOptions::default()
    };
    let descriptor = FetchDescriptor::get(format!("{}/c/men", server.uri()));

    transport.fetch(&descriptor, &options).await.unwrap();
    transport.fetch(&descriptor, &options).await.unwrap();
    assert!(transport.has_session("127.0.0.1").await);

    transport.clear("127.0.0.1").await;
    assert!(!transport.has_session("127.0.0.1").await);
    transport.fetch(&descriptor, &options).await.unwrap();
}

#[tokio::test]
async fn connection_failure_is_a_transport_error() {
    let transport = HttpTransport::new(1, "harvest-test/0.1");
    // Port 9 (discard) on localhost is not listening in test environments.
    let err = transport
        .fetch(
            &FetchDescriptor::get("http://127.0.0.1:9/c/men"),
            &CrawlOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, HarvestError::Transport { .. }));
}
