//! End-to-end traversal through the registry with an in-memory scheduler.
//!
//! Responses are canned per URL; the loop below plays the scheduler role:
//! it hands each emitted fetch back to the registry with the child state the
//! engine attached, until no fetches remain.

use std::collections::{HashMap, VecDeque};

use serde_json::json;

use harvest_scraper::{
    register_site, Emission, Emitted, HarvestError, ModuleRegistry, Response, TaskState,
};

const ORIGIN: &str = "https://www.outfitter.example";

fn registry() -> ModuleRegistry {
    let mut registry = ModuleRegistry::default();
    register_site(&mut registry, "demandware", vec!["*.outfitter.example".to_owned()]).unwrap();
    register_site(&mut registry, "shopify", vec!["shop.example.com".to_owned()]).unwrap();
    registry
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
    format!(r#"<script id="searchState" type="application/json">{state}</script>"#)
}

/// Runs a task to completion. Returns every emission and the first error.
fn run_task(
    registry: &ModuleRegistry,
    seed_url: &str,
    pages: &HashMap<String, (u16, String)>,
) -> (Vec<Emission>, Option<HarvestError>) {
    let site = registry.resolve(seed_url).unwrap().id();
    let mut queue = VecDeque::from([(seed_url.to_owned(), TaskState::root(site))]);
    let mut all = Vec::new();

    while let Some((url, state)) = queue.pop_front() {
        let (status, body) = pages.get(&url).cloned().unwrap_or((404, String::new()));
        let response = Response::new(url.as_str(), status, body);
        let mut emitted = Vec::new();
        let result = registry.handle(state, &response, &mut |e| emitted.push(e));
        if let Err(err) = result {
            all.extend(emitted);
            return (all, Some(err));
        }
        for emission in &emitted {
            if let Emitted::Fetch {
                descriptor, state, ..
            } = &emission.emitted
            {
                queue.push_back((descriptor.url.clone(), state.clone()));
            }
        }
        all.extend(emitted);
    }
    (all, None)
}

#[test]
fn listing_chain_walks_every_page_with_monotonic_cursor() {
    let pages = HashMap::from([
        (format!("{ORIGIN}/c/men"), (200, grid_page(150, 56, 0))),
        (
            format!("{ORIGIN}/c/men?start=56&sz=56"),
            (200, grid_page(150, 56, 56)),
        ),
        (
            format!("{ORIGIN}/c/men?start=112&sz=56"),
            (200, grid_page(150, 56, 112)),
        ),
    ]);

    let (emitted, err) = run_task(&registry(), &format!("{ORIGIN}/c/men"), &pages);
    assert!(err.is_none(), "unexpected error: {err:?}");

    let products = emitted
        .iter()
        .filter(|e| matches!(e.emitted, Emitted::Product(_)))
        .count();
    let fetches = emitted.len() - products;
    assert_eq!(products, 150);
    assert_eq!(fetches, 2);

    let indices: Vec<u64> = emitted.iter().map(|e| e.item_index).collect();
    assert_eq!(indices, (1..=152).collect::<Vec<_>>());

    let task_ids: std::collections::HashSet<_> = emitted.iter().map(|e| &e.task_id).collect();
    assert_eq!(task_ids.len(), 1);
}

#[test]
fn block_mid_chain_keeps_earlier_emissions() {
    let pages = HashMap::from([
        (format!("{ORIGIN}/c/men"), (200, grid_page(150, 56, 0))),
        (
            format!("{ORIGIN}/c/men?start=56&sz=56"),
            (200, "<p>Automation detected</p>".to_owned()),
        ),
    ]);

    let (emitted, err) = run_task(&registry(), &format!("{ORIGIN}/c/men"), &pages);
    let err = err.unwrap();
    assert!(matches!(err, HarvestError::AccessDenied { .. }));
    assert!(err.requires_session_reset());
    assert_eq!(emitted.len(), 57);
}

#[test]
fn shopify_collection_hops_to_json_and_paginates() {
    let product = |id: i64| {
        json!({
            "id": id,
            "title": format!("Tee {id}"),
            "handle": format!("tee-{id}"),
            "variants": [{"id": id * 10, "title": "Default Title", "price": "15.00"}]
        })
    };
    let full: Vec<_> = (1..=250).map(product).collect();
    let pages = HashMap::from([
        (
            "https://shop.example.com/collections/tees".to_owned(),
            (200, "<html>collection</html>".to_owned()),
        ),
        (
            "https://shop.example.com/collections/tees/products.json?limit=250".to_owned(),
            (200, json!({ "products": full }).to_string()),
        ),
        (
            "https://shop.example.com/collections/tees/products.json?limit=250&page=2".to_owned(),
            (200, json!({ "products": [product(251)] }).to_string()),
        ),
    ]);

    let (emitted, err) = run_task(
        &registry(),
        "https://shop.example.com/collections/tees",
        &pages,
    );
    assert!(err.is_none(), "unexpected error: {err:?}");

    let products = emitted
        .iter()
        .filter(|e| matches!(e.emitted, Emitted::Product(_)))
        .count();
    assert_eq!(products, 251);
    // One hop to JSON, one page continuation.
    assert_eq!(emitted.len(), 253);
    assert_eq!(emitted.last().map(|e| e.item_index), Some(253));
}

#[test]
fn unknown_host_is_unsupported() {
    let err = registry().resolve("https://elsewhere.example.org/c/men").unwrap_err();
    assert!(matches!(err, HarvestError::Unsupported { .. }));
    assert!(!err.requires_session_reset());
}
