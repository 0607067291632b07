use harvest_core::SpecAxis;
use serde_json::json;

use super::*;
use crate::cursor::TaskState;
use crate::engine::{Emission, Emitted, Engine};

// -----------------------------------------------------------------------
// Fixtures
// -----------------------------------------------------------------------

const ORIGIN: &str = "https://www.outfitter.example";

fn module() -> DemandwareModule {
    DemandwareModule::new(vec!["*.outfitter.example".to_owned()]).unwrap()
}

fn tile(i: u64) -> serde_json::Value {
    json!({
        "id": format!("P{i:03}"),
        "masterId": format!("M{i:03}"),
        "name": format!("Trail Jacket {i}"),
        "brand": "Outfitter",
        "url": format!("/p/trail-jacket-{i}/P{i:03}.html?dwvar_color=BLK"),
        "price": {
            "sales": {"value": 89.5, "currency": "USD"},
            "list": {"value": "129.00"}
        },
        "available": true,
        "rating": 4.2,
        "reviewCount": "31",
        "category": ["Men", "Jackets"],
        "images": [{"url": format!("//img.outfitter.example/{i}.jpg")}]
    })
}

fn grid_html(total: u64, page_size: u64, start: u64, count: u64) -> String {
    let end = (start + count).saturating_sub(1);
    let state = json!({
        "totalProductCount": total,
        "pageSize": page_size,
        "start": start,
        "end": end,
        "products": (start..start + count).map(tile).collect::<Vec<_>>()
    });
    format!(
        r#"<html><body><div class="grid"></div>
        <script type="application/json" id="searchState">{state}</script>
        </body></html>"#
    )
}

fn detail_html() -> String {
    let product = json!({
        "@context": "https://schema.org",
        "@type": "Product",
        "name": "Trail Jacket",
        "sku": "P001",
        "url": "/p/trail-jacket/P001.html",
        "description": "Waterproof shell.",
        "brand": {"@type": "Brand", "name": "Outfitter"},
        "image": ["https://img.outfitter.example/1.jpg", "https://img.outfitter.example/2.jpg"],
        "aggregateRating": {"ratingValue": "9", "reviewCount": 40, "bestRating": 10},
        "offers": {
            "@type": "AggregateOffer",
            "offers": [{"price": "99.00", "priceCurrency": "USD", "availability": "https://schema.org/InStock"}]
        }
    });
    let crumbs = json!({
        "@type": "BreadcrumbList",
        "itemListElement": [
            {"position": 1, "name": "Home"},
            {"position": 2, "name": "Men"},
            {"position": 3, "name": "Jackets"},
            {"position": 4, "name": "Trail Jacket"}
        ]
    });
    let pdp = json!({
        "id": "P001",
        "masterId": "M001",
        "price": {"sales": {"value": 89.5, "currency": "USD"}, "list": {"value": 129}},
        "available": true,
        "variants": [
            {"id": "P001-BLK-M", "available": true, "quantity": 4,
             "color": {"id": "BLK", "name": "Black", "swatch": "https://img.outfitter.example/sw/blk.png", "index": 0},
             "size": {"id": "M", "name": "M", "index": 1}},
            {"id": "P001-BLK-L", "available": false,
             "color": {"id": "BLK", "name": "Black", "index": 0},
             "size": "L"}
        ]
    });
    format!(
        r#"<html><head>
        <script type="application/ld+json">{product}</script>
        <script type="application/ld+json">{crumbs}</script>
        </head><body>
        <script>window.pdpData = {pdp}; initProductPage();</script>
        </body></html>"#
    )
}

fn step(url: &str, status: u16, body: &str) -> (Result<crate::TaskOutcome, HarvestError>, Vec<Emission>) {
    let mut emitted = Vec::new();
    let result = Engine::default().handle(
        &module(),
        TaskState::root(DemandwareModule::ID),
        &Response::new(url, status, body),
        &mut |e| emitted.push(e),
    );
    (result, emitted)
}

fn fetch_urls(emitted: &[Emission]) -> Vec<&str> {
    emitted
        .iter()
        .filter_map(|e| match &e.emitted {
            Emitted::Fetch { descriptor, .. } => Some(descriptor.url.as_str()),
            Emitted::Product(_) => None,
        })
        .collect()
}

// -----------------------------------------------------------------------
// Classification
// -----------------------------------------------------------------------

#[test]
fn classifies_storefront_urls() {
    let m = module();
    let kind = |u: &str| m.classifier().classify(&format!("{ORIGIN}{u}")).unwrap();
    assert_eq!(kind("/p/trail-jacket/P001.html"), PageKind::Detail);
    assert_eq!(kind("/p/trail-jacket/P001.html?dwvar_color=BLK"), PageKind::Detail);
    assert_eq!(kind("/c/men/jackets"), PageKind::Listing);
    assert_eq!(
        kind("/on/demandware.store/Sites-US-Site/en_US/Search-UpdateGrid?cgid=men&start=56&sz=56"),
        PageKind::Listing
    );
    assert_eq!(kind("/search?q=jacket"), PageKind::Search);
    assert_eq!(kind("/search?lang=en&q=jacket"), PageKind::Search);
}

#[test]
fn classification_is_deterministic() {
    let m = module();
    let url = format!("{ORIGIN}/c/men?start=0");
    let first = m.classifier().classify(&url).unwrap();
    for _ in 0..10 {
        assert_eq!(m.classifier().classify(&url).unwrap(), first);
    }
}

#[test]
fn canonical_url_is_idempotent() {
    let m = module();
    let raw = "//www.outfitter.example/p/trail-jacket/P001.html?dwvar_color=BLK#reviews";
    let once = m.canonical_url(raw).unwrap();
    assert_eq!(once, "https://www.outfitter.example/p/trail-jacket/P001.html");
    assert_eq!(m.canonical_url(&once).unwrap(), once);
}

// -----------------------------------------------------------------------
// Listing pagination scenarios
// -----------------------------------------------------------------------

#[test]
fn first_page_of_150_emits_56_products_and_one_continuation() {
    let (result, emitted) = step(
        &format!("{ORIGIN}/c/men/jackets?prefn1=brand&prefv1=Outfitter"),
        200,
        &grid_html(150, 56, 0, 56),
    );
    let outcome = result.unwrap();

    assert_eq!(outcome.products, 56);
    assert_eq!(outcome.fetches, 1);

    let product_indices: Vec<u64> = emitted
        .iter()
        .filter(|e| matches!(e.emitted, Emitted::Product(_)))
        .map(|e| e.item_index)
        .collect();
    assert_eq!(product_indices, (1..=56).collect::<Vec<_>>());

    assert_eq!(
        fetch_urls(&emitted),
        vec![format!(
            "{ORIGIN}/c/men/jackets?prefn1=brand&prefv1=Outfitter&start=56&sz=56"
        )]
    );
    assert_eq!(emitted[56].item_index, 57);
}

#[test]
fn invalid_tile_is_skipped_and_window_still_continues() {
    let mut blank = tile(1);
    blank["name"] = json!("   ");
    let state = json!({
        "totalProductCount": 10,
        "pageSize": 2,
        "start": 0,
        "end": 1,
        "products": [tile(0), blank]
    });
    let body = format!(r#"<script type="application/json" id="searchState">{state}</script>"#);

    let (result, emitted) = step(&format!("{ORIGIN}/c/men"), 200, &body);
    let outcome = result.unwrap();

    assert_eq!(outcome.products, 1);
    assert_eq!(outcome.fetches, 1);
    assert_eq!(fetch_urls(&emitted), vec![format!("{ORIGIN}/c/men?start=2&sz=2")]);
}

#[test]
fn continuation_replaces_existing_window_parameters() {
    let (result, emitted) = step(
        &format!("{ORIGIN}/c/men/jackets?start=56&sz=56&srule=new"),
        200,
        &grid_html(150, 56, 56, 56),
    );
    result.unwrap();
    assert_eq!(
        fetch_urls(&emitted),
        vec![format!("{ORIGIN}/c/men/jackets?srule=new&start=112&sz=56")]
    );
}

#[test]
fn terminal_page_emits_products_without_continuation() {
    let (result, emitted) = step(
        &format!("{ORIGIN}/c/men/jackets?start=112&sz=56"),
        200,
        &grid_html(150, 56, 112, 38),
    );
    let outcome = result.unwrap();
    assert_eq!(outcome.products, 38);
    assert!(outcome.is_terminal());
    assert!(fetch_urls(&emitted).is_empty());
}

#[test]
fn continuations_bounded_by_total_over_page_size() {
    let module = module();
    let (total, page_size) = (150_u64, 56_u64);
    let mut start = 0;
    let mut continuations = 0;
    loop {
        let count = page_size.min(total - start);
        let response = Response::new(
            format!("{ORIGIN}/c/men?start={start}&sz={page_size}"),
            200,
            grid_html(total, page_size, start, count),
        );
        let outputs = module
            .extract(PageKind::Listing, &response, PaginationCursor::start())
            .unwrap();
        if !outputs.iter().any(Output::is_fetch) {
            break;
        }
        continuations += 1;
        start += count;
        assert!(continuations <= total.div_ceil(page_size));
    }
    assert_eq!(continuations, 2);
}

#[test]
fn search_results_paginate_like_grids() {
    let (result, emitted) = step(
        &format!("{ORIGIN}/search?q=jacket"),
        200,
        &grid_html(10, 4, 0, 4),
    );
    result.unwrap();
    assert_eq!(
        fetch_urls(&emitted),
        vec![format!("{ORIGIN}/search?q=jacket&start=4&sz=4")]
    );
    let Emitted::Fetch { kind_hint, .. } = &emitted[4].emitted else {
        panic!("expected continuation");
    };
    assert_eq!(*kind_hint, Some(PageKind::Search));
}

#[test]
fn tiles_normalize_to_canonical_products() {
    let (result, emitted) = step(&format!("{ORIGIN}/c/men"), 200, &grid_html(1, 56, 0, 1));
    result.unwrap();
    let Emitted::Product(product) = &emitted[0].emitted else {
        panic!("expected a product");
    };
    assert_eq!(product.source_id, "P000");
    assert_eq!(product.group_id.as_deref(), Some("M000"));
    assert_eq!(
        product.canonical_url,
        format!("{ORIGIN}/p/trail-jacket-0/P000.html")
    );
    assert_eq!(product.price.current, 8950);
    assert_eq!(product.price.msrp, Some(12900));
    assert_eq!(product.price.discount, 31);
    assert_eq!(product.stats.as_ref().unwrap().count, 31);
    assert_eq!(product.category.level(1), Some("Jackets"));
    assert_eq!(product.media[0].original_url, "https://img.outfitter.example/0.jpg");
    assert!(product.media[0].is_default);
}

#[test]
fn search_state_assigned_to_window_variable_is_found() {
    let state = json!({"totalProductCount": 1, "pageSize": 56, "start": 0, "end": 0, "products": [tile(1)]});
    let body = format!("<script>window.searchState = {state};</script>");
    let (result, emitted) = step(&format!("{ORIGIN}/c/men"), 200, &body);
    assert_eq!(result.unwrap().products, 1);
    assert_eq!(emitted.len(), 1);
}

// -----------------------------------------------------------------------
// Detail pages
// -----------------------------------------------------------------------

#[test]
fn detail_merges_jsonld_and_pdp_data() {
    let (result, emitted) = step(
        &format!("{ORIGIN}/p/trail-jacket/P001.html?dwvar_color=BLK"),
        200,
        &detail_html(),
    );
    assert_eq!(result.unwrap().products, 1);
    let Emitted::Product(product) = &emitted[0].emitted else {
        panic!("expected a product");
    };

    assert_eq!(product.source_id, "P001");
    assert_eq!(product.group_id.as_deref(), Some("M001"));
    assert_eq!(product.title, "Trail Jacket");
    assert_eq!(product.brand.as_deref(), Some("Outfitter"));
    assert_eq!(product.canonical_url, format!("{ORIGIN}/p/trail-jacket/P001.html"));
    assert_eq!(
        product.crawl_url,
        format!("{ORIGIN}/p/trail-jacket/P001.html?dwvar_color=BLK")
    );
    assert_eq!(product.price.current, 8950);
    assert_eq!(product.price.msrp, Some(12900));
    assert_eq!(
        product.category.iter().collect::<Vec<_>>(),
        vec!["Men", "Jackets"]
    );

    let stats = product.stats.as_ref().unwrap();
    assert_eq!(stats.count, 40);
    assert!((stats.rating - 4.5).abs() < 1e-4);

    assert_eq!(product.media.len(), 2);
    assert_eq!(product.default_media().unwrap().id, "0");

    assert_eq!(product.skus.len(), 2);
    let first = &product.skus[0];
    assert_eq!(first.stock.quantity, Some(4));
    let color = first.spec(SpecAxis::Color).unwrap();
    assert_eq!(color.id, "BLK");
    assert_eq!(color.name, "Black");
    assert_eq!(color.value, "black");
    assert_eq!(
        color.icon.as_deref(),
        Some("https://img.outfitter.example/sw/blk.png")
    );
    assert_eq!(color.index, Some(0));
    assert_eq!(first.price, product.price);

    let second = &product.skus[1];
    assert!(!second.stock.is_in_stock());
    assert_eq!(second.spec(SpecAxis::Size).unwrap().name, "L");
}

#[test]
fn detail_falls_back_to_jsonld_offer() {
    let body = detail_html().replace("window.pdpData", "window.unrelated");
    let module = module();
    let response = Response::new(format!("{ORIGIN}/p/trail-jacket/P001.html"), 200, body);
    let outputs = module
        .extract(PageKind::Detail, &response, PaginationCursor::start())
        .unwrap();
    let Output::Product(product) = &outputs[0] else {
        panic!("expected a product");
    };
    assert_eq!(product.source_id, "P001");
    assert_eq!(product.price.current, 9900);
    assert_eq!(product.price.msrp, None);
    assert!(product.stock.is_in_stock());
    assert!(product.skus.is_empty());
}

#[test]
fn detail_without_payload_is_missing_payload_with_reset() {
    let (result, emitted) = step(
        &format!("{ORIGIN}/p/trail-jacket/P001.html"),
        200,
        "<html><body>Loading…</body></html>",
    );
    let err = result.unwrap_err();
    assert!(matches!(err, HarvestError::MissingPayload { .. }));
    assert!(err.requires_session_reset());
    assert!(emitted.is_empty());
}

#[test]
fn malformed_pdp_data_is_deserialize_error() {
    let body = r#"<script>window.pdpData = {"id": "P1", "price": {"sales": }};</script>"#;
    let (result, _) = step(&format!("{ORIGIN}/p/trail-jacket/P001.html"), 200, body);
    let err = result.unwrap_err();
    assert!(matches!(err, HarvestError::Deserialize { .. }));
    assert!(!err.requires_session_reset());
}

#[test]
fn discontinued_product_finishes_empty() {
    let (result, emitted) = step(&format!("{ORIGIN}/p/trail-jacket/P001.html"), 410, "");
    assert!(result.unwrap().is_terminal());
    assert!(emitted.is_empty());
}

// -----------------------------------------------------------------------
// Failure scenarios
// -----------------------------------------------------------------------

#[test]
fn blocked_page_is_access_denied_with_reset() {
    let body = r#"<html><body><h1>Automation Detected</h1><div id="px-captcha"></div></body></html>"#;
    let (result, emitted) = step(&format!("{ORIGIN}/c/men"), 200, body);
    let err = result.unwrap_err();
    assert!(matches!(err, HarvestError::AccessDenied { .. }));
    assert!(err.requires_session_reset());
    assert!(emitted.is_empty());
}

#[test]
fn grid_without_search_state_is_missing_payload() {
    let (result, _) = step(&format!("{ORIGIN}/c/men"), 200, "<html><body></body></html>");
    assert!(matches!(result, Err(HarvestError::MissingPayload { .. })));
}

#[test]
fn unsupported_url_has_no_reset() {
    let (result, emitted) = step(&format!("{ORIGIN}/account/login"), 200, "<html></html>");
    let err = result.unwrap_err();
    assert!(matches!(err, HarvestError::Unsupported { .. }));
    assert!(!err.requires_session_reset());
    assert!(emitted.is_empty());
}

#[test]
fn default_options_request_session_warmup() {
    let options = module().default_options(&format!("{ORIGIN}/c/men"));
    assert!(options.session_init_enabled);
    assert_eq!(options.reliability_tier, ReliabilityTier::Residential);
}
