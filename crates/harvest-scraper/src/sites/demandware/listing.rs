//! Grid pages: embedded search state to product tiles and a page window.

use harvest_core::{
    ensure_single_default, parse_minor_units, CanonicalProduct, CategoryPath, Media, Price,
    ReviewStats, Stock,
};
use serde_json::Value;

use crate::canonical::canonicalize;
use crate::error::HarvestError;
use crate::extract::{assigned_json, script_json_by_id, Loose};
use crate::fetch::Response;
use crate::pagination::PageWindow;

use super::GridPage;

const STATE_SCRIPT_ID: &str = "searchState";
const STATE_VARIABLE: &str = "window.searchState";

/// Reads the search state of a grid page.
///
/// Tiles that cannot be normalized or fail entity validation are skipped
/// with a warning; they still count as observed for the page window.
pub(super) fn parse_grid(
    response: &Response,
    origin: &str,
    currency: &str,
) -> Result<GridPage, HarvestError> {
    let state = locate_state(response)?;
    let state = Loose::new(&state);

    let tiles = state.get("products").items();
    let observed = tiles.len() as u64;
    let window = PageWindow {
        offset: state.get("start").u64().unwrap_or(0),
        observed,
        page_size: state.get("pageSize").u64().unwrap_or(observed),
        total: state.get("totalProductCount").u64(),
        reported_end: state.get("end").u64(),
    };
    tracing::debug!(
        url = %response.url,
        offset = window.offset,
        observed,
        total = ?window.total,
        "parsed search state"
    );

    let products = tiles
        .into_iter()
        .filter_map(|tile| {
            let product = tile_product(tile, origin, &response.url, currency).and_then(|product| {
                product.validate()?;
                Ok(product)
            });
            match product {
                Ok(product) => Some(product),
                Err(e) => {
                    tracing::warn!(url = %response.url, error = %e, "skipping invalid tile");
                    None
                }
            }
        })
        .collect();

    Ok(GridPage { products, window })
}

fn locate_state(response: &Response) -> Result<Value, HarvestError> {
    let located = script_json_by_id(&response.body, STATE_SCRIPT_ID)
        .or_else(|| assigned_json(&response.body, STATE_VARIABLE));
    match located {
        Some(Ok(value)) => Ok(value),
        Some(Err(source)) => Err(HarvestError::Deserialize {
            context: format!("search state {}", response.url),
            source,
        }),
        None => Err(HarvestError::MissingPayload {
            url: response.url.clone(),
            payload: "search state",
        }),
    }
}

fn tile_product(
    tile: Loose<'_>,
    origin: &str,
    crawl_url: &str,
    fallback_currency: &str,
) -> Result<CanonicalProduct, HarvestError> {
    let source_id = tile.get("id").str().ok_or_else(|| HarvestError::Extraction {
        url: crawl_url.to_owned(),
        reason: "product tile without id".to_owned(),
    })?;
    let normalization = |reason: &str| HarvestError::Normalization {
        source_id: source_id.clone(),
        reason: reason.to_owned(),
    };

    let title = tile
        .get("name")
        .str()
        .or_else(|| tile.get("productName").str())
        .ok_or_else(|| normalization("tile without a name"))?;
    let url = tile
        .get("url")
        .str()
        .ok_or_else(|| normalization("tile without a url"))?;
    let canonical_url = canonicalize(&url, Some(origin))?;

    let price = price_of(tile.get("price"), fallback_currency)?
        .ok_or_else(|| normalization("tile without a sale price"))?;

    let stock = match (tile.get("available").bool(), tile.get("quantity").i64()) {
        (Some(false), _) => Stock::out_of_stock(),
        (_, Some(quantity)) => Stock::from_quantity(quantity),
        _ => Stock::in_stock(),
    };

    #[allow(clippy::cast_possible_truncation)]
    let stats = tile.get("reviewCount").u64().and_then(|count| {
        let rating = tile.get("rating").f64()?;
        Some(ReviewStats::normalized(
            u32::try_from(count).unwrap_or(u32::MAX),
            rating as f32,
            5.0,
        ))
    });

    let mut media = media_list(tile.get("images"));
    ensure_single_default(&mut media);

    Ok(CanonicalProduct {
        source_id: source_id.clone(),
        crawl_url: crawl_url.to_owned(),
        canonical_url,
        group_id: tile.get("masterId").str(),
        title,
        description: None,
        brand: tile.get("brand").str(),
        category: CategoryPath::from_segments(
            tile.get("category").items().into_iter().filter_map(Loose::str),
        ),
        price,
        stock,
        stats,
        skus: Vec::new(),
        media,
    })
}

/// `{"sales": {"value", "currency"}, "list": {"value"}}` to a [`Price`].
/// `Ok(None)` when there is no sale value.
pub(super) fn price_of(
    price: Loose<'_>,
    fallback_currency: &str,
) -> Result<Option<Price>, HarvestError> {
    let Some(sales) = price.get("/sales/value").str() else {
        return Ok(None);
    };
    let currency = price
        .get("/sales/currency")
        .str()
        .unwrap_or_else(|| fallback_currency.to_owned());
    let current = parse_minor_units(&sales, &currency)?;
    let msrp = price
        .get("/list/value")
        .str()
        .map(|list| parse_minor_units(&list, &currency))
        .transpose()?;
    Ok(Some(Price::new(&currency, current, msrp)))
}

/// Image entries given as URL strings or `{"url": ...}` objects.
pub(super) fn media_list(images: Loose<'_>) -> Vec<Media> {
    images
        .items()
        .into_iter()
        .filter_map(|img| img.str().or_else(|| img.get("url").str()))
        .enumerate()
        .map(|(i, url)| {
            let original = match url.strip_prefix("//") {
                Some(rest) => format!("https://{rest}"),
                None => url,
            };
            Media::image(i.to_string(), original)
        })
        .collect()
}
