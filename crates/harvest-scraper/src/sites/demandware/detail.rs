//! Product pages: JSON-LD `Product` merged with the `window.pdpData`
//! variation matrix.

use harvest_core::{
    ensure_single_default, parse_minor_units, CanonicalProduct, CategoryPath, Price, ReviewStats,
    Sku, SkuSpecOption, SpecAxis, Stock,
};
use serde_json::Value;

use crate::canonical::canonicalize;
use crate::error::HarvestError;
use crate::extract::{assigned_json, jsonld_of_type, Loose};
use crate::fetch::Response;

use super::listing::{media_list, price_of};

const PDP_VARIABLE: &str = "window.pdpData";

/// Variation attribute keys in `pdpData.variants[*]`, by canonical axis.
const VARIANT_AXES: [(&str, SpecAxis); 5] = [
    ("color", SpecAxis::Color),
    ("size", SpecAxis::Size),
    ("width", SpecAxis::Width),
    ("length", SpecAxis::Inseam),
    ("style", SpecAxis::Style),
];

/// Builds the product of a detail page.
///
/// JSON-LD supplies the descriptive fields and a fallback offer; `pdpData`,
/// when present, wins for ids, prices and availability and contributes the
/// SKUs.
///
/// # Errors
///
/// - [`HarvestError::MissingPayload`] when neither payload is on the page.
/// - [`HarvestError::Deserialize`] when `pdpData` is present but malformed.
/// - [`HarvestError::Normalization`] when no id, title or price can be read.
pub(super) fn parse_detail(
    response: &Response,
    origin: &str,
    fallback_currency: &str,
) -> Result<CanonicalProduct, HarvestError> {
    let ld_value = jsonld_of_type(&response.body, "Product");
    let pdp_value = assigned_json(&response.body, PDP_VARIABLE)
        .transpose()
        .map_err(|source| HarvestError::Deserialize {
            context: format!("pdpData {}", response.url),
            source,
        })?;
    if ld_value.is_none() && pdp_value.is_none() {
        return Err(HarvestError::MissingPayload {
            url: response.url.clone(),
            payload: "product JSON-LD",
        });
    }

    let null = Value::Null;
    let ld = Loose::new(ld_value.as_ref().unwrap_or(&null));
    let pdp = Loose::new(pdp_value.as_ref().unwrap_or(&null));
    let offer = first_offer(ld.get("offers"));

    let source_id = pdp
        .get("id")
        .str()
        .or_else(|| ld.get("productID").str())
        .or_else(|| ld.get("sku").str())
        .ok_or_else(|| HarvestError::Extraction {
            url: response.url.clone(),
            reason: "product page without an id".to_owned(),
        })?;
    let normalization = |reason: &str| HarvestError::Normalization {
        source_id: source_id.clone(),
        reason: reason.to_owned(),
    };

    let title = ld
        .get("name")
        .str()
        .or_else(|| pdp.get("productName").str())
        .ok_or_else(|| normalization("product without a name"))?;

    let currency = pdp
        .get("/price/sales/currency")
        .str()
        .or_else(|| offer.get("priceCurrency").str())
        .unwrap_or_else(|| fallback_currency.to_owned());

    let price = match price_of(pdp.get("price"), &currency)? {
        Some(price) => price,
        None => {
            let raw = offer
                .get("price")
                .str()
                .or_else(|| offer.get("lowPrice").str())
                .ok_or_else(|| normalization("product without a price"))?;
            Price::new(&currency, parse_minor_units(&raw, &currency)?, None)
        }
    };

    let stock = match pdp.get("available").bool() {
        Some(available) => Stock::from_available(available),
        None => offer
            .get("availability")
            .str()
            .map_or_else(Stock::in_stock, |a| Stock::from_available(schema_in_stock(&a))),
    };

    let canonical_url = match ld.get("url").str() {
        Some(url) => canonicalize(&url, Some(origin))?,
        None => canonicalize(&response.url, None)?,
    };

    let mut media = media_list(ld.get("image"));
    if media.is_empty() {
        media = media_list(pdp.get("images"));
    }
    ensure_single_default(&mut media);

    let skus = pdp
        .get("variants")
        .items()
        .into_iter()
        .filter_map(|variant| match variant_sku(variant, &price, &currency) {
            Ok(sku) => Some(sku),
            Err(e) => {
                tracing::warn!(
                    url = %response.url,
                    source_id = %source_id,
                    error = %e,
                    "skipping variant"
                );
                None
            }
        })
        .collect();

    Ok(CanonicalProduct {
        source_id: source_id.clone(),
        crawl_url: response.url.clone(),
        canonical_url,
        group_id: pdp.get("masterId").str(),
        title,
        description: ld.get("description").str(),
        brand: ld
            .get("brand")
            .str()
            .or_else(|| ld.get("/brand/name").str()),
        category: breadcrumbs(&response.body),
        price,
        stock,
        stats: review_stats(ld.get("aggregateRating")),
        skus,
        media,
    })
}

/// The first concrete offer; `AggregateOffer` wrappers are unwrapped.
fn first_offer(offers: Loose<'_>) -> Loose<'_> {
    let first = offers.items().into_iter().next().unwrap_or(offers);
    let nested = first.get("offers");
    if nested.is_missing() {
        first
    } else {
        nested.items().into_iter().next().unwrap_or(first)
    }
}

fn schema_in_stock(availability: &str) -> bool {
    let tail = availability.rsplit('/').next().unwrap_or(availability);
    matches!(
        tail.to_ascii_lowercase().as_str(),
        "instock" | "limitedavailability" | "onlineonly" | "instoreonly" | "preorder"
    )
}

fn review_stats(rating: Loose<'_>) -> Option<ReviewStats> {
    let value = rating.get("ratingValue").f64()?;
    let count = rating
        .get("reviewCount")
        .u64()
        .or_else(|| rating.get("ratingCount").u64())
        .unwrap_or(0);
    let best = rating.get("bestRating").f64().unwrap_or(5.0);
    #[allow(clippy::cast_possible_truncation)]
    Some(ReviewStats::normalized(
        u32::try_from(count).unwrap_or(u32::MAX),
        value as f32,
        best as f32,
    ))
}

/// Category levels from a JSON-LD `BreadcrumbList`, without the home crumb
/// and the product itself.
fn breadcrumbs(html: &str) -> CategoryPath {
    let Some(list) = jsonld_of_type(html, "BreadcrumbList") else {
        return CategoryPath::default();
    };
    let mut names: Vec<String> = Loose::new(&list)
        .get("itemListElement")
        .items()
        .into_iter()
        .filter_map(|crumb| crumb.get("name").str().or_else(|| crumb.get("/item/name").str()))
        .filter(|name| !name.eq_ignore_ascii_case("home"))
        .collect();
    if names.len() > 1 {
        names.pop();
    }
    CategoryPath::from_segments(names)
}

fn variant_sku(
    variant: Loose<'_>,
    product_price: &Price,
    currency: &str,
) -> Result<Sku, HarvestError> {
    let source_id = variant.get("id").str().ok_or_else(|| HarvestError::Normalization {
        source_id: String::new(),
        reason: "variant without id".to_owned(),
    })?;

    let price = price_of(variant.get("price"), currency)?.unwrap_or_else(|| product_price.clone());

    let stock = match (variant.get("available").bool(), variant.get("quantity").i64()) {
        (Some(false), _) => Stock::out_of_stock(),
        (_, Some(quantity)) => Stock::from_quantity(quantity),
        _ => Stock::in_stock(),
    };

    let specs = VARIANT_AXES
        .iter()
        .filter_map(|(key, axis)| {
            let attr = variant.get(key);
            // Attributes come as `{"id", "name", "swatch"}` or a bare value.
            let name = attr.get("name").str().or_else(|| attr.str())?;
            Some(SkuSpecOption {
                axis: *axis,
                id: attr.get("id").str().unwrap_or_else(|| name.to_lowercase()),
                value: attr
                    .get("value")
                    .str()
                    .unwrap_or_else(|| name.to_lowercase()),
                name,
                icon: attr.get("swatch").str(),
                index: attr.get("index").u64().and_then(|i| u32::try_from(i).ok()),
            })
        })
        .collect();

    let mut media = media_list(variant.get("images"));
    if !media.is_empty() {
        ensure_single_default(&mut media);
    }

    Ok(Sku {
        source_id,
        price,
        stock,
        specs,
        media,
    })
}
