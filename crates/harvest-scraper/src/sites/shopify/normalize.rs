//! Normalization from raw Shopify types to [`harvest_core::CanonicalProduct`].

use harvest_core::{
    ensure_single_default, parse_minor_units, CanonicalProduct, CategoryPath, Media, Price, Sku,
    SkuSpecOption, SpecAxis, Stock,
};
use url::Url;

use crate::canonical::canonicalize;
use crate::error::HarvestError;

use super::types::{ShopifyImage, ShopifyPrice, ShopifyProduct, ShopifyVariant};

/// Pixel widths requested from the Shopify CDN for small/medium/large.
const IMAGE_WIDTHS: [u32; 3] = [240, 640, 1200];

/// Store-level facts the product payload does not carry.
#[derive(Debug, Clone, Copy)]
pub struct StoreContext<'a> {
    /// `https://shop.example.com`
    pub origin: &'a str,
    /// URL the payload was fetched from.
    pub crawl_url: &'a str,
    /// Shopify payloads carry amounts without a currency.
    pub currency: &'a str,
}

/// Normalizes a raw [`ShopifyProduct`] into a [`CanonicalProduct`].
///
/// The storefront-default variant (position 1, else the first) sets the
/// product price. The product is in stock when any variant is.
///
/// # Errors
///
/// - [`HarvestError::Normalization`] if the product has no variants.
/// - [`HarvestError::Entity`] if a variant price cannot be parsed.
/// - [`HarvestError::InvalidUrl`] if the handle does not form a URL.
pub fn normalize_product(
    product: ShopifyProduct,
    store: &StoreContext<'_>,
) -> Result<CanonicalProduct, HarvestError> {
    if product.variants.is_empty() {
        return Err(HarvestError::Normalization {
            source_id: product.id.to_string(),
            reason: "product has no variants".into(),
        });
    }

    let source_id = product.id.to_string();
    let canonical_url = canonicalize(&format!("/products/{}", product.handle), Some(store.origin))?;

    let axes: Vec<Option<SpecAxis>> = product
        .options
        .iter()
        .map(|o| spec_axis(o.name()))
        .collect();
    let value_orders = option_value_orders(&product.variants);

    let mut images: Vec<&ShopifyImage> = product.images.iter().collect();
    images.sort_by_key(|img| img.position.unwrap_or(i32::MAX));
    let mut media: Vec<Media> = images.iter().map(|img| image_media(img)).collect();
    ensure_single_default(&mut media);

    // The position-1 variant is the storefront default. Without position
    // data, fall back to the first variant.
    let default_idx = product
        .variants
        .iter()
        .position(|v| v.position == Some(1))
        .unwrap_or(0);

    let skus = product
        .variants
        .iter()
        .map(|variant| {
            normalize_variant(variant, &axes, &value_orders, &product.images, store.currency)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let price = skus[default_idx].price.clone();
    let stock = Stock::from_available(skus.iter().any(|s| s.stock.is_in_stock()));

    let product_type = product.product_type.filter(|s| !s.trim().is_empty());

    Ok(CanonicalProduct {
        source_id,
        crawl_url: store.crawl_url.to_owned(),
        canonical_url,
        group_id: None,
        title: product.title.trim().to_owned(),
        description: product.body_html.filter(|s| !s.trim().is_empty()),
        brand: product.vendor.filter(|s| !s.trim().is_empty()),
        category: CategoryPath::from_segments(product_type),
        price,
        stock,
        stats: None,
        skus,
        media,
    })
}

fn normalize_variant(
    variant: &ShopifyVariant,
    axes: &[Option<SpecAxis>],
    value_orders: &[Vec<&str>; 3],
    images: &[ShopifyImage],
    currency: &str,
) -> Result<Sku, HarvestError> {
    let current = minor_units(&variant.price, currency)?;
    // "0.00" and "" both mean "not on sale" on some stores.
    let msrp = match &variant.compare_at_price {
        Some(ShopifyPrice::Decimal(raw)) if raw.trim().is_empty() => None,
        Some(price) => Some(minor_units(price, currency)?).filter(|m| *m > 0),
        None => None,
    };

    // Stores that sell past zero report `available` with a non-positive count.
    let stock = match variant.inventory_quantity {
        Some(quantity) if variant.available && quantity > 0 => Stock::from_quantity(quantity),
        _ => Stock::from_available(variant.available),
    };

    let mut specs: Vec<SkuSpecOption> = Vec::new();
    for (slot, value) in variant.option_values().into_iter().enumerate() {
        let (Some(Some(axis)), Some(value)) = (axes.get(slot), value) else {
            continue;
        };
        if specs.iter().any(|s| s.axis == *axis) {
            continue;
        }
        let index = value_orders[slot]
            .iter()
            .position(|v| *v == value)
            .and_then(|i| u32::try_from(i).ok());
        specs.push(SkuSpecOption {
            axis: *axis,
            id: slug(value),
            name: value.to_owned(),
            value: value.to_lowercase(),
            icon: None,
            index,
        });
    }

    let mut media: Vec<Media> = match &variant.featured_image {
        Some(image) => vec![image_media(image)],
        None => images
            .iter()
            .filter(|img| img.variant_ids.contains(&variant.id))
            .map(image_media)
            .collect(),
    };
    if !media.is_empty() {
        ensure_single_default(&mut media);
    }

    Ok(Sku {
        source_id: variant.id.to_string(),
        price: Price::new(currency, current, msrp),
        stock,
        specs,
        media,
    })
}

fn minor_units(price: &ShopifyPrice, currency: &str) -> Result<i64, HarvestError> {
    match price {
        ShopifyPrice::Decimal(raw) => Ok(parse_minor_units(raw, currency)?),
        ShopifyPrice::Minor(units) => Ok(*units),
    }
}

/// Maps a Shopify option name onto a canonical axis. `"Title"` and
/// merchant-specific axes have none.
fn spec_axis(name: &str) -> Option<SpecAxis> {
    match name.trim().to_ascii_lowercase().as_str() {
        "color" | "colour" | "colors" | "colours" => Some(SpecAxis::Color),
        "size" | "sizes" | "shoe size" => Some(SpecAxis::Size),
        "width" => Some(SpecAxis::Width),
        "inseam" | "length" | "leg length" => Some(SpecAxis::Inseam),
        "style" | "fit" => Some(SpecAxis::Style),
        _ => None,
    }
}

/// Distinct option values per slot, in first-seen variant order.
fn option_value_orders(variants: &[ShopifyVariant]) -> [Vec<&str>; 3] {
    let mut orders: [Vec<&str>; 3] = Default::default();
    for variant in variants {
        for (slot, value) in variant.option_values().into_iter().enumerate() {
            if let Some(value) = value {
                if !orders[slot].contains(&value) {
                    orders[slot].push(value);
                }
            }
        }
    }
    orders
}

fn slug(value: &str) -> String {
    value
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

fn image_media(image: &ShopifyImage) -> Media {
    let original = match image.src.strip_prefix("//") {
        Some(rest) => format!("https://{rest}"),
        None => image.src.clone(),
    };
    let id = image.id.map_or_else(|| original.clone(), |id| id.to_string());
    let [small, medium, large] = IMAGE_WIDTHS.map(|w| sized_image_url(&original, w));

    let mut media = Media::image(id, original);
    media.small_url = small;
    media.medium_url = medium;
    media.large_url = large;
    media
}

/// The Shopify CDN resizes on a `width` query parameter.
fn sized_image_url(original: &str, width: u32) -> Option<String> {
    let mut url = Url::parse(original).ok()?;
    url.query_pairs_mut()
        .append_pair("width", &width.to_string());
    Some(url.to_string())
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
