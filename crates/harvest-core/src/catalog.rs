//! The canonical catalog entity model every site module normalizes into.
//!
//! A [`CanonicalProduct`] owns its [`Sku`]s and product-level [`Media`].
//! Prices are integer minor units (see [`crate::price`]). Call
//! [`CanonicalProduct::validate`] before handing an entity to a sink.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::price::compute_discount;

/// Fixed depth of the category taxonomy.
pub const CATEGORY_DEPTH: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockStatus {
    InStock,
    OutOfStock,
}

/// Stock summary for a product or a single SKU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stock {
    pub status: StockStatus,
    /// Units on hand, when the source exposes inventory counts.
    pub quantity: Option<u32>,
}

impl Stock {
    #[must_use]
    pub fn in_stock() -> Self {
        Self {
            status: StockStatus::InStock,
            quantity: None,
        }
    }

    #[must_use]
    pub fn out_of_stock() -> Self {
        Self {
            status: StockStatus::OutOfStock,
            quantity: Some(0),
        }
    }

    /// Derives stock from an availability flag.
    #[must_use]
    pub fn from_available(available: bool) -> Self {
        if available {
            Self::in_stock()
        } else {
            Self::out_of_stock()
        }
    }

    /// Derives stock from an inventory count. Negative counts (backorder
    /// ledgers) are treated as zero.
    #[must_use]
    pub fn from_quantity(quantity: i64) -> Self {
        let quantity = u32::try_from(quantity.max(0)).unwrap_or(u32::MAX);
        Self {
            status: if quantity > 0 {
                StockStatus::InStock
            } else {
                StockStatus::OutOfStock
            },
            quantity: Some(quantity),
        }
    }

    #[must_use]
    pub fn is_in_stock(&self) -> bool {
        self.status == StockStatus::InStock
    }
}

/// Price in integer minor units of `currency`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// ISO 4217 code, upper-case.
    pub currency: String,
    pub current: i64,
    /// List price before markdown. `None` when the source reports no
    /// comparison price.
    pub msrp: Option<i64>,
    /// Whole-percent markdown of `current` against `msrp`.
    pub discount: u32,
}

impl Price {
    /// Builds a price and derives `discount`.
    ///
    /// An `msrp` below `current` is raised to `current`, so a stored price
    /// always satisfies `current <= msrp`.
    #[must_use]
    pub fn new(currency: &str, current: i64, msrp: Option<i64>) -> Self {
        let msrp = msrp.map(|m| m.max(current));
        let discount = msrp.map_or(0, |m| compute_discount(current, m));
        Self {
            currency: currency.to_ascii_uppercase(),
            current,
            msrp,
            discount,
        }
    }

    #[must_use]
    pub fn is_on_sale(&self) -> bool {
        self.discount > 0
    }

    fn check(&self, source_id: &str) -> Result<(), CoreError> {
        let invalid = |reason: String| CoreError::Invalid {
            source_id: source_id.to_owned(),
            reason,
        };
        if self.currency.len() != 3 {
            return Err(invalid(format!("invalid currency code {:?}", self.currency)));
        }
        if self.current < 0 {
            return Err(invalid(format!("negative price {}", self.current)));
        }
        if self.discount > 100 {
            return Err(invalid(format!("discount {} exceeds 100", self.discount)));
        }
        match self.msrp {
            Some(msrp) if self.current > msrp => Err(invalid(format!(
                "current price {} exceeds msrp {msrp}",
                self.current
            ))),
            None if self.discount > 0 => {
                Err(invalid("discount set without an msrp".to_owned()))
            }
            _ => Ok(()),
        }
    }
}

/// Review statistics with the rating normalized to a 0–5 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewStats {
    pub count: u32,
    pub rating: f32,
}

impl ReviewStats {
    /// Rescales `rating` from `0..=scale_max` onto `0..=5`.
    #[must_use]
    pub fn normalized(count: u32, rating: f32, scale_max: f32) -> Self {
        let rating = if scale_max > 0.0 {
            (rating / scale_max * 5.0).clamp(0.0, 5.0)
        } else {
            0.0
        };
        Self { count, rating }
    }
}

/// Category breadcrumb truncated or padded to [`CATEGORY_DEPTH`] levels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryPath {
    levels: [Option<String>; CATEGORY_DEPTH],
}

impl CategoryPath {
    /// Keeps the first [`CATEGORY_DEPTH`] non-blank segments, trimmed.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut levels: [Option<String>; CATEGORY_DEPTH] = Default::default();
        let kept = segments
            .into_iter()
            .map(|s| s.as_ref().trim().to_owned())
            .filter(|s| !s.is_empty())
            .take(CATEGORY_DEPTH);
        for (slot, segment) in levels.iter_mut().zip(kept) {
            *slot = Some(segment);
        }
        Self { levels }
    }

    #[must_use]
    pub fn level(&self, depth: usize) -> Option<&str> {
        self.levels.get(depth).and_then(Option::as_deref)
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.levels.iter().take_while(|l| l.is_some()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.levels.iter().map_while(Option::as_deref)
    }
}

/// Variant axis a [`SkuSpecOption`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecAxis {
    Color,
    Size,
    Width,
    Inseam,
    Style,
}

impl std::fmt::Display for SpecAxis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpecAxis::Color => write!(f, "color"),
            SpecAxis::Size => write!(f, "size"),
            SpecAxis::Width => write!(f, "width"),
            SpecAxis::Inseam => write!(f, "inseam"),
            SpecAxis::Style => write!(f, "style"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkuSpecOption {
    pub axis: SpecAxis,
    /// Stable id of the option within the product, e.g. a color code.
    pub id: String,
    /// Display name, e.g. `"Heather Grey"`.
    pub name: String,
    /// Comparison value, usually the lower-cased name or a size code.
    pub value: String,
    /// Swatch image URL.
    pub icon: Option<String>,
    /// Ordering position within the axis.
    pub index: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub id: String,
    pub kind: MediaKind,
    pub small_url: Option<String>,
    pub medium_url: Option<String>,
    pub large_url: Option<String>,
    pub original_url: String,
    pub is_default: bool,
}

impl Media {
    /// An image known only by its original URL.
    #[must_use]
    pub fn image(id: impl Into<String>, original_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: MediaKind::Image,
            small_url: None,
            medium_url: None,
            large_url: None,
            original_url: original_url.into(),
            is_default: false,
        }
    }
}

/// Marks exactly one entry of a non-empty media list as default: the first
/// flagged entry wins, otherwise the first entry.
pub fn ensure_single_default(media: &mut [Media]) {
    let winner = media.iter().position(|m| m.is_default).unwrap_or(0);
    for (i, m) in media.iter_mut().enumerate() {
        m.is_default = i == winner;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sku {
    /// Unique within the owning product.
    pub source_id: String,
    pub price: Price,
    pub stock: Stock,
    /// At most one option per [`SpecAxis`].
    pub specs: Vec<SkuSpecOption>,
    /// Variant-scoped media. Empty means "use the product media".
    pub media: Vec<Media>,
}

impl Sku {
    #[must_use]
    pub fn spec(&self, axis: SpecAxis) -> Option<&SkuSpecOption> {
        self.specs.iter().find(|s| s.axis == axis)
    }

    /// Variant media, falling back to the product-level gallery.
    #[must_use]
    pub fn effective_media<'a>(&'a self, product: &'a CanonicalProduct) -> &'a [Media] {
        if self.media.is_empty() {
            &product.media
        } else {
            &self.media
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalProduct {
    pub source_id: String,
    /// URL the entity was harvested from.
    pub crawl_url: String,
    /// Normalized product URL, see the scraper's `canonicalize`.
    pub canonical_url: String,
    /// Links color/style variants that the source lists as separate products.
    pub group_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub brand: Option<String>,
    pub category: CategoryPath,
    pub price: Price,
    pub stock: Stock,
    pub stats: Option<ReviewStats>,
    pub skus: Vec<Sku>,
    pub media: Vec<Media>,
}

impl CanonicalProduct {
    #[must_use]
    pub fn has_available_skus(&self) -> bool {
        self.skus.iter().any(|s| s.stock.is_in_stock())
    }

    #[must_use]
    pub fn default_media(&self) -> Option<&Media> {
        self.media.iter().find(|m| m.is_default)
    }

    /// Checks the entity invariants:
    ///
    /// - non-empty `source_id` and `title`;
    /// - every price has `current <= msrp` when `msrp` is set, and a
    ///   positive discount only alongside an `msrp`;
    /// - every SKU is priced in the product currency;
    /// - SKU ids are unique and each SKU carries at most one option per axis;
    /// - a non-empty product gallery has exactly one default, a SKU gallery
    ///   at most one.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant as a [`CoreError`].
    pub fn validate(&self) -> Result<(), CoreError> {
        let invalid = |reason: &str| CoreError::Invalid {
            source_id: self.source_id.clone(),
            reason: reason.to_owned(),
        };
        if self.source_id.trim().is_empty() {
            return Err(invalid("empty source id"));
        }
        if self.title.trim().is_empty() {
            return Err(invalid("empty title"));
        }
        self.price.check(&self.source_id)?;

        let defaults = self.media.iter().filter(|m| m.is_default).count();
        if !self.media.is_empty() && defaults != 1 {
            return Err(invalid(&format!(
                "expected one default media, found {defaults}"
            )));
        }

        let mut seen_skus = HashSet::new();
        for sku in &self.skus {
            if !seen_skus.insert(sku.source_id.as_str()) {
                return Err(CoreError::DuplicateSku {
                    source_id: self.source_id.clone(),
                    sku_id: sku.source_id.clone(),
                });
            }
            if sku.price.currency != self.price.currency {
                return Err(CoreError::CurrencyMismatch {
                    source_id: self.source_id.clone(),
                    sku_id: sku.source_id.clone(),
                    sku_currency: sku.price.currency.clone(),
                    product_currency: self.price.currency.clone(),
                });
            }
            sku.price.check(&self.source_id)?;

            let mut axes = HashSet::new();
            for spec in &sku.specs {
                if !axes.insert(spec.axis) {
                    return Err(CoreError::DuplicateSpecAxis {
                        source_id: self.source_id.clone(),
                        sku_id: sku.source_id.clone(),
                        axis: spec.axis.to_string(),
                    });
                }
            }

            if sku.media.iter().filter(|m| m.is_default).count() > 1 {
                return Err(invalid(&format!(
                    "sku {} has more than one default media",
                    sku.source_id
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "catalog_test.rs"]
mod tests;
