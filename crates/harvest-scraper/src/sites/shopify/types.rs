//! Shopify storefront API response types.
//!
//! ## Endpoints
//!
//! - `GET /products.json` and `GET /collections/<handle>/products.json`
//!   return `{"products": [...]}`.
//! - `GET /products/<handle>.json` returns `{"product": {...}}`.
//! - `GET /products/<handle>.js` returns the product object directly, with
//!   prices as integer cents instead of decimal strings.
//!
//! ### Prices
//! The `.json` endpoints send prices as decimal strings (`"30.00"`); the
//! `.js` endpoint sends integer minor units (`3000`). [`ShopifyPrice`] keeps
//! the distinction so normalization never guesses the scale.
//!
//! ### `compare_at_price`
//! Explicitly `null` when the variant is not on sale. Some stores send
//! `"0.00"` or `""` instead; normalization treats those as absent.
//!
//! ### Options
//! `options` lists the variant axes in order (`["Color", "Size"]` on `.js`,
//! `[{"name": "Color", "position": 1, ...}]` on `.json`). Variant values sit
//! in `option1`..`option3` by position. A single axis named `"Title"` with
//! value `"Default Title"` means the product has no real variants.
//!
//! ### `available` on variants
//! Absent from `/products.json` on older stores. We default to `true`
//! (optimistic) when missing.

use serde::Deserialize;

/// Body of the list endpoints.
#[derive(Debug, Deserialize)]
pub struct ShopifyProductsResponse {
    pub products: Vec<ShopifyProduct>,
}

/// Body of `/products/<handle>.json`.
#[derive(Debug, Deserialize)]
pub struct ShopifyProductResponse {
    pub product: ShopifyProduct,
}

#[derive(Debug, Deserialize)]
pub struct ShopifyProduct {
    pub id: i64,

    pub title: String,

    /// URL slug for the product page.
    pub handle: String,

    #[serde(default, alias = "description")]
    pub body_html: Option<String>,

    /// Merchant-defined type. May be an empty string.
    #[serde(default, alias = "type")]
    pub product_type: Option<String>,

    #[serde(default)]
    pub vendor: Option<String>,

    #[serde(default)]
    pub options: Vec<ShopifyOption>,

    #[serde(default)]
    pub images: Vec<ShopifyImage>,

    pub variants: Vec<ShopifyVariant>,
}

/// A variant axis. `.js` sends bare names, `.json` sends objects.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ShopifyOption {
    Named { name: String },
    Bare(String),
}

impl ShopifyOption {
    pub fn name(&self) -> &str {
        match self {
            ShopifyOption::Named { name } | ShopifyOption::Bare(name) => name,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ShopifyVariant {
    pub id: i64,

    /// `"Black / M"`, or `"Default Title"` for single-variant products.
    pub title: String,

    #[serde(default)]
    pub sku: Option<String>,

    pub price: ShopifyPrice,

    #[serde(default)]
    pub compare_at_price: Option<ShopifyPrice>,

    #[serde(default = "default_available")]
    pub available: bool,

    /// Present on `.json` when inventory tracking is public.
    #[serde(default)]
    pub inventory_quantity: Option<i64>,

    /// 1-based position; `1` is the storefront-default variant.
    #[serde(default)]
    pub position: Option<i32>,

    #[serde(default)]
    pub option1: Option<String>,
    #[serde(default)]
    pub option2: Option<String>,
    #[serde(default)]
    pub option3: Option<String>,

    #[serde(default)]
    pub featured_image: Option<ShopifyImage>,
}

impl ShopifyVariant {
    /// Option values in axis order, `None` for unused slots.
    pub fn option_values(&self) -> [Option<&str>; 3] {
        [
            self.option1.as_deref(),
            self.option2.as_deref(),
            self.option3.as_deref(),
        ]
    }
}

/// A price as the endpoint sent it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ShopifyPrice {
    /// Decimal major units, `"30.00"`.
    Decimal(String),
    /// Integer minor units, `3000`.
    Minor(i64),
}

/// A product image. `.js` lists product images as bare URLs.
#[derive(Debug, Deserialize)]
#[serde(from = "RawImage")]
pub struct ShopifyImage {
    pub id: Option<i64>,
    /// CDN URL, often protocol-relative on `.js`.
    pub src: String,
    /// 1-based image position.
    pub position: Option<i32>,
    pub variant_ids: Vec<i64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawImage {
    Object {
        #[serde(default)]
        id: Option<i64>,
        src: String,
        #[serde(default)]
        position: Option<i32>,
        #[serde(default)]
        variant_ids: Vec<i64>,
    },
    Url(String),
}

impl From<RawImage> for ShopifyImage {
    fn from(raw: RawImage) -> Self {
        match raw {
            RawImage::Object {
                id,
                src,
                position,
                variant_ids,
            } => Self {
                id,
                src,
                position,
                variant_ids,
            },
            RawImage::Url(src) => Self {
                id: None,
                src,
                position: None,
                variant_ids: Vec::new(),
            },
        }
    }
}

/// `serde(default = ...)` needs a function path, not a constant.
fn default_available() -> bool {
    true
}
