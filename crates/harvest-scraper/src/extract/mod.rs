//! Extractor contract and shared extraction helpers.
//!
//! An extractor turns one buffered response into an ordered list of
//! [`Output`]s. It never recurses and never fetches: follow-up requests are
//! returned as [`Output::Fetch`] and the engine hands them to the scheduler.

mod embedded;
mod loose;

pub use embedded::{assigned_json, jsonld_objects, jsonld_of_type, script_json_by_id};
pub use loose::Loose;

use harvest_core::CanonicalProduct;

use crate::classify::PageKind;
use crate::fetch::FetchDescriptor;

/// One item an extractor produced, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    Product(Box<CanonicalProduct>),
    Fetch {
        descriptor: FetchDescriptor,
        /// Page kind the extractor expects the response to classify as.
        kind_hint: Option<PageKind>,
    },
}

impl Output {
    #[must_use]
    pub fn product(product: CanonicalProduct) -> Self {
        Self::Product(Box::new(product))
    }

    #[must_use]
    pub fn fetch(descriptor: FetchDescriptor, kind_hint: PageKind) -> Self {
        Self::Fetch {
            descriptor,
            kind_hint: Some(kind_hint),
        }
    }

    #[must_use]
    pub fn is_fetch(&self) -> bool {
        matches!(self, Self::Fetch { .. })
    }
}
