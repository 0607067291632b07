//! Listing pagination decisions.
//!
//! Two continuation styles are covered:
//!
//! - offset windows ([`PageWindow`]): the source reports a start offset, page
//!   size, and usually a total count and last-item index;
//! - cursor links ([`next_link_cursor`]): the source puts the next page URL
//!   in a `Link` header, with the cursor in a query parameter.
//!
//! ## Link header format
//!
//! ```text
//! <https://shop.com/products.json?limit=250&page_info=PREV>; rel="previous",
//! <https://shop.com/products.json?limit=250&page_info=NEXT>; rel="next"
//! ```

/// The window of items one listing page covered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    /// Zero-based index of the first item on this page.
    pub offset: u64,
    /// Items actually observed on this page.
    pub observed: u64,
    /// Requested or reported page size.
    pub page_size: u64,
    /// Total item count reported by the source.
    pub total: Option<u64>,
    /// Zero-based index of the last item as reported by the source.
    pub reported_end: Option<u64>,
}

impl PageWindow {
    /// Offset of the next page, or `None` when the listing is exhausted.
    ///
    /// With a total count, traversal stops once `offset + observed` reaches
    /// it. That observed bound wins over `reported_end`: a source whose `end`
    /// claims more pages than the items seen cannot extend traversal past
    /// the total. A reported `end` at or beyond the last index also stops.
    /// Without a total count, only a full page continues.
    ///
    /// An empty page always stops.
    #[must_use]
    pub fn next_offset(&self) -> Option<u64> {
        if self.observed == 0 || self.page_size == 0 {
            return None;
        }
        let fetched = self.offset.saturating_add(self.observed);
        match self.total {
            Some(total) => {
                if fetched >= total {
                    return None;
                }
                if self
                    .reported_end
                    .is_some_and(|end| end.saturating_add(1) >= total)
                {
                    return None;
                }
                Some(fetched)
            }
            None => (self.observed >= self.page_size).then_some(fetched),
        }
    }
}

/// Parses a `Link` header value and extracts the `param` cursor of the
/// `rel="next"` target.
///
/// Returns `None` if:
/// - `link_header` is `None`,
/// - there is no `rel="next"` segment (last page reached),
/// - the next URL carries no `param` query parameter.
#[must_use]
pub fn next_link_cursor(link_header: Option<&str>, param: &str) -> Option<String> {
    let header = link_header?;

    for segment in header.split(',') {
        let segment = segment.trim();

        if !segment.contains(r#"rel="next""#) {
            continue;
        }

        let url = extract_angle_bracket_url(segment)?;
        return extract_query_param(url, param);
    }

    None
}

/// Extracts the URL between `<` and `>` in a link directive segment.
fn extract_angle_bracket_url(segment: &str) -> Option<&str> {
    let start = segment.find('<')? + 1;
    let end = segment.find('>')?;
    if start >= end {
        return None;
    }
    Some(&segment[start..end])
}

/// Extracts the value of a named query parameter from a URL string.
///
/// Cursor values are base64url and are returned undecoded.
fn extract_query_param(url: &str, param: &str) -> Option<String> {
    let query_start = url.find('?')? + 1;
    let query = &url[query_start..];

    let needle = format!("{param}=");
    for pair in query.split('&') {
        if let Some(value) = pair.strip_prefix(needle.as_str()) {
            let value = value.split('#').next().unwrap_or(value);
            if !value.is_empty() {
                return Some(value.to_owned());
            }
        }
    }
    None
}
