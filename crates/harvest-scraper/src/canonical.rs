//! Product URL canonicalization.

use url::Url;

use crate::error::HarvestError;

/// Normalizes a raw product URL.
///
/// - protocol-relative URLs (`//host/path`) get `https:`;
/// - relative URLs are resolved against `base` (an origin or any absolute URL);
/// - the host is lower-cased and default ports dropped;
/// - query string and fragment are removed.
///
/// The function is idempotent: `canonicalize(canonicalize(u)) == canonicalize(u)`.
///
/// # Errors
///
/// Returns [`HarvestError::InvalidUrl`] when the URL cannot be resolved, or
/// its scheme is not `http`/`https`.
pub fn canonicalize(raw: &str, base: Option<&str>) -> Result<String, HarvestError> {
    let invalid = |reason: String| HarvestError::InvalidUrl {
        url: raw.to_owned(),
        reason,
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(invalid("empty URL".to_owned()));
    }

    let mut url = if let Some(rest) = trimmed.strip_prefix("//") {
        Url::parse(&format!("https://{rest}")).map_err(|e| invalid(e.to_string()))?
    } else {
        match Url::parse(trimmed) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = base.ok_or_else(|| invalid("relative URL without base".to_owned()))?;
                let base = Url::parse(base).map_err(|e| invalid(format!("bad base: {e}")))?;
                base.join(trimmed).map_err(|e| invalid(e.to_string()))?
            }
            Err(e) => return Err(invalid(e.to_string())),
        }
    };

    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {}", url.scheme())));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host".to_owned()));
    }

    url.set_query(None);
    url.set_fragment(None);
    Ok(url.to_string())
}

/// `scheme://host[:port]` of an absolute URL.
pub(crate) fn origin_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .map(|u| u.origin().ascii_serialization())
        .filter(|o| o != "null")
}
