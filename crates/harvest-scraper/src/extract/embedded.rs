//! Locating structured data embedded in HTML.
//!
//! Each locator returns `None` when the payload is absent and
//! `Some(Err(_))` when it is present but does not parse, so callers can tell
//! a soft block (payload stripped) from a schema change (payload malformed).

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static JSONLD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<script[^>]+type\s*=\s*["']application/ld\+json["'][^>]*>(.*?)</script>"#)
        .expect("valid regex")
});

/// Parses the body of `<script id="{id}">…</script>` as JSON.
#[must_use]
pub fn script_json_by_id(html: &str, id: &str) -> Option<Result<Value, serde_json::Error>> {
    let pattern = format!(
        r#"(?is)<script[^>]*\bid\s*=\s*["']{}["'][^>]*>(.*?)</script>"#,
        regex::escape(id)
    );
    let re = Regex::new(&pattern).ok()?;
    let body = re.captures(html)?.get(1)?.as_str().trim();
    Some(serde_json::from_str(body))
}

/// Parses the object or array literal assigned to `var` in inline script,
/// e.g. `window.pdpData = {...};`.
///
/// The literal is delimited by bracket balancing that skips over string
/// contents, so trailing script after the `;` is ignored.
#[must_use]
pub fn assigned_json(html: &str, var: &str) -> Option<Result<Value, serde_json::Error>> {
    let re = Regex::new(&format!(r"{}\s*=\s*", regex::escape(var))).ok()?;
    for m in re.find_iter(html) {
        let rest = &html[m.end()..];
        if !rest.starts_with(['{', '[']) {
            continue;
        }
        if let Some(literal) = balanced_prefix(rest) {
            return Some(serde_json::from_str(literal));
        }
    }
    None
}

/// Every JSON object from `<script type="application/ld+json">` blocks.
///
/// Top-level arrays are flattened and `@graph` containers expanded.
/// Blocks that fail to parse are skipped.
#[must_use]
pub fn jsonld_objects(html: &str) -> Vec<Value> {
    let mut results = Vec::new();

    for cap in JSONLD_RE.captures_iter(html) {
        let Some(json_text) = cap.get(1).map(|m| m.as_str()) else {
            continue;
        };
        let Ok(value) = serde_json::from_str::<Value>(json_text.trim()) else {
            tracing::debug!("skipping malformed JSON-LD block");
            continue;
        };

        let candidates = match value {
            Value::Array(items) => items,
            other => vec![other],
        };
        for item in candidates {
            if let Some(graph) = item.get("@graph").and_then(Value::as_array) {
                results.extend(graph.iter().cloned());
            }
            results.push(item);
        }
    }

    results
}

/// First JSON-LD object whose `@type` (string or array) equals `type_name`.
#[must_use]
pub fn jsonld_of_type(html: &str, type_name: &str) -> Option<Value> {
    jsonld_objects(html).into_iter().find(|item| {
        match item.get("@type") {
            Some(Value::String(s)) => s.eq_ignore_ascii_case(type_name),
            Some(Value::Array(types)) => types
                .iter()
                .filter_map(Value::as_str)
                .any(|s| s.eq_ignore_ascii_case(type_name)),
            _ => false,
        }
    })
}

/// The shortest prefix of `s` (which starts with `{` or `[`) whose brackets
/// balance, ignoring brackets inside string literals.
fn balanced_prefix(s: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut escaped = false;

    for (i, &b) in s.as_bytes().iter().enumerate() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == q {
                quote = None;
            }
            continue;
        }
        match b {
            b'"' | b'\'' => quote = Some(b),
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}
