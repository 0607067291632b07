//! Read-only accessors over loosely typed site JSON.
//!
//! Storefront payloads drift: a price is `29.99` on one page and `"29.99"` on
//! the next, a count is `"12"` or `12`, a list is sometimes a single object.
//! [`Loose`] absorbs that drift so site modules can convert straight into the
//! strict catalog types without a serde struct per payload variant.

use serde_json::Value;

#[derive(Debug, Clone, Copy)]
pub struct Loose<'a>(&'a Value);

static NULL: Value = Value::Null;

impl<'a> Loose<'a> {
    #[must_use]
    pub fn new(value: &'a Value) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn raw(self) -> &'a Value {
        self.0
    }

    /// Child at `key`; a JSON pointer (`/a/b/0`) when `key` starts with `/`.
    #[must_use]
    pub fn get(self, key: &str) -> Loose<'a> {
        let child = if key.starts_with('/') {
            self.0.pointer(key)
        } else {
            self.0.get(key)
        };
        Loose(child.unwrap_or(&NULL))
    }

    #[must_use]
    pub fn is_missing(self) -> bool {
        self.0.is_null()
    }

    /// Non-blank string, or a number rendered as a string.
    #[must_use]
    pub fn str(self) -> Option<String> {
        match self.0 {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Number, or a string that parses as one.
    #[must_use]
    pub fn f64(self) -> Option<f64> {
        match self.0 {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Non-negative integer, or a string that parses as one. Fractional
    /// numbers are rejected.
    #[must_use]
    pub fn u64(self) -> Option<u64> {
        match self.0 {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Signed integer, or a string that parses as one.
    #[must_use]
    pub fn i64(self) -> Option<i64> {
        match self.0 {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Boolean, or `"true"`/`"false"` strings.
    #[must_use]
    pub fn bool(self) -> Option<bool> {
        match self.0 {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Array items; a lone non-null value is treated as a one-item list.
    #[must_use]
    pub fn items(self) -> Vec<Loose<'a>> {
        match self.0 {
            Value::Array(items) => items.iter().map(Loose).collect(),
            Value::Null => Vec::new(),
            other => vec![Loose(other)],
        }
    }
}
