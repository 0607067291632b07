//! Money arithmetic for canonical prices.
//!
//! Storefronts report prices as display strings (`"$1,234.50"`, `"129.00"`,
//! `"¥3,200"`). Canonical prices are integer minor units in the currency's
//! native exponent, so `"$12.99"` becomes `1299` and `"¥3,200"` stays `3200`.

use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::error::CoreError;

/// Number of minor-unit digits for an ISO 4217 currency code.
///
/// Unknown codes fall back to `2`, which covers the large majority of
/// storefront currencies.
#[must_use]
pub fn currency_exponent(currency: &str) -> u32 {
    match currency.to_ascii_uppercase().as_str() {
        "JPY" | "KRW" | "VND" | "CLP" | "ISK" | "UGX" | "PYG" => 0,
        "BHD" | "KWD" | "JOD" | "OMR" | "TND" | "IQD" | "LYD" => 3,
        _ => 2,
    }
}

/// Parses a display price into integer minor units of `currency`.
///
/// Currency symbols, letters and whitespace (including no-break spaces used
/// as grouping) are discarded. When both `.` and `,` appear, the one that
/// comes last is the decimal separator and the other groups thousands, so
/// `"1.234,56"` and `"1,234.56"` read the same. A lone comma followed by one
/// or two digits (`"12,99"`) is a decimal comma; repeated dots with no comma
/// (`"1.234.567"`) are grouping.
///
/// # Errors
///
/// Returns [`CoreError::InvalidPrice`] when no number is present, when the
/// value is negative, or when it overflows `i64` minor units.
pub fn parse_minor_units(raw: &str, currency: &str) -> Result<i64, CoreError> {
    let invalid = |reason: &str| CoreError::InvalidPrice {
        raw: raw.to_owned(),
        reason: reason.to_owned(),
    };

    let kept: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'))
        .collect();
    if !kept.chars().any(|c| c.is_ascii_digit()) {
        return Err(invalid("no digits"));
    }

    let numeric = match (kept.rfind('.'), kept.rfind(',')) {
        (Some(dot), Some(comma)) if comma > dot => kept.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => kept.replace(',', ""),
        (None, Some(comma))
            if kept.matches(',').count() == 1 && matches!(kept.len() - comma - 1, 1 | 2) =>
        {
            kept.replace(',', ".")
        }
        (None, Some(_)) => kept.replace(',', ""),
        (Some(_), None) if kept.matches('.').count() > 1 => kept.replace('.', ""),
        _ => kept,
    };

    let value = Decimal::from_str(&numeric).map_err(|e| invalid(&e.to_string()))?;
    if value.is_sign_negative() && !value.is_zero() {
        return Err(invalid("negative amount"));
    }

    let scale = Decimal::from(10_i64.pow(currency_exponent(currency)));
    value
        .checked_mul(scale)
        .map(|v| v.round())
        .and_then(|v| v.to_i64())
        .ok_or_else(|| invalid("amount out of range"))
}

/// Percentage discount of `current` against `msrp`, rounded up.
///
/// `discount = ceil((msrp - current) / msrp * 100)`, clamped to `0..=100`.
/// Returns `0` when `msrp` is not positive or `current >= msrp`.
#[must_use]
pub fn compute_discount(current: i64, msrp: i64) -> u32 {
    if msrp <= 0 || current >= msrp {
        return 0;
    }
    let delta = i128::from(msrp - current.max(0)) * 100;
    let msrp = i128::from(msrp);
    let pct = (delta + msrp - 1) / msrp;
    u32::try_from(pct.clamp(0, 100)).unwrap_or(100)
}
