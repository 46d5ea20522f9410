//! Lenient numeric parsing for upstream payloads.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::Value;

/// Parse a decimal from an upstream string ("187.41000", "1e-8", "").
pub(crate) fn parse_decimal(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Decimal::from_str(trimmed)
        .ok()
        .or_else(|| Decimal::from_scientific(trimmed).ok())
        .or_else(|| trimmed.parse::<f64>().ok().and_then(|f| Decimal::try_from(f).ok()))
}

/// Read a decimal from a JSON number or numeric string.
pub(crate) fn json_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => parse_decimal(s),
        Value::Number(n) => n
            .as_f64()
            .and_then(|f| Decimal::try_from(f).ok())
            .or_else(|| parse_decimal(&n.to_string())),
        _ => None,
    }
}
