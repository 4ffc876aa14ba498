//! Lenient parsing of provider JSON fields.
//!
//! The provider is inconsistent about types (numbers arrive as numbers or strings,
//! dates with or without a time part), so every accessor here returns `Option`
//! and never fails loudly.

use chrono::NaiveDate;
use serde_json::Value;

/// Parse a finite number from a JSON number or numeric string. Accepts a decimal
/// comma (`"40,5"`).
pub fn parse_number(raw: &Value) -> Option<f64> {
    let v = match raw {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<f64>() {
                Ok(v) => v,
                Err(_) => trimmed.replace(',', ".").parse::<f64>().ok()?,
            }
        }
        _ => return None,
    };
    if v.is_finite() { Some(v) } else { None }
}

/// Parse the calendar date out of `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM:SS[...]` or
/// `YYYY-MM-DD HH:MM:SS`.
pub fn parse_date(raw: &Value) -> Option<NaiveDate> {
    let s = raw.as_str()?.trim();
    let date_part = s.split(['T', ' ']).next()?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// Render a scalar field as text. Ids and labels may be numbers or strings.
pub fn as_text(raw: &Value) -> Option<String> {
    match raw {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
