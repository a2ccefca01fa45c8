//! Cell and tracking-area identifier normalization.
//!
//! Firmware revisions disagree on how they print cell IDs and TACs: some
//! emit `0x`-prefixed hex, some bare hex, some decimal. Everything is
//! normalized to uppercase hex and the derived fields are computed from that.

use serde::Serialize;

/// A canonical cell or tracking-area identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identifier {
    /// Uppercase hex without prefix (e.g. `1A2B3C`).
    pub hex: String,
    pub decimal: Option<i64>,
    /// Low byte as hex (sector / local cell ID).
    pub short_id: Option<String>,
    pub short_id_decimal: Option<i64>,
    /// Everything above the low byte (eNB ID for LTE, truncated gNB ID for NR).
    pub parent_id: Option<i64>,
}

/// Normalize a cell-ID field that may be `0x` hex, bare hex or decimal.
///
/// Returns `None` for empty/placeholder input or an unparsable decimal.
/// Derived numeric fields fall back to `None` individually.
pub fn normalize_cell_id(raw: &str) -> Option<Identifier> {
    let value = raw.trim().trim_matches('"').trim();
    if value.is_empty() || value == "-" {
        return None;
    }

    let hex = if let Some(rest) = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        rest.to_ascii_uppercase()
    } else if value.chars().any(|c| matches!(c, 'a'..='f' | 'A'..='F')) {
        value.to_ascii_uppercase()
    } else {
        format!("{:X}", value.parse::<u64>().ok()?)
    };
    if hex.is_empty() {
        return None;
    }
    if !hex.is_ascii() {
        return Some(Identifier {
            hex,
            decimal: None,
            short_id: None,
            short_id_decimal: None,
            parent_id: None,
        });
    }

    let decimal = i64::from_str_radix(&hex, 16).ok();
    let (parent_hex, short_hex) = if hex.len() > 2 {
        hex.split_at(hex.len() - 2)
    } else {
        ("", hex.as_str())
    };
    let short_id_decimal = i64::from_str_radix(short_hex, 16).ok();
    let parent_id = if parent_hex.is_empty() {
        None
    } else {
        i64::from_str_radix(parent_hex, 16).ok()
    };

    Some(Identifier {
        short_id: Some(short_hex.to_string()),
        short_id_decimal,
        parent_id,
        decimal,
        hex,
    })
}
