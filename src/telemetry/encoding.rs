//! Text encoding detection for untagged modem payloads.
//!
//! Depending on `AT+CSCS` and firmware, text fields (operator names, own
//! number, SMS senders and bodies) arrive either as plain text or as hex. Hex
//! may encode UCS-2 (UTF-16BE) or UTF-8, and nothing on the wire says which.
//! [`decode`] scores both readings and picks one; there is no "undecodable"
//! outcome, only a best guess.

use std::char::REPLACEMENT_CHARACTER;

use serde::Serialize;

/// Minimum share of hex digits for a candidate to be treated as hex.
const MIN_HEX_FRACTION: f64 = 0.7;

/// Zero high-byte ratio above which UTF-16BE is preferred.
const ZERO_EVEN_THRESHOLD: f64 = 0.3;

/// How much better UTF-8 must score to override a UTF-16BE preference.
const UTF8_OVERRIDE_MARGIN: f64 = 0.1;

/// Number fields shorter than this are passed through (short codes).
const MIN_ENCODED_NUMBER_LEN: usize = 12;

/// How a candidate field was interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextEncoding {
    Utf16Be,
    Utf8,
    PlainText,
}

/// Result of decoding one candidate field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedText {
    pub raw: String,
    pub decoded: String,
    pub encoding: TextEncoding,
}

impl DecodedText {
    fn plain(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            decoded: raw.trim().to_string(),
            encoding: TextEncoding::PlainText,
        }
    }
}

/// Decode a field that may be plain text, hex UTF-16BE, or hex UTF-8.
pub fn decode(candidate: &str) -> DecodedText {
    let compact: Vec<char> = candidate.chars().filter(|c| !c.is_whitespace()).collect();
    let hex: String = compact.iter().filter(|c| c.is_ascii_hexdigit()).collect();

    #[allow(clippy::cast_precision_loss)]
    let hex_fraction = if compact.is_empty() {
        0.0
    } else {
        hex.len() as f64 / compact.len() as f64
    };
    if hex.len() < 2 || hex_fraction < MIN_HEX_FRACTION {
        return DecodedText::plain(candidate);
    }

    // A dangling nibble is tolerated: drop it
    let even_len = hex.len() & !1;
    let bytes = hex_to_bytes(&hex[..even_len]);

    let utf16 = decode_utf16be(&bytes);
    let utf8 = String::from_utf8_lossy(&bytes).into_owned();
    let encoding = choose_encoding(
        zero_even_ratio(&bytes),
        readability(&utf16),
        readability(&utf8),
    );

    let decoded = match encoding {
        TextEncoding::Utf16Be => utf16,
        _ => utf8,
    };
    DecodedText {
        raw: candidate.to_string(),
        decoded,
        encoding,
    }
}

/// Decode a telephone-number field.
///
/// Short numeric strings (short codes, local numbers) are passed through
/// unchanged. A hex string longer than 11 characters that starts with an
/// encoded `+` (`002B`) or the zero triplet `003` is decoded.
pub fn decode_number(raw: &str) -> DecodedText {
    let value = raw.trim().trim_matches('"');
    if looks_like_encoded_number(value) {
        let mut decoded = decode(value);
        decoded.raw = raw.to_string();
        decoded
    } else {
        DecodedText {
            raw: raw.to_string(),
            decoded: value.to_string(),
            encoding: TextEncoding::PlainText,
        }
    }
}

/// Encode a string as uppercase UCS-2 (UTF-16BE) hex, the form modems use
/// with `AT+CSCS="UCS2"`.
pub fn encode_ucs2(text: &str) -> String {
    text.encode_utf16().map(|unit| format!("{unit:04X}")).collect()
}

fn looks_like_encoded_number(value: &str) -> bool {
    if value.len() < MIN_ENCODED_NUMBER_LEN || !value.chars().all(|c| c.is_ascii_hexdigit()) {
        return false;
    }
    let upper = value.to_ascii_uppercase();
    upper.starts_with("002B") || upper.starts_with("003")
}

/// Pick an encoding from the zero-high-byte ratio and the two readability
/// scores. Ties favour UTF-8.
pub(crate) fn choose_encoding(zero_even_ratio: f64, utf16_score: f64, utf8_score: f64) -> TextEncoding {
    if zero_even_ratio > ZERO_EVEN_THRESHOLD {
        if utf8_score > utf16_score + UTF8_OVERRIDE_MARGIN {
            TextEncoding::Utf8
        } else {
            TextEncoding::Utf16Be
        }
    } else if utf16_score > utf8_score {
        TextEncoding::Utf16Be
    } else {
        TextEncoding::Utf8
    }
}

/// Readability score normalized by length: +1 per letter, digit, space or
/// punctuation, -2 per control character, -5 per replacement character.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn readability(text: &str) -> f64 {
    let mut total = 0i64;
    let mut count = 0i64;
    for c in text.chars() {
        count += 1;
        total += if c == REPLACEMENT_CHARACTER {
            -5
        } else if c.is_control() {
            -2
        } else if c.is_alphanumeric() || c.is_whitespace() || is_punctuation(c) {
            1
        } else {
            0
        };
    }
    if count == 0 {
        return 0.0;
    }
    total as f64 / count as f64
}

/// Fraction of even-indexed bytes (UTF-16 high bytes) that are zero.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn zero_even_ratio(bytes: &[u8]) -> f64 {
    let evens: Vec<u8> = bytes.iter().step_by(2).copied().collect();
    if evens.is_empty() {
        return 0.0;
    }
    let zeros = evens.iter().filter(|&&b| b == 0).count();
    zeros as f64 / evens.len() as f64
}

fn is_punctuation(c: char) -> bool {
    c.is_ascii_punctuation()
        || matches!(
            c,
            '\u{00A1}'..='\u{00BF}'
                | '\u{2010}'..='\u{205E}'
                | '\u{3001}'..='\u{303F}'
                | '\u{FF01}'..='\u{FF0F}'
                | '\u{FF1A}'..='\u{FF20}'
        )
}

fn hex_to_bytes(hex: &str) -> Vec<u8> {
    hex.as_bytes()
        .chunks_exact(2)
        .filter_map(|pair| {
            let s = std::str::from_utf8(pair).ok()?;
            u8::from_str_radix(s, 16).ok()
        })
        .collect()
}

fn decode_utf16be(bytes: &[u8]) -> String {
    let units = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
    let mut text: String = char::decode_utf16(units)
        .map(|r| r.unwrap_or(REPLACEMENT_CHARACTER))
        .collect();
    if bytes.len() % 2 == 1 {
        text.push(REPLACEMENT_CHARACTER);
    }
    text
}
