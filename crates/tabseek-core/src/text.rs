//! Canonical text rendering and case-insensitive substring matching.
//!
//! Every matching decision in the engine goes through `Needle`, so the
//! rendering rules here define what a search can see: nulls render empty,
//! floats always carry a fractional part, datetimes use one fixed ISO form.

use chrono::{NaiveDate, NaiveDateTime, Timelike};

use crate::types::Scalar;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Render an `f64` in canonical decimal form (`30.0`, `2.5`, `NaN`, `-inf`).
pub fn format_f64(v: f64) -> String {
    if v.is_nan() {
        return "NaN".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let mut s = v.to_string();
    if !s.contains('.') {
        s.push_str(".0");
    }
    s
}

/// Render an `f32` using its own shortest round-trip digits.
pub fn format_f32(v: f32) -> String {
    if v.is_nan() {
        return "NaN".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let mut s = v.to_string();
    if !s.contains('.') {
        s.push_str(".0");
    }
    s
}

pub fn format_datetime(dt: &NaiveDateTime) -> String {
    if dt.nanosecond() == 0 {
        dt.format("%Y-%m-%d %H:%M:%S").to_string()
    } else {
        dt.format("%Y-%m-%d %H:%M:%S%.f").to_string()
    }
}

/// Parse the ISO-like forms the loaders and the optimizer accept.
/// Date-only values land at midnight.
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    // Cheap reject before running chrono: every accepted form starts `YYYY-`.
    let bytes = s.as_bytes();
    if bytes.len() < 10 || !bytes[..4].iter().all(u8::is_ascii_digit) || bytes[4] != b'-' {
        return None;
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// A lowercased search term. Blank terms cannot be constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Needle {
    lowered: String,
    ascii: bool,
}

impl Needle {
    /// Returns `None` for empty or whitespace-only terms.
    pub fn new(term: &str) -> Option<Self> {
        if term.trim().is_empty() {
            return None;
        }
        let lowered = term.to_lowercase();
        let ascii = lowered.is_ascii();
        Some(Self { lowered, ascii })
    }

    pub fn as_str(&self) -> &str {
        &self.lowered
    }

    pub fn char_len(&self) -> usize {
        self.lowered.chars().count()
    }

    /// `lowercase(text).contains(lowercase(term))`.
    pub fn matches_text(&self, text: &str) -> bool {
        if self.ascii && text.is_ascii() {
            let hay = text.as_bytes();
            let needle = self.lowered.as_bytes();
            if needle.len() > hay.len() {
                return false;
            }
            return hay
                .windows(needle.len())
                .any(|w| w.eq_ignore_ascii_case(needle));
        }
        text.to_lowercase().contains(&self.lowered)
    }

    /// Match against the canonical rendering of a scalar.
    pub fn matches(&self, value: &Scalar) -> bool {
        match value {
            Scalar::Null => false,
            Scalar::Str(s) => self.matches_text(s),
            other => self.matches_text(&other.to_string()),
        }
    }

    /// Whether any value of a column typed with only these characters could
    /// contain the needle. Used to skip numeric/boolean/date columns outright.
    pub fn fits_alphabet(&self, alphabet: &str) -> bool {
        self.lowered.chars().all(|c| alphabet.contains(c))
    }
}
