//! Type inference and column narrowing.
//!
//! Each raw column is tried against, in order: integer (narrowest of
//! i8/i16/i32/i64), float (f32 if its shortest text reproduces the value,
//! else f64), boolean, datetime, and finally categorical vs. plain text.
//! Recognized null literals become typed nulls before any of this.
//!
//! Every accepted type re-renders to text that infers back to the same
//! type and values, so optimizing an optimized column is a no-op.

use std::collections::HashSet;

use tabseek_core::text::parse_datetime;
use tabseek_core::types::{Categorical, Column, ColumnData, RawColumn, RawTable, Table};

use crate::error::Result;

pub const NULL_LITERALS: &[&str] = &["", "NULL", "null", "None", "N/A", "n/a", "#N/A"];

pub fn is_null_literal(s: &str) -> bool {
    NULL_LITERALS.contains(&s.trim())
}

/// Optimize every column of a raw table.
pub fn optimize_table(raw: RawTable, categorical_threshold: f64) -> Result<Table> {
    let columns = raw
        .columns
        .into_iter()
        .map(|c| optimize_raw(c, categorical_threshold))
        .collect();
    Ok(Table::new(raw.name, columns)?)
}

/// Re-run inference on an already typed column.
pub fn optimize_column(column: &Column, categorical_threshold: f64) -> Column {
    let values = (0..column.len())
        .map(|r| column.data.text(r).map(|t| t.into_owned()))
        .collect();
    optimize_raw(
        RawColumn {
            name: column.name.clone(),
            values,
        },
        categorical_threshold,
    )
}

pub fn optimize_raw(raw: RawColumn, categorical_threshold: f64) -> Column {
    let values: Vec<Option<String>> = raw
        .values
        .into_iter()
        .map(|v| v.filter(|s| !is_null_literal(s)))
        .collect();
    let data = infer(values, categorical_threshold);
    Column::new(raw.name, data)
}

fn infer(values: Vec<Option<String>>, threshold: f64) -> ColumnData {
    let present = || values.iter().flatten().map(|s| s.trim());
    if present().next().is_none() {
        return ColumnData::Utf8(values);
    }
    if let Some(data) = integers(&values) {
        return data;
    }
    if let Some(data) = floats(&values) {
        return data;
    }
    if present().all(|s| s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("false")) {
        return ColumnData::Boolean(
            values
                .iter()
                .map(|v| v.as_deref().map(|s| s.trim().eq_ignore_ascii_case("true")))
                .collect(),
        );
    }
    if present().all(|s| parse_datetime(s).is_some()) {
        return ColumnData::DateTime(
            values
                .iter()
                .map(|v| v.as_deref().and_then(parse_datetime))
                .collect(),
        );
    }

    let distinct: HashSet<&str> = values.iter().flatten().map(String::as_str).collect();
    let ratio = distinct.len() as f64 / values.len() as f64;
    if ratio < threshold {
        ColumnData::Categorical(Categorical::encode(values.iter().map(|v| v.as_deref())))
    } else {
        ColumnData::Utf8(values)
    }
}

fn integers(values: &[Option<String>]) -> Option<ColumnData> {
    let mut parsed = Vec::with_capacity(values.len());
    let (mut lo, mut hi) = (0i64, 0i64);
    for v in values {
        match v {
            None => parsed.push(None),
            Some(s) => {
                let t = s.trim();
                let n: i64 = t.parse().ok()?;
                // "007", "+5" and the like are not canonical and stay text.
                if n.to_string() != t {
                    return None;
                }
                lo = lo.min(n);
                hi = hi.max(n);
                parsed.push(Some(n));
            }
        }
    }
    let data = if lo >= i8::MIN as i64 && hi <= i8::MAX as i64 {
        ColumnData::Int8(parsed.into_iter().map(|v| v.map(|n| n as i8)).collect())
    } else if lo >= i16::MIN as i64 && hi <= i16::MAX as i64 {
        ColumnData::Int16(parsed.into_iter().map(|v| v.map(|n| n as i16)).collect())
    } else if lo >= i32::MIN as i64 && hi <= i32::MAX as i64 {
        ColumnData::Int32(parsed.into_iter().map(|v| v.map(|n| n as i32)).collect())
    } else {
        ColumnData::Int64(parsed)
    };
    Some(data)
}

fn floats(values: &[Option<String>]) -> Option<ColumnData> {
    let mut parsed = Vec::with_capacity(values.len());
    for v in values {
        match v {
            None => parsed.push(None),
            Some(s) => {
                let t = s.trim();
                if !plain_decimal(t) || integer_overflow(t) {
                    return None;
                }
                let f: f64 = t.parse().ok()?;
                if !f.is_finite() {
                    return None;
                }
                parsed.push(Some(f));
            }
        }
    }
    let fits_f32 = parsed.iter().flatten().all(|&f| {
        let narrow = f as f32;
        narrow.is_finite() && narrow.to_string().parse::<f64>().ok() == Some(f)
    });
    Some(if fits_f32 {
        ColumnData::Float32(parsed.into_iter().map(|v| v.map(|f| f as f32)).collect())
    } else {
        ColumnData::Float64(parsed)
    })
}

/// Whole numbers past the i64 range would lose digits as floats.
fn integer_overflow(t: &str) -> bool {
    let digits = t.strip_prefix('-').unwrap_or(t);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) && t.parse::<i64>().is_err()
}

/// Rejects forms that a float parse would accept but that lose information
/// when re-rendered: no digits at all, a leading `+`, or leading zeros.
fn plain_decimal(t: &str) -> bool {
    if !t.bytes().any(|b| b.is_ascii_digit()) || t.starts_with('+') {
        return false;
    }
    let unsigned = t.strip_prefix('-').unwrap_or(t);
    let int_part = unsigned
        .split(|c| c == '.' || c == 'e' || c == 'E')
        .next()
        .unwrap_or("");
    !(int_part.len() > 1 && int_part.starts_with('0'))
}
