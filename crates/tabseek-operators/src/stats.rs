//! Per-column summaries for inspection.

use std::collections::HashMap;

use serde::Serialize;

use tabseek_core::schema::DataType;
use tabseek_core::types::{Column, Scalar, Table};

use crate::error::{OpError, Result};

const TOP_VALUES: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Sample standard deviation; `None` with fewer than two values.
    pub std: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnStats {
    pub name: String,
    pub data_type: DataType,
    pub null_count: usize,
    /// Distinct non-null values.
    pub unique_count: usize,
    pub numeric: Option<NumericSummary>,
    /// Earliest and latest, rendered.
    pub datetime_range: Option<(String, String)>,
    /// Most frequent values, most common first; ties in value order.
    pub top_values: Vec<(String, usize)>,
}

pub fn column_stats(table: &Table, column: &str) -> Result<ColumnStats> {
    let col = table
        .column(column)
        .ok_or_else(|| OpError::UnknownColumn(column.to_string()))?;
    Ok(summarize(col))
}

pub fn table_stats(table: &Table) -> Vec<ColumnStats> {
    table.columns().iter().map(summarize).collect()
}

fn summarize(col: &Column) -> ColumnStats {
    let ty = col.data_type();
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut nums = Vec::new();
    let mut dates = Vec::new();
    let mut nulls = 0;
    for row in 0..col.len() {
        let value = col.get(row);
        match &value {
            Scalar::Null => {
                nulls += 1;
                continue;
            }
            Scalar::DateTime(dt) => dates.push(*dt),
            v => {
                if let Some(f) = v.as_f64().filter(|_| ty.is_numeric()) {
                    nums.push(f);
                }
            }
        }
        *counts.entry(value.to_string()).or_insert(0) += 1;
    }

    let numeric = (!nums.is_empty()).then(|| {
        let n = nums.len() as f64;
        let mean = nums.iter().sum::<f64>() / n;
        let std = (nums.len() > 1).then(|| {
            (nums.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
        });
        NumericSummary {
            min: nums.iter().copied().fold(f64::INFINITY, f64::min),
            max: nums.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            mean,
            std,
        }
    });

    let datetime_range = match (dates.iter().min(), dates.iter().max()) {
        (Some(lo), Some(hi)) => Some((Scalar::DateTime(*lo).to_string(), Scalar::DateTime(*hi).to_string())),
        _ => None,
    };

    let unique_count = counts.len();
    let top_values = if ty.is_textual() {
        let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(TOP_VALUES);
        ranked
    } else {
        Vec::new()
    };

    ColumnStats {
        name: col.name.clone(),
        data_type: ty,
        null_count: nulls,
        unique_count,
        numeric,
        datetime_range,
        top_values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabseek_core::types::ColumnData;

    fn table() -> Table {
        Table::new(
            "t",
            vec![
                Column::new("n", ColumnData::Int16(vec![Some(2), None, Some(4), Some(4)])),
                Column::new(
                    "s",
                    ColumnData::Utf8(vec![Some("b".into()), Some("a".into()), Some("b".into()), None]),
                ),
            ],
        )
        .unwrap()
    }

    #[test]
    fn numeric_summary() {
        let s = column_stats(&table(), "n").unwrap();
        assert_eq!(s.null_count, 1);
        assert_eq!(s.unique_count, 2);
        let num = s.numeric.unwrap();
        assert_eq!((num.min, num.max), (2.0, 4.0));
        assert!((num.mean - 10.0 / 3.0).abs() < 1e-9);
        assert!(s.top_values.is_empty());
    }

    #[test]
    fn text_top_values() {
        let s = column_stats(&table(), "s").unwrap();
        assert_eq!(s.top_values, vec![("b".to_string(), 2), ("a".to_string(), 1)]);
        assert!(s.numeric.is_none());
    }

    #[test]
    fn unknown_column() {
        assert!(matches!(column_stats(&table(), "zz"), Err(OpError::UnknownColumn(_))));
        assert_eq!(table_stats(&table()).len(), 2);
    }
}
