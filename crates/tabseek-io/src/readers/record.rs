//! JSON and JSON Lines loader.
//!
//! Accepted shapes:
//! - an array of objects: one row per object, keys unioned in first-seen order
//! - an object whose values are all equal-length arrays: column-oriented
//! - any other object: exactly one row
//!
//! Nested arrays/objects inside a record are kept as compact JSON text.

use std::collections::HashSet;
use std::io::BufRead;
use std::path::Path;

use serde_json::{Map, Value};

use tabseek_core::naming::normalize_table_name;
use tabseek_core::types::RawTable;

use crate::buf::bounded_from_path;
use crate::detect::FormatKind;
use crate::error::{LoadError, Result};
use crate::loader::{FormatLoader, LoadContext, LoadedSource, LoadedTable};

#[derive(Debug, Default, Clone, Copy)]
pub struct RecordLoader;

impl FormatLoader for RecordLoader {
    fn kind(&self) -> FormatKind {
        FormatKind::Record
    }

    fn load(&self, path: &Path, ctx: &LoadContext<'_>) -> Result<LoadedSource> {
        let total = std::fs::metadata(path)?.len();
        if total < ctx.config.min_source_bytes {
            return Err(LoadError::EmptySource {
                path: path.to_path_buf(),
                bytes: total,
            });
        }
        let name = path
            .file_stem()
            .map(|s| normalize_table_name(&s.to_string_lossy()))
            .unwrap_or_else(|| "records".to_string());
        let lines = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| matches!(e.to_ascii_lowercase().as_str(), "jsonl" | "ndjson"))
            .unwrap_or(false);

        let reader = bounded_from_path(path, ctx.config.read_buffer_bytes)?;
        let table = if lines {
            let mut records = Vec::new();
            for (lineno, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<Value>(&line)? {
                    Value::Object(obj) => records.push(obj),
                    _ => {
                        return Err(LoadError::UnsupportedStructure(format!(
                            "line {} is not a JSON object",
                            lineno + 1
                        )))
                    }
                }
            }
            if records.is_empty() {
                return Err(LoadError::UnsupportedStructure("no records".into()));
            }
            records_table(&name, &records)?
        } else {
            let value: Value = serde_json::from_reader(reader)?;
            ctx.progress.report("parsed", 50);
            value_table(&name, value)?
        };
        ctx.progress.report("records converted", 100);
        Ok(LoadedSource::new(
            FormatKind::Record,
            vec![LoadedTable::Raw(table)],
        ))
    }
}

/// Reduce a parsed document to one table.
pub fn value_table(name: &str, value: Value) -> Result<RawTable> {
    match value {
        Value::Array(items) => {
            if items.is_empty() {
                return Err(LoadError::UnsupportedStructure("empty array".into()));
            }
            let mut records = Vec::with_capacity(items.len());
            for (i, item) in items.into_iter().enumerate() {
                match item {
                    Value::Object(obj) => records.push(obj),
                    other => {
                        return Err(LoadError::UnsupportedStructure(format!(
                            "array element {i} is {}, expected an object",
                            kind_of(&other)
                        )))
                    }
                }
            }
            records_table(name, &records)
        }
        Value::Object(obj) => {
            if obj.is_empty() {
                return Err(LoadError::UnsupportedStructure("object has no fields".into()));
            }
            if obj.values().all(Value::is_array) {
                columns_table(name, obj)
            } else {
                records_table(name, std::slice::from_ref(&obj))
            }
        }
        other => Err(LoadError::UnsupportedStructure(format!(
            "top-level {} cannot be read as a table",
            kind_of(&other)
        ))),
    }
}

/// One row per record over the union of their keys. Records with no keys
/// at all have no columns to hold their rows and are rejected.
fn records_table(name: &str, records: &[Map<String, Value>]) -> Result<RawTable> {
    let mut keys: Vec<String> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for rec in records {
        for k in rec.keys() {
            if seen.insert(k.as_str()) {
                keys.push(k.clone());
            }
        }
    }
    if keys.is_empty() {
        return Err(LoadError::UnsupportedStructure(format!(
            "{} records without any fields",
            records.len()
        )));
    }
    let mut table = RawTable::new(name, keys.clone());
    for rec in records {
        table.push_row(keys.iter().map(|k| rec.get(k).and_then(value_text)).collect());
    }
    Ok(table)
}

fn columns_table(name: &str, obj: Map<String, Value>) -> Result<RawTable> {
    let mut lens = obj.values().filter_map(Value::as_array).map(Vec::len);
    let rows = lens.next().unwrap_or(0);
    if lens.any(|n| n != rows) {
        return Err(LoadError::UnsupportedStructure(
            "column arrays have different lengths".into(),
        ));
    }
    let mut table = RawTable::new(name, obj.keys().cloned().collect());
    for (col, values) in table.columns.iter_mut().zip(obj.values()) {
        if let Value::Array(items) = values {
            col.values = items.iter().map(value_text).collect();
        }
    }
    Ok(table)
}

fn value_text(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        nested => Some(nested.to_string()),
    }
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn col<'a>(t: &'a RawTable, name: &str) -> &'a [Option<String>] {
        &t.columns.iter().find(|c| c.name == name).unwrap().values
    }

    #[test]
    fn array_of_records_unions_keys() {
        let t = value_table(
            "people",
            json!([{"id": 1, "name": "Alice"}, {"id": 2, "tags": ["x", "y"]}]),
        )
        .unwrap();
        let names: Vec<&str> = t.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "tags"]);
        assert_eq!(col(&t, "name"), &[Some("Alice".to_string()), None]);
        assert_eq!(col(&t, "tags")[1].as_deref(), Some("[\"x\",\"y\"]"));
    }

    #[test]
    fn single_object_is_one_row() {
        let t = value_table("cfg", json!({"host": "db", "port": 5432})).unwrap();
        assert_eq!(t.num_rows(), 1);
        assert_eq!(col(&t, "port")[0].as_deref(), Some("5432"));
    }

    #[test]
    fn column_dict_reads_by_column() {
        let t = value_table("cols", json!({"a": [1, 2, 3], "b": ["x", null, "z"]})).unwrap();
        assert_eq!(t.num_rows(), 3);
        assert_eq!(col(&t, "b")[1], None);
    }

    #[test]
    fn keyless_records_are_rejected() {
        let err = value_table("t", json!([{}, {}])).unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedStructure(_)), "{err}");
        // A key on any record gives every record a row.
        let t = value_table("t", json!([{}, {"a": 1}])).unwrap();
        assert_eq!(t.num_rows(), 2);
        assert_eq!(col(&t, "a"), &[None, Some("1".to_string())]);
    }

    #[test]
    fn incompatible_shapes_are_rejected() {
        for doc in [json!([]), json!([1, 2]), json!("text"), json!({}), json!({"a": [1], "b": [1, 2]})] {
            assert!(
                matches!(value_table("t", doc), Err(LoadError::UnsupportedStructure(_))),
            );
        }
    }
}
