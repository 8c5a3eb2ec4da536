//! Scalar values, typed column buffers, and the immutable `Table`.
//!
//! Loaders produce `RawTable`s of text cells. The optimizer in
//! `tabseek-operators` turns each raw column into one of the typed
//! `ColumnData` buffers, after which a `Table` is never mutated again.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::naming::dedupe_names;
use crate::schema::{DataType, Field, Schema};
use crate::text::{format_datetime, format_f32, format_f64};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Null,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Str(String),
    DateTime(NaiveDateTime),
}

impl Scalar {
    /// `None` for nulls, which carry no type of their own.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Scalar::Null => None,
            Scalar::Bool(_) => Some(DataType::Boolean),
            Scalar::I8(_) => Some(DataType::Int8),
            Scalar::I16(_) => Some(DataType::Int16),
            Scalar::I32(_) => Some(DataType::Int32),
            Scalar::I64(_) => Some(DataType::Int64),
            Scalar::F32(_) => Some(DataType::Float32),
            Scalar::F64(_) => Some(DataType::Float64),
            Scalar::Str(_) => Some(DataType::Utf8),
            Scalar::DateTime(_) => Some(DataType::DateTime),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::I8(v) => Some(*v as i64),
            Scalar::I16(v) => Some(*v as i64),
            Scalar::I32(v) => Some(*v as i64),
            Scalar::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::F32(v) => Some(*v as f64),
            Scalar::F64(v) => Some(*v),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    /// Total order used for statistics and sorting.
    ///
    /// Nulls sort first, integers and floats compare numerically with NaN
    /// last, and mixed kinds fall back to a fixed kind order.
    pub fn total_cmp(&self, other: &Scalar) -> Ordering {
        use Scalar::*;
        match (self, other) {
            (Null, Null) => Ordering::Equal,
            (Null, _) => Ordering::Less,
            (_, Null) => Ordering::Greater,
            (Bool(x), Bool(y)) => x.cmp(y),
            (Str(x), Str(y)) => x.cmp(y),
            (DateTime(x), DateTime(y)) => x.cmp(y),
            _ => {
                if let (Some(x), Some(y)) = (self.as_i64(), other.as_i64()) {
                    return x.cmp(&y);
                }
                if let (Some(x), Some(y)) = (self.as_f64(), other.as_f64()) {
                    return f64_cmp(x, y);
                }
                kind_order(self).cmp(&kind_order(other))
            }
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => Ok(()),
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::I8(v) => write!(f, "{v}"),
            Scalar::I16(v) => write!(f, "{v}"),
            Scalar::I32(v) => write!(f, "{v}"),
            Scalar::I64(v) => write!(f, "{v}"),
            Scalar::F32(v) => f.write_str(&format_f32(*v)),
            Scalar::F64(v) => f.write_str(&format_f64(*v)),
            Scalar::Str(s) => f.write_str(s),
            Scalar::DateTime(dt) => f.write_str(&format_datetime(dt)),
        }
    }
}

fn f64_cmp(x: f64, y: f64) -> Ordering {
    if x.is_nan() && y.is_nan() {
        Ordering::Equal
    } else if x.is_nan() {
        Ordering::Greater
    } else if y.is_nan() {
        Ordering::Less
    } else {
        x.partial_cmp(&y).unwrap_or(Ordering::Equal)
    }
}

fn kind_order(s: &Scalar) -> u8 {
    use Scalar::*;
    match s {
        Null => 0,
        Bool(_) => 1,
        I8(_) | I16(_) | I32(_) | I64(_) | F32(_) | F64(_) => 2,
        DateTime(_) => 3,
        Str(_) => 4,
    }
}

/// Dictionary-encoded text: distinct value -> code, codes in row order.
///
/// Dictionary order is first appearance, which keeps encoding deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Categorical {
    dictionary: Vec<String>,
    codes: Vec<Option<u32>>,
}

impl Categorical {
    pub fn encode<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let mut lookup: HashMap<&'a str, u32> = HashMap::new();
        let mut dictionary = Vec::new();
        let mut codes = Vec::new();
        for value in values {
            let code = value.map(|v| {
                *lookup.entry(v).or_insert_with(|| {
                    dictionary.push(v.to_string());
                    (dictionary.len() - 1) as u32
                })
            });
            codes.push(code);
        }
        Self { dictionary, codes }
    }

    pub fn dictionary(&self) -> &[String] {
        &self.dictionary
    }

    pub fn codes(&self) -> &[Option<u32>] {
        &self.codes
    }

    pub fn value(&self, row: usize) -> Option<&str> {
        let code = self.codes.get(row).copied().flatten()?;
        self.dictionary.get(code as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

/// Typed storage for one column. `None` is the typed null marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnData {
    Boolean(Vec<Option<bool>>),
    Int8(Vec<Option<i8>>),
    Int16(Vec<Option<i16>>),
    Int32(Vec<Option<i32>>),
    Int64(Vec<Option<i64>>),
    Float32(Vec<Option<f32>>),
    Float64(Vec<Option<f64>>),
    Utf8(Vec<Option<String>>),
    Categorical(Categorical),
    DateTime(Vec<Option<NaiveDateTime>>),
}

fn pick<T: Clone>(values: &[Option<T>], rows: &[usize]) -> Vec<Option<T>> {
    rows.iter()
        .map(|&r| values.get(r).cloned().flatten())
        .collect()
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Boolean(v) => v.len(),
            ColumnData::Int8(v) => v.len(),
            ColumnData::Int16(v) => v.len(),
            ColumnData::Int32(v) => v.len(),
            ColumnData::Int64(v) => v.len(),
            ColumnData::Float32(v) => v.len(),
            ColumnData::Float64(v) => v.len(),
            ColumnData::Utf8(v) => v.len(),
            ColumnData::Categorical(c) => c.len(),
            ColumnData::DateTime(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn data_type(&self) -> DataType {
        match self {
            ColumnData::Boolean(_) => DataType::Boolean,
            ColumnData::Int8(_) => DataType::Int8,
            ColumnData::Int16(_) => DataType::Int16,
            ColumnData::Int32(_) => DataType::Int32,
            ColumnData::Int64(_) => DataType::Int64,
            ColumnData::Float32(_) => DataType::Float32,
            ColumnData::Float64(_) => DataType::Float64,
            ColumnData::Utf8(_) => DataType::Utf8,
            ColumnData::Categorical(_) => DataType::Categorical,
            ColumnData::DateTime(_) => DataType::DateTime,
        }
    }

    /// Value at `row`; out-of-range rows read as null.
    pub fn get(&self, row: usize) -> Scalar {
        fn at<T: Copy>(v: &[Option<T>], row: usize) -> Option<T> {
            v.get(row).copied().flatten()
        }
        let value = match self {
            ColumnData::Boolean(v) => at(v, row).map(Scalar::Bool),
            ColumnData::Int8(v) => at(v, row).map(Scalar::I8),
            ColumnData::Int16(v) => at(v, row).map(Scalar::I16),
            ColumnData::Int32(v) => at(v, row).map(Scalar::I32),
            ColumnData::Int64(v) => at(v, row).map(Scalar::I64),
            ColumnData::Float32(v) => at(v, row).map(Scalar::F32),
            ColumnData::Float64(v) => at(v, row).map(Scalar::F64),
            ColumnData::Utf8(v) => v.get(row).cloned().flatten().map(Scalar::Str),
            ColumnData::Categorical(c) => c.value(row).map(|s| Scalar::Str(s.to_string())),
            ColumnData::DateTime(v) => at(v, row).map(Scalar::DateTime),
        };
        value.unwrap_or(Scalar::Null)
    }

    /// Canonical text of the value at `row`, borrowed where the buffer
    /// already holds text. `None` for nulls.
    pub fn text(&self, row: usize) -> Option<Cow<'_, str>> {
        match self {
            ColumnData::Utf8(v) => v.get(row)?.as_deref().map(Cow::Borrowed),
            ColumnData::Categorical(c) => c.value(row).map(Cow::Borrowed),
            other => match other.get(row) {
                Scalar::Null => None,
                value => Some(Cow::Owned(value.to_string())),
            },
        }
    }

    pub fn is_null(&self, row: usize) -> bool {
        match self {
            ColumnData::Utf8(v) => v.get(row).map_or(true, Option::is_none),
            ColumnData::Categorical(c) => c.codes().get(row).map_or(true, Option::is_none),
            other => other.get(row).is_null(),
        }
    }

    pub fn null_count(&self) -> usize {
        (0..self.len()).filter(|&r| self.is_null(r)).count()
    }

    /// Gather `rows` (in the given order) into a new buffer of the same type.
    pub fn take(&self, rows: &[usize]) -> ColumnData {
        match self {
            ColumnData::Boolean(v) => ColumnData::Boolean(pick(v, rows)),
            ColumnData::Int8(v) => ColumnData::Int8(pick(v, rows)),
            ColumnData::Int16(v) => ColumnData::Int16(pick(v, rows)),
            ColumnData::Int32(v) => ColumnData::Int32(pick(v, rows)),
            ColumnData::Int64(v) => ColumnData::Int64(pick(v, rows)),
            ColumnData::Float32(v) => ColumnData::Float32(pick(v, rows)),
            ColumnData::Float64(v) => ColumnData::Float64(pick(v, rows)),
            ColumnData::Utf8(v) => ColumnData::Utf8(pick(v, rows)),
            ColumnData::Categorical(c) => ColumnData::Categorical(Categorical {
                dictionary: c.dictionary.clone(),
                codes: pick(&c.codes, rows),
            }),
            ColumnData::DateTime(v) => ColumnData::DateTime(pick(v, rows)),
        }
    }

    /// Build a buffer from loose scalars.
    ///
    /// A single shared kind keeps its type; mixed integers/floats widen to
    /// the 64-bit numeric types; any other mix falls back to text.
    pub fn from_scalars(values: &[Scalar]) -> ColumnData {
        let kinds: HashSet<DataType> = values.iter().filter_map(Scalar::data_type).collect();
        let single = if kinds.len() == 1 {
            kinds.iter().next().copied()
        } else {
            None
        };
        match single {
            Some(DataType::Boolean) => ColumnData::Boolean(
                values
                    .iter()
                    .map(|v| match v {
                        Scalar::Bool(b) => Some(*b),
                        _ => None,
                    })
                    .collect(),
            ),
            Some(DataType::DateTime) => ColumnData::DateTime(
                values
                    .iter()
                    .map(|v| match v {
                        Scalar::DateTime(dt) => Some(*dt),
                        _ => None,
                    })
                    .collect(),
            ),
            Some(DataType::Int8) => {
                ColumnData::Int8(values.iter().map(|v| v.as_i64().map(|x| x as i8)).collect())
            }
            Some(DataType::Int16) => {
                ColumnData::Int16(values.iter().map(|v| v.as_i64().map(|x| x as i16)).collect())
            }
            Some(DataType::Int32) => {
                ColumnData::Int32(values.iter().map(|v| v.as_i64().map(|x| x as i32)).collect())
            }
            Some(DataType::Float32) => ColumnData::Float32(
                values
                    .iter()
                    .map(|v| match v {
                        Scalar::F32(x) => Some(*x),
                        _ => None,
                    })
                    .collect(),
            ),
            _ if !kinds.is_empty() && kinds.iter().all(|k| k.is_integer()) => {
                ColumnData::Int64(values.iter().map(Scalar::as_i64).collect())
            }
            _ if !kinds.is_empty() && kinds.iter().all(|k| k.is_numeric()) => {
                ColumnData::Float64(values.iter().map(Scalar::as_f64).collect())
            }
            _ => ColumnData::Utf8(
                values
                    .iter()
                    .map(|v| match v {
                        Scalar::Null => None,
                        Scalar::Str(s) => Some(s.clone()),
                        other => Some(other.to_string()),
                    })
                    .collect(),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn from_scalars(name: impl Into<String>, values: &[Scalar]) -> Self {
        Self::new(name, ColumnData::from_scalars(values))
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data_type(&self) -> DataType {
        self.data.data_type()
    }

    pub fn field(&self) -> Field {
        Field::new(self.name.clone(), self.data_type())
    }

    pub fn get(&self, row: usize) -> Scalar {
        self.data.get(row)
    }
}

/// A column of unparsed cells as a loader saw them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawColumn {
    pub name: String,
    pub values: Vec<Option<String>>,
}

/// Loader output before type inference. Columns always have equal length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    pub name: String,
    pub columns: Vec<RawColumn>,
}

impl RawTable {
    pub fn new(name: impl Into<String>, headers: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns: headers
                .into_iter()
                .map(|name| RawColumn {
                    name,
                    values: Vec::new(),
                })
                .collect(),
        }
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }

    /// Append one row, padding short rows with nulls.
    /// Returns how many trailing fields were dropped.
    pub fn push_row(&mut self, row: Vec<Option<String>>) -> usize {
        let width = self.columns.len();
        let dropped = row.len().saturating_sub(width);
        let mut cells = row.into_iter();
        for col in &mut self.columns {
            col.values.push(cells.next().flatten());
        }
        dropped
    }
}

/// Name, schema, and size of a table, without its data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    pub schema: Schema,
    pub row_count: usize,
}

/// One rectangular dataset. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
    row_count: usize,
}

impl Table {
    /// Invariants: all columns share one length; column names are unique.
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Result<Self> {
        let row_count = columns.first().map_or(0, Column::len);
        let mut seen = HashSet::new();
        for col in &columns {
            if col.len() != row_count {
                return Err(Error::RowCountMismatch {
                    column: col.name.clone(),
                    expected: row_count,
                    actual: col.len(),
                });
            }
            if !seen.insert(col.name.as_str()) {
                return Err(Error::DuplicateColumn(col.name.clone()));
            }
        }
        Ok(Self {
            name: name.into(),
            columns,
            row_count,
        })
    }

    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            row_count: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn schema(&self) -> Schema {
        Schema::new(self.columns.iter().map(Column::field).collect())
    }

    pub fn info(&self) -> TableInfo {
        TableInfo {
            name: self.name.clone(),
            schema: self.schema(),
            row_count: self.row_count,
        }
    }

    pub fn row(&self, row: usize) -> Vec<Scalar> {
        self.columns.iter().map(|c| c.get(row)).collect()
    }

    /// New table holding `rows` of this one, in the order given.
    pub fn take(&self, rows: &[usize]) -> Table {
        Table {
            name: self.name.clone(),
            columns: self
                .columns
                .iter()
                .map(|c| Column::new(c.name.clone(), c.data.take(rows)))
                .collect(),
            row_count: rows.len(),
        }
    }

    /// Prepend `leading` columns (annotations) to this table. The leading
    /// names win: a column of this table with the same name is renamed
    /// with a `_2`, `_3`, ... suffix.
    pub fn with_leading_columns(self, leading: Vec<Column>) -> Result<Table> {
        let mut columns = leading;
        columns.extend(self.columns);
        let names = dedupe_names(columns.iter().map(|c| c.name.clone()));
        for (col, name) in columns.iter_mut().zip(names) {
            col.name = name;
        }
        Table::new(self.name, columns)
    }

    /// Stack tables vertically, aligning columns by name in first-seen order.
    /// Cells a table has no column for are null.
    pub fn union_all(name: impl Into<String>, tables: &[&Table]) -> Result<Table> {
        let mut names: Vec<&str> = Vec::new();
        for t in tables {
            for c in &t.columns {
                if !names.contains(&c.name.as_str()) {
                    names.push(&c.name);
                }
            }
        }
        let total: usize = tables.iter().map(|t| t.row_count).sum();
        let mut columns = Vec::with_capacity(names.len());
        for col_name in names {
            let mut values = Vec::with_capacity(total);
            for t in tables {
                match t.column(col_name) {
                    Some(c) => values.extend((0..t.row_count).map(|r| c.get(r))),
                    None => values.extend(std::iter::repeat(Scalar::Null).take(t.row_count)),
                }
            }
            columns.push(Column::from_scalars(col_name, &values));
        }
        Table::new(name, columns)
    }
}
