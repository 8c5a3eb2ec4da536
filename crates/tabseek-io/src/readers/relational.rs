//! SQLite loader. Tables are not converted: each stays behind a shared
//! read-only connection and is scanned in place when searched.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use tracing::warn;

use tabseek_core::schema::{DataType, Field, Schema};
use tabseek_core::text::Needle;
use tabseek_core::types::{Column, Scalar, Table, TableInfo};

use crate::detect::FormatKind;
use crate::error::Result;
use crate::loader::{FormatLoader, LoadContext, LoadedSource, LoadedTable, TableFailure};

/// One connection per source; searches on its tables take turns.
pub type SharedConnection = Arc<Mutex<Connection>>;

#[derive(Debug, Default, Clone, Copy)]
pub struct RelationalLoader;

impl FormatLoader for RelationalLoader {
    fn kind(&self) -> FormatKind {
        FormatKind::Relational
    }

    fn load(&self, path: &Path, ctx: &LoadContext<'_>) -> Result<LoadedSource> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        let names: Vec<String> = {
            let mut stmt = conn.prepare(
                "SELECT name FROM sqlite_master \
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
            )?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            rows.collect::<std::result::Result<_, _>>()?
        };

        let mut described = Vec::with_capacity(names.len());
        let mut failures = Vec::new();
        let total = names.len().max(1);
        for (i, name) in names.into_iter().enumerate() {
            match describe(&conn, &name) {
                Ok((fields, row_count)) => described.push((name, fields, row_count)),
                Err(e) => {
                    warn!(path = %path.display(), table = %name, error = %e, "table skipped");
                    failures.push(TableFailure {
                        table: name,
                        reason: e.to_string(),
                    });
                }
            }
            ctx.progress
                .report("reading catalog", (((i + 1) * 100) / total) as u8);
        }

        let handle: SharedConnection = Arc::new(Mutex::new(conn));
        let tables = described
            .into_iter()
            .map(|(name, fields, row_count)| {
                LoadedTable::Relational(RelationalTable {
                    handle: Arc::clone(&handle),
                    name: name.clone(),
                    sql_name: name,
                    fields,
                    row_count,
                })
            })
            .collect();
        let mut source = LoadedSource::new(FormatKind::Relational, tables);
        source.failures = failures;
        Ok(source)
    }
}

fn describe(conn: &Connection, table: &str) -> rusqlite::Result<(Vec<Field>, usize)> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
    let fields = stmt
        .query_map([], |row| {
            let name: String = row.get(1)?;
            let declared: String = row.get::<_, Option<String>>(2)?.unwrap_or_default();
            Ok(Field::new(name, declared_type(&declared)))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {}", quote_ident(table)),
        [],
        |row| row.get(0),
    )?;
    Ok((fields, count.max(0) as usize))
}

/// Map a declared column type to the closest column type, by SQLite's
/// affinity rules.
fn declared_type(declared: &str) -> DataType {
    let t = declared.to_ascii_uppercase();
    if t.contains("INT") {
        DataType::Int64
    } else if t.contains("BOOL") {
        DataType::Boolean
    } else if t.contains("DATE") || t.contains("TIME") {
        DataType::DateTime
    } else if t.contains("REAL") || t.contains("FLOA") || t.contains("DOUB") {
        DataType::Float64
    } else {
        DataType::Utf8
    }
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn scalar(v: ValueRef<'_>) -> Scalar {
    match v {
        ValueRef::Null => Scalar::Null,
        ValueRef::Integer(i) => Scalar::I64(i),
        ValueRef::Real(f) => Scalar::F64(f),
        ValueRef::Text(t) => Scalar::Str(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Scalar::Str(String::from_utf8_lossy(b).into_owned()),
    }
}

/// Matching rows of a relational table, in scan order.
#[derive(Debug)]
pub struct RelationalMatches {
    pub rows: Table,
    pub row_indices: Vec<usize>,
    /// More rows matched than `limit` allowed.
    pub truncated: bool,
}

/// A table living in an open SQLite connection.
#[derive(Debug, Clone)]
pub struct RelationalTable {
    handle: SharedConnection,
    name: String,
    sql_name: String,
    fields: Vec<Field>,
    row_count: usize,
}

impl RelationalTable {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub fn info(&self) -> TableInfo {
        TableInfo {
            name: self.name.clone(),
            schema: Schema::new(self.fields.clone()),
            row_count: self.row_count,
        }
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Scan every row and keep those where any value contains the needle.
    /// Stops once `limit` matches are held and one more is seen.
    pub fn search(&self, needle: &Needle, limit: usize) -> Result<RelationalMatches> {
        let conn = self.handle.lock();
        let mut stmt = conn.prepare(&format!("SELECT * FROM {}", quote_ident(&self.sql_name)))?;
        let names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
        let width = names.len();
        let mut rows = stmt.query([])?;

        let mut kept: Vec<Vec<Scalar>> = Vec::new();
        let mut row_indices = Vec::new();
        let mut truncated = false;
        let mut idx = 0usize;
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                values.push(scalar(row.get_ref(i)?));
            }
            if values.iter().any(|v| needle.matches(v)) {
                if kept.len() == limit {
                    truncated = true;
                    break;
                }
                kept.push(values);
                row_indices.push(idx);
            }
            idx += 1;
        }

        Ok(RelationalMatches {
            rows: rows_to_table(&self.name, &names, &kept)?,
            row_indices,
            truncated,
        })
    }

    /// An empty result carrying this table's column names.
    pub fn no_matches(&self) -> Result<RelationalMatches> {
        let names: Vec<String> = self.fields.iter().map(|f| f.name.clone()).collect();
        Ok(RelationalMatches {
            rows: rows_to_table(&self.name, &names, &[])?,
            row_indices: Vec::new(),
            truncated: false,
        })
    }

    /// Read the whole table into memory.
    pub fn materialize(&self) -> Result<Table> {
        let conn = self.handle.lock();
        let mut stmt = conn.prepare(&format!("SELECT * FROM {}", quote_ident(&self.sql_name)))?;
        let names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
        let mut rows = stmt.query([])?;
        let mut all = Vec::with_capacity(self.row_count);
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(names.len());
            for i in 0..names.len() {
                values.push(scalar(row.get_ref(i)?));
            }
            all.push(values);
        }
        rows_to_table(&self.name, &names, &all)
    }
}

fn rows_to_table(name: &str, names: &[String], rows: &[Vec<Scalar>]) -> Result<Table> {
    let columns = names
        .iter()
        .enumerate()
        .map(|(i, col)| {
            let values: Vec<Scalar> = rows.iter().map(|r| r[i].clone()).collect();
            Column::from_scalars(col.clone(), &values)
        })
        .collect();
    Ok(Table::new(name, columns)?)
}
