//! A loaded source and its searchable tables.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use tabseek_core::hash::Hash256;
use tabseek_core::text::Needle;
use tabseek_core::types::{Table, TableInfo};
use tabseek_io::{FormatKind, LoadError, RelationalTable, TableFailure};
use tabseek_operators::{search_table, LocalResult, SearchIndex};

/// What to load: a path and, optionally, a kind that skips detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub path: PathBuf,
    pub kind: Option<FormatKind>,
}

impl SourceDescriptor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: None,
        }
    }

    pub fn with_kind(mut self, kind: FormatKind) -> Self {
        self.kind = Some(kind);
        self
    }
}

impl From<&Path> for SourceDescriptor {
    fn from(p: &Path) -> Self {
        Self::new(p)
    }
}

impl From<PathBuf> for SourceDescriptor {
    fn from(p: PathBuf) -> Self {
        Self::new(p)
    }
}

impl From<&str> for SourceDescriptor {
    fn from(p: &str) -> Self {
        Self::new(p)
    }
}

/// One searchable table of a source.
#[derive(Debug)]
pub enum SourceTable {
    /// Optimized in-memory table; its index is built on first search
    /// unless the engine builds it eagerly.
    Memory {
        table: Arc<Table>,
        index: OnceCell<SearchIndex>,
    },
    /// Scanned through the source's connection.
    Relational(RelationalTable),
}

impl SourceTable {
    pub fn memory(table: Table) -> Self {
        SourceTable::Memory {
            table: Arc::new(table),
            index: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            SourceTable::Memory { table, .. } => table.name(),
            SourceTable::Relational(t) => t.name(),
        }
    }

    pub fn info(&self) -> TableInfo {
        match self {
            SourceTable::Memory { table, .. } => table.info(),
            SourceTable::Relational(t) => t.info(),
        }
    }

    pub fn row_count(&self) -> usize {
        match self {
            SourceTable::Memory { table, .. } => table.row_count(),
            SourceTable::Relational(t) => t.row_count(),
        }
    }

    pub fn is_indexed(&self) -> bool {
        matches!(self, SourceTable::Memory { index, .. } if index.get().is_some())
    }

    /// Build the index now if it does not exist yet.
    pub fn ensure_index(&self, min_distinct: usize) {
        if let SourceTable::Memory { table, index } = self {
            index.get_or_init(|| SearchIndex::build(table, min_distinct));
        }
    }

    /// Rows matching `term`, capped at `limit`.
    pub fn search(&self, term: &str, limit: usize, min_distinct: usize) -> Result<LocalResult, LoadError> {
        match self {
            SourceTable::Memory { table, index } => {
                if Needle::new(term).is_none() {
                    return Ok(LocalResult::empty(table));
                }
                let idx = index.get_or_init(|| SearchIndex::build(table, min_distinct));
                Ok(search_table(table, term, limit, Some(idx)))
            }
            SourceTable::Relational(t) => {
                let m = match Needle::new(term) {
                    Some(needle) => t.search(&needle, limit)?,
                    None => t.no_matches()?,
                };
                Ok(LocalResult {
                    rows: m.rows,
                    row_indices: m.row_indices,
                    truncated: m.truncated,
                })
            }
        }
    }

    /// The full table in memory. Relational tables are read on demand.
    pub fn materialize(&self) -> Result<Arc<Table>, LoadError> {
        match self {
            SourceTable::Memory { table, .. } => Ok(Arc::clone(table)),
            SourceTable::Relational(t) => Ok(Arc::new(t.materialize()?)),
        }
    }
}

/// A loaded file. Immutable; reload builds a replacement.
#[derive(Debug)]
pub struct Source {
    identifier: String,
    origin: PathBuf,
    kind: FormatKind,
    tables: Vec<SourceTable>,
    fingerprint: Hash256,
    failures: Vec<TableFailure>,
}

impl Source {
    pub fn new(
        identifier: impl Into<String>,
        origin: impl Into<PathBuf>,
        kind: FormatKind,
        tables: Vec<SourceTable>,
        fingerprint: Hash256,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            origin: origin.into(),
            kind,
            tables,
            fingerprint,
            failures: Vec::new(),
        }
    }

    pub fn with_failures(mut self, failures: Vec<TableFailure>) -> Self {
        self.failures = failures;
        self
    }

    pub(crate) fn set_identifier(&mut self, identifier: String) {
        self.identifier = identifier;
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn origin(&self) -> &Path {
        &self.origin
    }

    pub fn kind(&self) -> FormatKind {
        self.kind
    }

    pub fn tables(&self) -> &[SourceTable] {
        &self.tables
    }

    pub fn table(&self, name: &str) -> Option<&SourceTable> {
        self.tables.iter().find(|t| t.name() == name)
    }

    pub fn table_infos(&self) -> Vec<TableInfo> {
        self.tables.iter().map(SourceTable::info).collect()
    }

    pub fn fingerprint(&self) -> Hash256 {
        self.fingerprint
    }

    pub fn failures(&self) -> &[TableFailure] {
        &self.failures
    }

    /// Tables that failed to load while the rest did, as a `PartialFailure`.
    pub fn partial_failure(&self) -> Option<LoadError> {
        if self.failures.is_empty() {
            return None;
        }
        Some(LoadError::PartialFailure {
            loaded: self.tables.len(),
            failed: self
                .failures
                .iter()
                .map(|f| format!("{}: {}", f.table, f.reason))
                .collect(),
        })
    }

    pub fn row_count(&self) -> usize {
        self.tables.iter().map(SourceTable::row_count).sum()
    }
}
