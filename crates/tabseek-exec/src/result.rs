//! Aggregated output of a global search.

use serde::Serialize;

use tabseek_core::id::SearchId;
use tabseek_core::types::Table;

use crate::error::{Result, SearchError};

/// Name of the provenance columns prepended to every matched row.
pub const SOURCE_COLUMN: &str = "_source";
pub const TABLE_COLUMN: &str = "_table";
pub const ROW_INDEX_COLUMN: &str = "_row_index";

/// Matched rows of one table, with provenance columns first.
#[derive(Debug, Clone, Serialize)]
pub struct TableMatches {
    pub source: String,
    pub table: String,
    pub rows: Table,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSummary {
    pub source: String,
    pub table: String,
    pub match_count: usize,
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskError {
    pub source: String,
    pub table: String,
    pub error: SearchError,
}

/// Everything a global search produced.
///
/// `matches` and `summary` are in completion order, which varies from run
/// to run; look results up by `(source, table)`.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub search_id: SearchId,
    pub term: String,
    pub matches: Vec<TableMatches>,
    pub summary: Vec<TableSummary>,
    pub total_matches: usize,
    /// Tables whose task ran to an outcome, successful or not.
    pub tables_searched: usize,
    pub sources_searched: usize,
    pub errors: Vec<TaskError>,
    /// Dispatch stopped early; some tables were never searched.
    pub cancelled: bool,
    pub elapsed_ms: u64,
}

impl SearchResult {
    pub(crate) fn empty(term: &str) -> Self {
        Self {
            search_id: SearchId::next(),
            term: term.to_string(),
            matches: Vec::new(),
            summary: Vec::new(),
            total_matches: 0,
            tables_searched: 0,
            sources_searched: 0,
            errors: Vec::new(),
            cancelled: false,
            elapsed_ms: 0,
        }
    }

    pub fn get(&self, source: &str, table: &str) -> Option<&TableMatches> {
        self.matches
            .iter()
            .find(|m| m.source == source && m.table == table)
    }

    pub fn summary_for(&self, source: &str, table: &str) -> Option<&TableSummary> {
        self.summary
            .iter()
            .find(|s| s.source == source && s.table == table)
    }

    /// All matched rows in one table, columns aligned by name.
    pub fn combined(&self) -> Result<Table> {
        let parts: Vec<&Table> = self.matches.iter().map(|m| &m.rows).collect();
        Ok(Table::union_all("search_results", &parts)?)
    }
}
