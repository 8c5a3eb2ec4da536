//! The `FormatLoader` seam and the registry that selects a loader by kind.

use std::collections::HashMap;
use std::path::Path;

use tabseek_core::config::EngineConfig;
use tabseek_core::naming::dedupe_names;
use tabseek_core::progress::ProgressSink;
use tabseek_core::schema::{DataType, Field, Schema};
use tabseek_core::types::{RawTable, TableInfo};

use crate::detect::{detect, FormatKind};
use crate::error::{LoadError, Result};
use crate::readers::{DelimitedLoader, RecordLoader, RelationalLoader, RelationalTable, SpreadsheetLoader};

/// What a loader needs besides the path.
pub struct LoadContext<'a> {
    pub config: &'a EngineConfig,
    pub progress: &'a dyn ProgressSink,
}

/// One format's path-to-tables conversion.
pub trait FormatLoader: Send + Sync {
    fn kind(&self) -> FormatKind;

    /// Produce every table the source holds. Per-table failures that leave
    /// other tables usable go into `LoadedSource::failures`.
    fn load(&self, path: &Path, ctx: &LoadContext<'_>) -> Result<LoadedSource>;
}

/// A table as it leaves a loader.
#[derive(Debug)]
pub enum LoadedTable {
    /// Text cells, still to be typed by the optimizer.
    Raw(RawTable),
    /// Exposed directly from an open connection.
    Relational(RelationalTable),
}

impl LoadedTable {
    pub fn name(&self) -> &str {
        match self {
            LoadedTable::Raw(t) => &t.name,
            LoadedTable::Relational(t) => t.name(),
        }
    }

    fn rename(&mut self, name: String) {
        match self {
            LoadedTable::Raw(t) => t.name = name,
            LoadedTable::Relational(t) => t.set_name(name),
        }
    }

    /// Raw tables report every column as text until optimized.
    pub fn info(&self) -> TableInfo {
        match self {
            LoadedTable::Raw(t) => TableInfo {
                name: t.name.clone(),
                schema: Schema::new(
                    t.columns
                        .iter()
                        .map(|c| Field::new(c.name.clone(), DataType::Utf8))
                        .collect(),
                ),
                row_count: t.num_rows(),
            },
            LoadedTable::Relational(t) => t.info(),
        }
    }
}

/// A table that could not be loaded while its siblings were.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableFailure {
    pub table: String,
    pub reason: String,
}

#[derive(Debug)]
pub struct LoadedSource {
    pub kind: FormatKind,
    pub tables: Vec<LoadedTable>,
    pub failures: Vec<TableFailure>,
}

impl LoadedSource {
    pub fn new(kind: FormatKind, tables: Vec<LoadedTable>) -> Self {
        Self {
            kind,
            tables,
            failures: Vec::new(),
        }
    }

    /// Make table names unique within the source by suffixing repeats.
    pub fn dedupe_table_names(&mut self) {
        let unique = dedupe_names(self.tables.iter().map(|t| t.name().to_string()));
        for (table, name) in self.tables.iter_mut().zip(unique) {
            if table.name() != name {
                table.rename(name);
            }
        }
    }

    /// `PartialFailure` describing skipped tables, if any were skipped.
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
}

/// Loaders keyed by the kind they handle.
pub struct LoaderRegistry {
    loaders: HashMap<FormatKind, Box<dyn FormatLoader>>,
}

impl LoaderRegistry {
    pub fn empty() -> Self {
        Self {
            loaders: HashMap::new(),
        }
    }

    /// Registry with the four built-in loaders.
    pub fn with_defaults() -> Self {
        let mut reg = Self::empty();
        reg.register(Box::new(DelimitedLoader));
        reg.register(Box::new(SpreadsheetLoader));
        reg.register(Box::new(RecordLoader));
        reg.register(Box::new(RelationalLoader));
        reg
    }

    /// Replaces any loader already registered for the same kind.
    pub fn register(&mut self, loader: Box<dyn FormatLoader>) {
        self.loaders.insert(loader.kind(), loader);
    }

    pub fn get(&self, kind: FormatKind) -> Option<&dyn FormatLoader> {
        self.loaders.get(&kind).map(|b| b.as_ref())
    }

    /// Reject near-empty files, detect (unless `kind` is given), dispatch,
    /// and normalize table names.
    pub fn load(
        &self,
        path: &Path,
        kind: Option<FormatKind>,
        ctx: &LoadContext<'_>,
    ) -> Result<LoadedSource> {
        let bytes = std::fs::metadata(path)?.len();
        if bytes < ctx.config.min_source_bytes {
            return Err(LoadError::EmptySource {
                path: path.to_path_buf(),
                bytes,
            });
        }
        let kind = match kind {
            Some(k) => k,
            None => detect(path)?,
        };
        let loader = self
            .get(kind)
            .ok_or_else(|| LoadError::UnsupportedFormat(format!("no loader for {kind}")))?;
        tracing::debug!(path = %path.display(), %kind, "loading source");
        let mut source = loader.load(path, ctx)?;
        if source.tables.is_empty() {
            if let Some(err) = source.partial_failure() {
                return Err(err);
            }
            return Err(LoadError::NoTables(path.to_path_buf()));
        }
        source.dedupe_table_names();
        Ok(source)
    }
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabseek_core::progress::NoProgress;

    struct Fixed;

    impl FormatLoader for Fixed {
        fn kind(&self) -> FormatKind {
            FormatKind::Delimited
        }

        fn load(&self, _path: &Path, _ctx: &LoadContext<'_>) -> Result<LoadedSource> {
            let a = RawTable::new("t", vec!["x".into()]);
            let b = RawTable::new("t", vec!["y".into()]);
            Ok(LoadedSource::new(
                FormatKind::Delimited,
                vec![LoadedTable::Raw(a), LoadedTable::Raw(b)],
            ))
        }
    }

    #[test]
    fn registered_loader_replaces_default_and_names_are_deduped() {
        let mut reg = LoaderRegistry::with_defaults();
        reg.register(Box::new(Fixed));
        let cfg = EngineConfig::default();
        let ctx = LoadContext {
            config: &cfg,
            progress: &NoProgress,
        };
        let file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        std::fs::write(file.path(), "x\n1\n").unwrap();
        let src = reg
            .load(file.path(), Some(FormatKind::Delimited), &ctx)
            .unwrap();
        let names: Vec<&str> = src.tables.iter().map(LoadedTable::name).collect();
        assert_eq!(names, vec!["t", "t_2"]);
        assert!(src.partial_failure().is_none());
    }

    #[test]
    fn near_empty_files_fail_before_any_loader_runs() {
        let reg = LoaderRegistry::with_defaults();
        let cfg = EngineConfig::default();
        let ctx = LoadContext {
            config: &cfg,
            progress: &NoProgress,
        };
        let dir = tempfile::tempdir().unwrap();
        for name in ["empty.db", "empty.xlsx", "empty.json", "empty.csv", "empty.bin"] {
            let path = dir.path().join(name);
            std::fs::write(&path, b"").unwrap();
            let err = reg.load(&path, None, &ctx).unwrap_err();
            assert!(
                matches!(err, LoadError::EmptySource { bytes: 0, .. }),
                "{name}: {err}"
            );
        }
        let tiny = dir.path().join("tiny.sqlite");
        std::fs::write(&tiny, b"SQ").unwrap();
        let err = reg.load(&tiny, Some(FormatKind::Relational), &ctx).unwrap_err();
        assert!(matches!(err, LoadError::EmptySource { bytes: 2, .. }), "{err}");
    }

    #[test]
    fn partial_failure_lists_skipped_tables() {
        let mut src = LoadedSource::new(FormatKind::Spreadsheet, Vec::new());
        src.failures.push(TableFailure {
            table: "Sheet2".into(),
            reason: "bad cell".into(),
        });
        match src.partial_failure() {
            Some(LoadError::PartialFailure { loaded, failed }) => {
                assert_eq!(loaded, 0);
                assert_eq!(failed, vec!["Sheet2: bad cell".to_string()]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
