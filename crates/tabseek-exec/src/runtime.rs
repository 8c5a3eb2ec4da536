//! Engine: the facade a shell drives.
//!
//! The engine owns the configuration, the loader registry, the source
//! registry, and a tokio runtime sized to the worker pool. Blocking entry
//! points (`load`, `search_global`) run on the calling thread and must not
//! be called from inside an async context; the `spawn_*` variants return
//! immediately with a handle to wait on.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::runtime::{Handle, Runtime};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use tabseek_core::cancel::CancellationToken;
use tabseek_core::config::EngineConfig;
use tabseek_core::progress::{ProgressSink, ScaledProgress};
use tabseek_io::{fingerprint, LoadContext, LoadedTable, LoaderRegistry};
use tabseek_operators::{column_stats, optimize_table, table_stats, ColumnStats, LocalResult};

use crate::error::{ExecError, Result, SearchError};
use crate::metrics::emit_span;
use crate::registry::SourceRegistry;
use crate::result::SearchResult;
use crate::scheduler::{search_all, SearchRequest};
use crate::source::{Source, SourceDescriptor, SourceTable};

/// Counts over everything currently loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    pub sources: usize,
    pub tables: usize,
    pub relational_tables: usize,
    pub indexed_tables: usize,
    pub rows: usize,
    pub workers: usize,
    pub chunk_rows: usize,
}

pub struct Engine {
    cfg: EngineConfig,
    loaders: Arc<LoaderRegistry>,
    registry: Arc<SourceRegistry>,
    handle: Handle,
    // Taken in `Drop` so stuck blocking tasks cannot hold up shutdown.
    runtime: Option<Runtime>,
}

impl Engine {
    pub fn new(cfg: EngineConfig) -> Result<Self> {
        Self::with_loaders(cfg, LoaderRegistry::with_defaults())
    }

    pub fn with_loaders(cfg: EngineConfig, loaders: LoaderRegistry) -> Result<Self> {
        cfg.validate()?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(cfg.effective_workers())
            .thread_name("tabseek-worker")
            .enable_time()
            .build()
            .map_err(|e| ExecError::Runtime(e.to_string()))?;
        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Some(runtime),
            cfg,
            loaders: Arc::new(loaders),
            registry: Arc::new(SourceRegistry::new()),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    pub fn registry(&self) -> &Arc<SourceRegistry> {
        &self.registry
    }

    pub fn sources(&self) -> Vec<Arc<Source>> {
        self.registry.snapshot()
    }

    pub fn source(&self, identifier: &str) -> Result<Arc<Source>> {
        self.registry
            .get(identifier)
            .ok_or_else(|| ExecError::UnknownSource(identifier.to_string()))
    }

    /// Load a source on the calling thread and register it.
    ///
    /// Progress runs 0..=90 while the file is read and 90..=100 while
    /// tables are optimized.
    pub fn load(
        &self,
        descriptor: impl Into<SourceDescriptor>,
        progress: &dyn ProgressSink,
    ) -> Result<Arc<Source>> {
        let source = build_source(&self.loaders, &self.cfg, &descriptor.into(), progress)?;
        let source = self.registry.insert(source);
        info!(source = source.identifier(), tables = source.tables().len(), "source loaded");
        Ok(source)
    }

    /// Load on the blocking pool; the caller keeps going.
    pub fn spawn_load(
        &self,
        descriptor: impl Into<SourceDescriptor>,
        progress: Arc<dyn ProgressSink>,
    ) -> PendingLoad {
        let descriptor = descriptor.into();
        let loaders = Arc::clone(&self.loaders);
        let registry = Arc::clone(&self.registry);
        let cfg = self.cfg.clone();
        let join = self.handle.spawn_blocking(move || {
            let source = build_source(&loaders, &cfg, &descriptor, progress.as_ref())?;
            Ok(registry.insert(source))
        });
        PendingLoad {
            join,
            handle: self.handle.clone(),
        }
    }

    /// Rebuild a source from its origin and swap it in. An unchanged origin
    /// (same fingerprint) keeps the current source.
    pub fn reload(&self, identifier: &str, progress: &dyn ProgressSink) -> Result<Arc<Source>> {
        let current = self.source(identifier)?;
        let fp = fingerprint(current.origin())?;
        if fp == current.fingerprint() {
            debug!(source = identifier, "origin unchanged; keeping loaded source");
            progress.report("unchanged", 100);
            return Ok(current);
        }
        let descriptor = SourceDescriptor::new(current.origin()).with_kind(current.kind());
        let fresh = build_source(&self.loaders, &self.cfg, &descriptor, progress)?;
        let fresh = self.registry.replace(identifier, fresh)?;
        info!(source = identifier, "source reloaded");
        Ok(fresh)
    }

    /// Drop a source. Searches already holding it finish normally.
    pub fn unload(&self, identifier: &str) -> Result<()> {
        self.registry
            .remove(identifier)
            .map(|_| info!(source = identifier, "source unloaded"))
            .ok_or_else(|| ExecError::UnknownSource(identifier.to_string()))
    }

    pub fn search_local(
        &self,
        source: &str,
        table: &str,
        term: &str,
        limit: usize,
    ) -> Result<LocalResult> {
        let src = self.source(source)?;
        let t = src.table(table).ok_or_else(|| ExecError::UnknownTable {
            source_id: source.to_string(),
            table: table.to_string(),
        })?;
        t.search(term, limit, self.cfg.index_min_distinct)
            .map_err(|e| ExecError::Search(SearchError::TaskFailure(e.to_string())))
    }

    /// Search every loaded table, blocking the caller until done.
    pub fn search_global(
        &self,
        term: &str,
        limit_per_table: usize,
        progress: &dyn ProgressSink,
        cancel: Option<&CancellationToken>,
    ) -> SearchResult {
        let request = SearchRequest::new(term, limit_per_table, &self.cfg);
        let token = cancel.cloned().unwrap_or_default();
        self.handle
            .block_on(search_all(self.registry.snapshot(), request, progress, token))
    }

    /// Start a global search on the runtime and return at once.
    pub fn spawn_search_global(
        &self,
        term: &str,
        limit_per_table: usize,
        progress: Arc<dyn ProgressSink>,
    ) -> PendingSearch {
        let request = SearchRequest::new(term, limit_per_table, &self.cfg);
        let sources = self.registry.snapshot();
        let cancel = CancellationToken::new();
        let (tx, rx) = oneshot::channel();
        {
            let cancel = cancel.clone();
            self.handle.spawn(async move {
                let result = search_all(sources, request, progress.as_ref(), cancel).await;
                tx.send(result).ok();
            });
        }
        PendingSearch {
            rx,
            cancel,
            handle: self.handle.clone(),
        }
    }

    pub fn table_stats(&self, source: &str, table: &str) -> Result<Vec<ColumnStats>> {
        let t = self.materialize(source, table)?;
        Ok(table_stats(&t))
    }

    pub fn column_stats(&self, source: &str, table: &str, column: &str) -> Result<ColumnStats> {
        let t = self.materialize(source, table)?;
        Ok(column_stats(&t, column)?)
    }

    fn materialize(&self, source: &str, table: &str) -> Result<Arc<tabseek_core::types::Table>> {
        let src = self.source(source)?;
        let t = src.table(table).ok_or_else(|| ExecError::UnknownTable {
            source_id: source.to_string(),
            table: table.to_string(),
        })?;
        Ok(t.materialize()?)
    }

    pub fn stats(&self) -> EngineStats {
        let sources = self.registry.snapshot();
        let tables = || sources.iter().flat_map(|s| s.tables().iter());
        EngineStats {
            sources: sources.len(),
            tables: tables().count(),
            relational_tables: tables()
                .filter(|t| matches!(t, SourceTable::Relational(_)))
                .count(),
            indexed_tables: tables().filter(|t| t.is_indexed()).count(),
            rows: sources.iter().map(|s| s.row_count()).sum(),
            workers: self.cfg.effective_workers(),
            chunk_rows: self.cfg.chunk_rows,
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Some(rt) = self.runtime.take() {
            rt.shutdown_background();
        }
    }
}

/// A load running on the engine's blocking pool.
pub struct PendingLoad {
    join: JoinHandle<Result<Arc<Source>>>,
    handle: Handle,
}

impl PendingLoad {
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Block until the load finishes.
    pub fn wait(self) -> Result<Arc<Source>> {
        self.handle
            .block_on(self.join)
            .map_err(|e| ExecError::Runtime(format!("load task: {e}")))?
    }
}

/// A global search running on the engine's runtime.
pub struct PendingSearch {
    rx: oneshot::Receiver<SearchResult>,
    cancel: CancellationToken,
    handle: Handle,
}

impl PendingSearch {
    /// Stop dispatching further tables. Tables already running finish.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The result, if the search has finished.
    pub fn try_result(&mut self) -> Option<SearchResult> {
        self.rx.try_recv().ok()
    }

    /// Block until the search finishes.
    pub fn wait(self) -> Result<SearchResult> {
        self.handle
            .block_on(self.rx)
            .map_err(|_| ExecError::Runtime("search task ended without a result".into()))
    }
}

fn build_source(
    loaders: &LoaderRegistry,
    cfg: &EngineConfig,
    descriptor: &SourceDescriptor,
    progress: &dyn ProgressSink,
) -> Result<Source> {
    let started = Instant::now();
    let path = descriptor.path.as_path();
    let fp = fingerprint(path)?;

    let reading = ScaledProgress::new(progress, 0, 90);
    let ctx = LoadContext {
        config: cfg,
        progress: &reading,
    };
    let loaded = loaders.load(path, descriptor.kind, &ctx)?;

    let optimizing = ScaledProgress::new(progress, 90, 100);
    let total = loaded.tables.len().max(1);
    let mut tables = Vec::with_capacity(loaded.tables.len());
    for (i, t) in loaded.tables.into_iter().enumerate() {
        let table = match t {
            LoadedTable::Raw(raw) => {
                let table = SourceTable::memory(optimize_table(raw, cfg.categorical_threshold)?);
                if cfg.eager_index {
                    table.ensure_index(cfg.index_min_distinct);
                }
                table
            }
            LoadedTable::Relational(r) => SourceTable::Relational(r),
        };
        tables.push(table);
        optimizing.report("optimizing tables", (((i + 1) * 100) / total) as u8);
    }

    let identifier = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let source = Source::new(identifier, path, loaded.kind, tables, fp).with_failures(loaded.failures);
    if let Some(partial) = source.partial_failure() {
        warn!(path = %path.display(), error = %partial, "source loaded with failures");
    }
    emit_span(
        "source.loaded",
        &[
            ("path", path.display().to_string()),
            ("kind", source.kind().to_string()),
            ("tables", source.tables().len().to_string()),
            ("rows", source.row_count().to_string()),
            ("elapsed_ms", started.elapsed().as_millis().to_string()),
        ],
    );
    Ok(source)
}
