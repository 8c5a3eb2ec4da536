//! Fan-out/fan-in global search.
//!
//! One task per (source, table). A dispatcher hands tasks to a pool bounded
//! by a semaphore; each task runs the local search on the blocking pool
//! under a timeout, and reports on an unbounded completion channel. The
//! collector drains that channel, aggregates, and reports progress.
//!
//! A task that panics, errors, or times out becomes a `TaskError` in the
//! result; the batch always completes.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, warn};

use tabseek_core::cancel::CancellationToken;
use tabseek_core::config::EngineConfig;
use tabseek_core::id::TaskId;
use tabseek_core::progress::ProgressSink;
use tabseek_core::text::Needle;
use tabseek_core::types::{Column, ColumnData, Table};
use tabseek_operators::LocalResult;

use crate::error::SearchError;
use crate::metrics::emit_span;
use crate::result::{
    SearchResult, TableMatches, TableSummary, TaskError, ROW_INDEX_COLUMN, SOURCE_COLUMN,
    TABLE_COLUMN,
};
use crate::source::Source;

/// Parameters of one global search.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub term: String,
    pub limit_per_table: usize,
    pub workers: usize,
    pub task_timeout: Duration,
    pub progress_every: usize,
    pub index_min_distinct: usize,
}

impl SearchRequest {
    pub fn new(term: impl Into<String>, limit_per_table: usize, cfg: &EngineConfig) -> Self {
        Self {
            term: term.into(),
            limit_per_table,
            workers: cfg.effective_workers(),
            task_timeout: Duration::from_millis(cfg.task_timeout_ms),
            progress_every: cfg.progress_every.max(1),
            index_min_distinct: cfg.index_min_distinct,
        }
    }
}

struct TaskOutput {
    match_count: usize,
    truncated: bool,
    /// Matched rows with provenance columns.
    rows: Table,
}

struct Completion {
    source: String,
    table: String,
    outcome: Result<TaskOutput, SearchError>,
}

enum Event {
    Done(Completion),
    /// Dispatch stopped early; this many tasks were never started.
    Cancelled(usize),
}

/// Run one local search per table of every source in `sources`.
pub async fn search_all(
    sources: Vec<Arc<Source>>,
    request: SearchRequest,
    progress: &dyn ProgressSink,
    cancel: CancellationToken,
) -> SearchResult {
    let started = Instant::now();
    let mut result = SearchResult::empty(&request.term);

    let tasks: Vec<(Arc<Source>, usize)> = sources
        .iter()
        .flat_map(|s| (0..s.tables().len()).map(move |i| (Arc::clone(s), i)))
        .collect();
    let total = tasks.len();

    if Needle::new(&request.term).is_none() || total == 0 {
        progress.report("nothing to search", 100);
        result.elapsed_ms = started.elapsed().as_millis() as u64;
        return result;
    }

    progress.report(&format!("searching {total} tables"), 0);

    let semaphore = Arc::new(Semaphore::new(request.workers.max(1)));
    let (complete_tx, mut complete_rx) = mpsc::unbounded_channel::<Event>();
    let request = Arc::new(request);

    // Dispatcher: one permit per running task, checked for cancellation at
    // every table boundary.
    {
        let semaphore = Arc::clone(&semaphore);
        let request = Arc::clone(&request);
        let complete_tx = complete_tx.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let mut pending = tasks.into_iter();
            while let Some((source, idx)) = pending.next() {
                let permit = match semaphore.clone().acquire_owned().await {
                    Ok(p) => p,
                    Err(_) => break,
                };
                if cancel.is_cancelled() {
                    drop(permit);
                    let skipped = 1 + pending.len();
                    complete_tx.send(Event::Cancelled(skipped)).ok();
                    break;
                }
                let request = Arc::clone(&request);
                let complete_tx = complete_tx.clone();
                tokio::spawn(async move {
                    let source_id = source.identifier().to_string();
                    let table_name = source.tables()[idx].name().to_string();
                    let task_id = TaskId::next();
                    debug!(%task_id, source = %source_id, table = %table_name, "table search started");
                    let task_started = Instant::now();
                    let blocking = {
                        let request = Arc::clone(&request);
                        tokio::task::spawn_blocking(move || {
                            // The slot stays taken until the search itself
                            // returns, even if the timeout already fired.
                            let _permit = permit;
                            run_task(&source, idx, &request)
                        })
                    };
                    let outcome = match tokio::time::timeout(request.task_timeout, blocking).await {
                        Ok(Ok(Ok(found))) => Ok(found),
                        Ok(Ok(Err(e))) => Err(SearchError::TaskFailure(e)),
                        Ok(Err(join)) => Err(SearchError::TaskFailure(join_message(join))),
                        Err(_) => Err(SearchError::Timeout {
                            elapsed_ms: task_started.elapsed().as_millis() as u64,
                        }),
                    };
                    complete_tx
                        .send(Event::Done(Completion {
                            source: source_id,
                            table: table_name,
                            outcome,
                        }))
                        .ok();
                });
            }
        });
    }
    // Ours must go so the channel closes once every task has reported.
    drop(complete_tx);

    let mut completed = 0usize;
    let mut searched_sources: HashSet<String> = HashSet::new();
    while let Some(event) = complete_rx.recv().await {
        let done = match event {
            Event::Cancelled(skipped) => {
                debug!(skipped, "global search cancelled");
                result.cancelled = true;
                continue;
            }
            Event::Done(done) => done,
        };
        completed += 1;
        result.tables_searched += 1;
        searched_sources.insert(done.source.clone());
        match done.outcome {
            Ok(out) => {
                result.total_matches += out.match_count;
                result.summary.push(TableSummary {
                    source: done.source.clone(),
                    table: done.table.clone(),
                    match_count: out.match_count,
                    truncated: out.truncated,
                });
                if out.match_count > 0 {
                    result.matches.push(TableMatches {
                        source: done.source,
                        table: done.table,
                        rows: out.rows,
                    });
                }
            }
            Err(error) => {
                warn!(source = %done.source, table = %done.table, %error, "table search failed");
                result.errors.push(TaskError {
                    source: done.source,
                    table: done.table,
                    error,
                });
            }
        }
        if completed % request.progress_every == 0 && completed < total {
            let pct = ((completed * 100) / total).min(99) as u8;
            progress.report(&format!("searched {completed}/{total} tables"), pct);
        }
    }

    result.sources_searched = searched_sources.len();
    result.elapsed_ms = started.elapsed().as_millis() as u64;
    progress.report(
        &format!(
            "{} matches in {} tables",
            result.total_matches, result.tables_searched
        ),
        100,
    );
    emit_span(
        "search.complete",
        &[
            ("search_id", result.search_id.to_string()),
            ("tables", result.tables_searched.to_string()),
            ("matches", result.total_matches.to_string()),
            ("errors", result.errors.len().to_string()),
            ("elapsed_ms", result.elapsed_ms.to_string()),
        ],
    );
    result
}

/// Search one table and prepend provenance columns to its matches.
fn run_task(source: &Source, idx: usize, request: &SearchRequest) -> Result<TaskOutput, String> {
    let table = &source.tables()[idx];
    crate::fail_point!(table.name(), request.task_timeout * 2);
    let LocalResult {
        rows,
        row_indices,
        truncated,
    } = table
        .search(&request.term, request.limit_per_table, request.index_min_distinct)
        .map_err(|e| e.to_string())?;
    let match_count = row_indices.len();
    let leading = vec![
        Column::new(
            SOURCE_COLUMN,
            ColumnData::Utf8(vec![Some(source.identifier().to_string()); match_count]),
        ),
        Column::new(
            TABLE_COLUMN,
            ColumnData::Utf8(vec![Some(table.name().to_string()); match_count]),
        ),
        Column::new(
            ROW_INDEX_COLUMN,
            ColumnData::Int64(row_indices.iter().map(|&r| Some(r as i64)).collect()),
        ),
    ];
    let rows = rows
        .with_leading_columns(leading)
        .map_err(|e| format!("annotating matches: {e}"))?;
    Ok(TaskOutput {
        match_count,
        truncated,
        rows,
    })
}

fn join_message(err: tokio::task::JoinError) -> String {
    if err.is_panic() {
        let payload = err.into_panic();
        if let Some(s) = payload.downcast_ref::<&str>() {
            return format!("panicked: {s}");
        }
        if let Some(s) = payload.downcast_ref::<String>() {
            return format!("panicked: {s}");
        }
        "panicked".to_string()
    } else {
        err.to_string()
    }
}
