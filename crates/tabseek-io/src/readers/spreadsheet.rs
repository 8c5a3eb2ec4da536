//! Workbook loader: one table per sheet, sheets parsed in parallel.

use std::path::Path;

use calamine::{open_workbook_auto, Data, DataType as _, Range, Reader};
use parking_lot::Mutex;
use rayon::prelude::*;
use tracing::{debug, warn};

use tabseek_core::naming::{dedupe_names, normalize_table_name};
use tabseek_core::text::{format_datetime, format_f64};
use tabseek_core::types::RawTable;

use crate::detect::FormatKind;
use crate::error::{LoadError, Result};
use crate::loader::{FormatLoader, LoadContext, LoadedSource, LoadedTable, TableFailure};

/// Largest float that still converts to an exact integer.
const EXACT_INT_LIMIT: f64 = 9_007_199_254_740_992.0;

#[derive(Debug, Default, Clone, Copy)]
pub struct SpreadsheetLoader;

impl FormatLoader for SpreadsheetLoader {
    fn kind(&self) -> FormatKind {
        FormatKind::Spreadsheet
    }

    fn load(&self, path: &Path, ctx: &LoadContext<'_>) -> Result<LoadedSource> {
        let sheets = open_workbook_auto(path)?.sheet_names();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "workbook".to_string());
        let total = sheets.len().max(1);
        // Held while reporting so sheets finishing together report in order.
        let done = Mutex::new(0usize);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(ctx.config.effective_workers())
            .build()
            .map_err(|e| LoadError::Worker(e.to_string()))?;

        // Each worker opens its own handle: calamine readers are not shareable.
        let outcomes: Vec<(String, std::result::Result<Option<RawTable>, String>)> =
            pool.install(|| {
                sheets
                    .par_iter()
                    .map(|sheet| {
                        let outcome = open_workbook_auto(path)
                            .and_then(|mut wb| wb.worksheet_range(sheet))
                            .map(|range| sheet_table(&format!("{stem}_{sheet}"), &range))
                            .map_err(|e| e.to_string());
                        let mut n = done.lock();
                        *n += 1;
                        ctx.progress
                            .report(&format!("sheet {}/{total}", *n), ((*n * 100) / total) as u8);
                        drop(n);
                        (sheet.clone(), outcome)
                    })
                    .collect()
            });

        let mut source = LoadedSource::new(FormatKind::Spreadsheet, Vec::new());
        for (sheet, outcome) in outcomes {
            match outcome {
                Ok(Some(table)) => source.tables.push(LoadedTable::Raw(table)),
                Ok(None) => debug!(%sheet, "skipping empty sheet"),
                Err(reason) => {
                    warn!(path = %path.display(), %sheet, %reason, "sheet failed to load");
                    source.failures.push(TableFailure {
                        table: sheet,
                        reason,
                    });
                }
            }
        }
        Ok(source)
    }
}

/// Turn a sheet range into a raw table. The first row is the header.
/// Returns `None` for a sheet with no cells.
pub fn sheet_table(name: &str, range: &Range<Data>) -> Option<RawTable> {
    let mut rows = range.rows();
    let header = rows.next()?;
    let headers = dedupe_names(
        header
            .iter()
            .map(|c| cell_text(c).map(|s| s.trim().to_string()).unwrap_or_default()),
    );
    let mut table = RawTable::new(normalize_table_name(name), headers);
    for row in rows {
        table.push_row(row.iter().map(cell_text).collect());
    }
    Some(table)
}

/// Text form of a cell. Empty and error cells are null.
pub fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => Some(s.clone()),
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) => {
            if f.is_finite() && f.fract() == 0.0 && f.abs() < EXACT_INT_LIMIT {
                Some((*f as i64).to_string())
            } else {
                Some(format_f64(*f))
            }
        }
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(dt) => Some(
            cell.as_datetime()
                .map(|d| format_datetime(&d))
                .unwrap_or_else(|| format_f64(dt.as_f64())),
        ),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
    }
}
