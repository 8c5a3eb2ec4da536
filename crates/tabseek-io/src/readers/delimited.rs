//! Delimited-text loader with ordered dialect fallback.
//!
//! A dialect is probed against a short prefix with strict field counts; the
//! first candidate that yields at least one column and one record wins. The
//! full file is then read leniently in chunks of `chunk_rows` records.

use std::path::Path;

use csv::{ByteRecord, ReaderBuilder};
use tracing::{debug, warn};

use tabseek_core::config::{Dialect, EngineConfig};
use tabseek_core::naming::{dedupe_names, normalize_table_name};
use tabseek_core::types::RawTable;

use crate::buf::{bounded_from_path, read_prefix};
use crate::detect::FormatKind;
use crate::error::{LoadError, Result};
use crate::loader::{FormatLoader, LoadContext, LoadedSource, LoadedTable};

/// Upper bound on bytes examined when probing dialects.
const PROBE_BYTES: usize = 64 * 1024;

#[derive(Debug, Default, Clone, Copy)]
pub struct DelimitedLoader;

impl FormatLoader for DelimitedLoader {
    fn kind(&self) -> FormatKind {
        FormatKind::Delimited
    }

    fn load(&self, path: &Path, ctx: &LoadContext<'_>) -> Result<LoadedSource> {
        let cfg = ctx.config;
        let total = std::fs::metadata(path)?.len();
        if total < cfg.min_source_bytes {
            return Err(LoadError::EmptySource {
                path: path.to_path_buf(),
                bytes: total,
            });
        }

        let prefix = read_prefix(path, PROBE_BYTES)?;
        let whole_file = prefix.len() as u64 >= total;
        if whole_file && prefix.iter().all(u8::is_ascii_whitespace) {
            return Err(LoadError::EmptySource {
                path: path.to_path_buf(),
                bytes: total,
            });
        }
        let probe = if whole_file {
            &prefix[..]
        } else {
            complete_lines(&prefix)
        };

        let (dialect, width) = choose_dialect(probe, cfg).map_err(|attempted| {
            LoadError::UnparsableFormat {
                path: path.to_path_buf(),
                attempted,
            }
        })?;
        debug!(path = %path.display(), dialect = %dialect.label(), columns = width, "dialect selected");

        let table = read_all(path, dialect, width, total, ctx)?;
        ctx.progress.report("parsed", 100);
        Ok(LoadedSource::new(
            FormatKind::Delimited,
            vec![LoadedTable::Raw(table)],
        ))
    }
}

/// Cut a truncated prefix back to its last full line.
fn complete_lines(prefix: &[u8]) -> &[u8] {
    match prefix.iter().rposition(|&b| b == b'\n') {
        Some(pos) => &prefix[..=pos],
        None => prefix,
    }
}

/// Try each configured dialect in order. On failure returns the labels tried.
pub fn choose_dialect(
    probe: &[u8],
    cfg: &EngineConfig,
) -> std::result::Result<(Dialect, usize), Vec<String>> {
    let mut attempted = Vec::with_capacity(cfg.dialects.len());
    for dialect in &cfg.dialects {
        attempted.push(dialect.label());
        match probe_dialect(probe, *dialect, cfg) {
            Some(width) => return Ok((*dialect, width)),
            None => debug!(dialect = %dialect.label(), "dialect rejected"),
        }
    }
    Err(attempted)
}

/// Column count if `dialect` parses the probe cleanly.
fn probe_dialect(probe: &[u8], dialect: Dialect, cfg: &EngineConfig) -> Option<usize> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(dialect.delimiter)
        .has_headers(dialect.has_header)
        .flexible(false)
        .from_reader(probe);

    let mut width = 0;
    if dialect.has_header {
        let headers = rdr.byte_headers().ok()?;
        width = headers.len();
        if width == 1 {
            let line = headers.get(0).unwrap_or_default();
            let foreign = cfg
                .dialects
                .iter()
                .map(|d| d.delimiter)
                .filter(|&d| d != dialect.delimiter)
                .any(|d| line.contains(&d));
            if foreign {
                return None;
            }
        }
    }

    let mut rows = 0;
    let mut record = ByteRecord::new();
    while rows < cfg.dialect_probe_rows {
        match rdr.read_byte_record(&mut record) {
            Ok(true) => {
                if !dialect.has_header && rows == 0 {
                    width = record.len();
                }
                rows += 1;
            }
            Ok(false) => break,
            Err(_) => return None,
        }
    }

    (rows >= 1 && width >= 1).then_some(width)
}

fn cell(bytes: &[u8]) -> Option<String> {
    Some(String::from_utf8_lossy(bytes).into_owned())
}

fn read_all(
    path: &Path,
    dialect: Dialect,
    width: usize,
    total: u64,
    ctx: &LoadContext<'_>,
) -> Result<RawTable> {
    let cfg = ctx.config;
    let reader = bounded_from_path(path, cfg.read_buffer_bytes)?;
    let mut rdr = ReaderBuilder::new()
        .delimiter(dialect.delimiter)
        .has_headers(dialect.has_header)
        .flexible(true)
        .from_reader(reader);

    let headers = if dialect.has_header {
        dedupe_names(
            rdr.byte_headers()?
                .iter()
                .map(|h| String::from_utf8_lossy(h).trim().to_string()),
        )
    } else {
        (1..=width).map(|i| format!("column_{i}")).collect()
    };

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "table".to_string());
    let mut table = RawTable::new(normalize_table_name(&stem), headers);

    let mut dropped = 0usize;
    let mut chunk: Vec<ByteRecord> = Vec::with_capacity(cfg.chunk_rows.min(4096));
    let mut record = ByteRecord::new();
    loop {
        let more = rdr.read_byte_record(&mut record)?;
        if more {
            chunk.push(record.clone());
        }
        if chunk.len() >= cfg.chunk_rows || (!more && !chunk.is_empty()) {
            for rec in chunk.drain(..) {
                dropped += table.push_row(rec.iter().map(cell).collect());
            }
            let pos = rdr.position().byte();
            let pct = if total == 0 {
                99
            } else {
                ((pos.saturating_mul(100)) / total).min(99) as u8
            };
            ctx.progress
                .report(&format!("read {} rows", table.num_rows()), pct);
        }
        if !more {
            break;
        }
    }

    if dropped > 0 {
        warn!(path = %path.display(), dropped, "extra fields beyond the header were dropped");
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tabseek_core::progress::NoProgress;

    fn write(suffix: &str, body: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        f.write_all(body.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    fn load(body: &str, cfg: &EngineConfig) -> Result<RawTable> {
        let f = write(".csv", body);
        let ctx = LoadContext {
            config: cfg,
            progress: &NoProgress,
        };
        let mut src = DelimitedLoader.load(f.path(), &ctx)?;
        match src.tables.pop() {
            Some(LoadedTable::Raw(t)) => Ok(t),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn comma_with_header() {
        let t = load("id,name,age\n1,Alice,30\n2,Bob,25\n3,Carol,30\n", &EngineConfig::default()).unwrap();
        let names: Vec<&str> = t.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "age"]);
        assert_eq!(t.num_rows(), 3);
        assert_eq!(t.columns[1].values[2].as_deref(), Some("Carol"));
    }

    #[test]
    fn semicolon_wins_after_comma_is_rejected() {
        let cfg = EngineConfig::default();
        let probe = b"a;b;c\n1;2;3\n";
        let (d, width) = choose_dialect(probe, &cfg).unwrap();
        assert_eq!(d, Dialect::SEMICOLON);
        assert_eq!(width, 3);
    }

    #[test]
    fn single_column_file_is_comma_with_header() {
        let cfg = EngineConfig::default();
        let (d, width) = choose_dialect(b"name\nAlice\nBob\n", &cfg).unwrap();
        assert_eq!(d, Dialect::COMMA);
        assert_eq!(width, 1);
    }

    #[test]
    fn header_only_falls_through_to_no_header() {
        let cfg = EngineConfig::default();
        let (d, width) = choose_dialect(b"a,b,c\n", &cfg).unwrap();
        assert_eq!(d, Dialect::COMMA_NO_HEADER);
        assert_eq!(width, 3);
    }

    #[test]
    fn no_dialect_reports_attempts() {
        let cfg = EngineConfig {
            dialects: vec![Dialect::COMMA, Dialect::SEMICOLON],
            ..EngineConfig::default()
        };
        let attempted = choose_dialect(b"a,b\n1,2,3\n", &cfg).unwrap_err();
        assert_eq!(attempted, vec!["comma-with-header", "semicolon-with-header"]);
    }

    #[test]
    fn tiny_and_blank_files_are_empty_sources() {
        let cfg = EngineConfig::default();
        assert!(matches!(load("a\n", &cfg), Err(LoadError::EmptySource { .. })));
        assert!(matches!(load("   \n\n  \n", &cfg), Err(LoadError::EmptySource { .. })));
    }

    #[test]
    fn ragged_rows_are_padded_and_trimmed_across_chunks() {
        let cfg = EngineConfig {
            chunk_rows: 2,
            dialect_probe_rows: 1,
            ..EngineConfig::default()
        };
        let t = load("a,b\n1,2\n3\n4,5,6\n7,8\n", &cfg).unwrap();
        assert_eq!(t.num_rows(), 4);
        assert_eq!(t.columns[1].values[1], None);
        assert_eq!(t.columns[1].values[2].as_deref(), Some("5"));
        assert_eq!(t.columns[0].values[3].as_deref(), Some("7"));
    }

    #[test]
    fn duplicate_and_blank_headers_are_renamed() {
        let t = load("x,x,\n1,2,3\n", &EngineConfig::default()).unwrap();
        let names: Vec<&str> = t.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["x", "x_2", "column_3"]);
    }
}
