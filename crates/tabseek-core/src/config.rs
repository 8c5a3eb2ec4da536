//! Engine configuration that downstream crates can serialize/deserialize.
//!
//! Precedence is CLI flags over `TABSEEK_*` environment variables over the
//! defaults below.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Upper bound on search/load workers regardless of hardware parallelism.
pub const MAX_WORKERS_CAP: usize = 8;

/// Text columns whose distinct/row ratio falls below this become categorical.
pub const DEFAULT_CATEGORICAL_THRESHOLD: f64 = 0.5;

/// A delimited-text parsing configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dialect {
    pub delimiter: u8,
    pub has_header: bool,
}

impl Dialect {
    pub const COMMA: Dialect = Dialect::new(b',', true);
    pub const SEMICOLON: Dialect = Dialect::new(b';', true);
    pub const TAB: Dialect = Dialect::new(b'\t', true);
    pub const PIPE: Dialect = Dialect::new(b'|', true);
    pub const COMMA_NO_HEADER: Dialect = Dialect::new(b',', false);

    pub const fn new(delimiter: u8, has_header: bool) -> Self {
        Self {
            delimiter,
            has_header,
        }
    }

    /// The fixed probing order: comma, semicolon, tab, pipe, comma-no-header.
    pub fn candidates() -> Vec<Dialect> {
        vec![
            Self::COMMA,
            Self::SEMICOLON,
            Self::TAB,
            Self::PIPE,
            Self::COMMA_NO_HEADER,
        ]
    }

    pub fn label(&self) -> String {
        let sep = match self.delimiter {
            b',' => "comma".to_string(),
            b';' => "semicolon".to_string(),
            b'\t' => "tab".to_string(),
            b'|' => "pipe".to_string(),
            other => format!("0x{other:02x}"),
        };
        if self.has_header {
            format!("{sep}-with-header")
        } else {
            format!("{sep}-no-header")
        }
    }

    /// Inverse of `label` for the named separators.
    pub fn from_label(label: &str) -> Option<Dialect> {
        let (sep, has_header) = if let Some(s) = label.strip_suffix("-no-header") {
            (s, false)
        } else {
            (label.strip_suffix("-with-header").unwrap_or(label), true)
        };
        let delimiter = match sep {
            "comma" => b',',
            "semicolon" => b';',
            "tab" => b'\t',
            "pipe" => b'|',
            _ => return None,
        };
        Some(Dialect::new(delimiter, has_header))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Worker pool size for global search and sheet loading.
    pub max_workers: usize,

    /// Hard ceiling applied on top of `max_workers`.
    pub max_workers_cap: usize,

    /// Default per-table result cap.
    pub result_limit: usize,

    /// Per-table search budget; an overrun is recorded as a failed task.
    pub task_timeout_ms: u64,

    /// Report global search progress every N completed tables.
    pub progress_every: usize,

    /// Records parsed per chunk when reading delimited text.
    pub chunk_rows: usize,

    /// Capacity of the buffered reader in front of delimited files.
    pub read_buffer_bytes: usize,

    /// Sources smaller than this fail with `EmptySource` before parsing.
    pub min_source_bytes: u64,

    /// Records parsed per dialect candidate while probing.
    pub dialect_probe_rows: usize,

    /// Distinct/row ratio below which text becomes categorical.
    pub categorical_threshold: f64,

    /// Build search indexes right after load instead of on first search.
    pub eager_index: bool,

    /// Categorical columns with fewer dictionary entries are not indexed.
    pub index_min_distinct: usize,

    /// Delimited-text candidates, tried in order.
    pub dialects: Vec<Dialect>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let hw = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self {
            max_workers: hw.min(MAX_WORKERS_CAP),
            max_workers_cap: MAX_WORKERS_CAP,
            result_limit: 1000,
            task_timeout_ms: 30_000,
            progress_every: 5,
            chunk_rows: 50_000,
            read_buffer_bytes: 1024 * 1024, // 1 MiB
            min_source_bytes: 3,
            dialect_probe_rows: 5,
            categorical_threshold: DEFAULT_CATEGORICAL_THRESHOLD,
            eager_index: false,
            index_min_distinct: 64,
            dialects: Dialect::candidates(),
        }
    }
}

impl EngineConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `TABSEEK_MAX_WORKERS`: worker pool size (still capped)
    /// - `TABSEEK_RESULT_LIMIT`: default per-table result cap
    /// - `TABSEEK_TASK_TIMEOUT_MS`: per-table search timeout
    /// - `TABSEEK_PROGRESS_EVERY`: progress cadence in completed tables
    /// - `TABSEEK_CHUNK_ROWS`: delimited-text chunk size
    /// - `TABSEEK_READ_BUFFER_BYTES`: delimited-text read buffer
    /// - `TABSEEK_MIN_SOURCE_BYTES`: empty-source threshold
    /// - `TABSEEK_CATEGORICAL_THRESHOLD`: categorical promotion ratio
    /// - `TABSEEK_EAGER_INDEX`: `1`/`true` to index at load time
    /// - `TABSEEK_DIALECTS`: comma-separated labels, e.g. `semicolon-with-header,comma-no-header`
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("TABSEEK_MAX_WORKERS") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.max_workers = v;
            }
        }

        if let Ok(s) = std::env::var("TABSEEK_RESULT_LIMIT") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.result_limit = v;
            }
        }

        if let Ok(s) = std::env::var("TABSEEK_TASK_TIMEOUT_MS") {
            if let Ok(v) = s.parse::<u64>() {
                cfg.task_timeout_ms = v;
            }
        }

        if let Ok(s) = std::env::var("TABSEEK_PROGRESS_EVERY") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.progress_every = v;
            }
        }

        if let Ok(s) = std::env::var("TABSEEK_CHUNK_ROWS") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.chunk_rows = v;
            }
        }

        if let Ok(s) = std::env::var("TABSEEK_READ_BUFFER_BYTES") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.read_buffer_bytes = v;
            }
        }

        if let Ok(s) = std::env::var("TABSEEK_MIN_SOURCE_BYTES") {
            if let Ok(v) = s.parse::<u64>() {
                cfg.min_source_bytes = v;
            }
        }

        if let Ok(s) = std::env::var("TABSEEK_CATEGORICAL_THRESHOLD") {
            if let Ok(v) = s.parse::<f64>() {
                cfg.categorical_threshold = v;
            }
        }

        if let Ok(s) = std::env::var("TABSEEK_EAGER_INDEX") {
            cfg.eager_index = matches!(s.trim(), "1" | "true" | "yes");
        }

        if let Ok(s) = std::env::var("TABSEEK_DIALECTS") {
            let parsed: Option<Vec<Dialect>> =
                s.split(',').map(|l| Dialect::from_label(l.trim())).collect();
            if let Some(dialects) = parsed.filter(|d| !d.is_empty()) {
                cfg.dialects = dialects;
            }
        }

        cfg
    }

    /// Workers actually used: `max_workers` clamped to `[1, max_workers_cap]`.
    pub fn effective_workers(&self) -> usize {
        self.max_workers.clamp(1, self.max_workers_cap.max(1))
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(Error::Config("max_workers must be at least 1".into()));
        }
        if self.chunk_rows == 0 {
            return Err(Error::Config("chunk_rows must be at least 1".into()));
        }
        if self.dialect_probe_rows == 0 {
            return Err(Error::Config("dialect_probe_rows must be at least 1".into()));
        }
        if !(self.categorical_threshold > 0.0 && self.categorical_threshold <= 1.0) {
            return Err(Error::Config(format!(
                "categorical_threshold must be in (0, 1], got {}",
                self.categorical_threshold
            )));
        }
        if self.dialects.is_empty() {
            return Err(Error::Config("at least one dialect is required".into()));
        }
        Ok(())
    }
}
