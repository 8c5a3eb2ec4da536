use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LoadError>;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("source '{}' is empty ({bytes} bytes)", .path.display())]
    EmptySource { path: PathBuf, bytes: u64 },

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("could not parse '{}' with any dialect (tried: {})", .path.display(), .attempted.join(", "))]
    UnparsableFormat {
        path: PathBuf,
        attempted: Vec<String>,
    },

    #[error("unsupported structure: {0}")]
    UnsupportedStructure(String),

    #[error("{loaded} tables loaded, {} failed: {}", .failed.len(), .failed.join("; "))]
    PartialFailure { loaded: usize, failed: Vec<String> },

    #[error("no tables found in '{}'", .0.display())]
    NoTables(PathBuf),

    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("delimited text: {0}")]
    Csv(#[from] csv::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("spreadsheet: {0}")]
    Spreadsheet(String),

    #[error("relational store: {0}")]
    Relational(#[from] rusqlite::Error),

    #[error("table: {0}")]
    Table(#[from] tabseek_core::Error),

    #[error("worker pool: {0}")]
    Worker(String),
}

impl From<calamine::Error> for LoadError {
    fn from(e: calamine::Error) -> Self {
        LoadError::Spreadsheet(e.to_string())
    }
}
