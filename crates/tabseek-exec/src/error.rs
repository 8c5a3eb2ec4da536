use serde::Serialize;
use thiserror::Error;

use tabseek_io::LoadError;
use tabseek_operators::OpError;

pub type Result<T> = std::result::Result<T, ExecError>;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("unknown source '{0}'")]
    UnknownSource(String),

    #[error("source '{source_id}' has no table '{table}'")]
    UnknownTable { source_id: String, table: String },

    #[error("load: {0}")]
    Load(#[from] LoadError),

    #[error("search: {0}")]
    Search(#[from] SearchError),

    #[error("operator: {0}")]
    Operator(#[from] OpError),

    #[error("config: {0}")]
    Config(#[from] tabseek_core::Error),

    #[error("runtime: {0}")]
    Runtime(String),
}

/// A per-table failure inside a global search. Recorded, never raised.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum SearchError {
    #[error("timed out after {elapsed_ms} ms")]
    Timeout { elapsed_ms: u64 },

    #[error("task failed: {0}")]
    TaskFailure(String),
}
