use thiserror::Error;

/// Canonical result for core.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Column '{column}' has {actual} values, table expects {expected}")]
    RowCountMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("Duplicate column name '{0}'")]
    DuplicateColumn(String),
}
