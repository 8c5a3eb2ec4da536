use thiserror::Error;

pub type Result<T> = std::result::Result<T, OpError>;

#[derive(Debug, Error)]
pub enum OpError {
    #[error("column '{0}' not found")]
    UnknownColumn(String),

    #[error("table error: {0}")]
    Table(#[from] tabseek_core::Error),
}
