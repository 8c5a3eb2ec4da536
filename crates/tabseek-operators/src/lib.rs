#![forbid(unsafe_code)]
//! tabseek-operators: everything that runs over an in-memory `Table`.
//!
//! - `optimize`: raw text cells to the narrowest safe column types
//! - `index`: per-column trigram index for substring pruning
//! - `search`: case-insensitive substring search over one table
//! - `stats`: per-column summaries
//!
//! Pure and synchronous: concurrency lives in `tabseek-exec`.

pub mod error;
pub mod index;
pub mod optimize;
pub mod search;
pub mod stats;

pub use error::{OpError, Result};
pub use index::SearchIndex;
pub use optimize::{optimize_column, optimize_raw, optimize_table};
pub use search::{find_rows, search_table, LocalResult};
pub use stats::{column_stats, table_stats, ColumnStats};
