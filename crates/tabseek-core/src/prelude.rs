//! Convenient re-exports for downstream crates.

pub use crate::cancel::CancellationToken;
pub use crate::config::{Dialect, EngineConfig};
pub use crate::error::{Error, Result};
pub use crate::hash::Hash256;
pub use crate::id::{SearchId, TaskId};
pub use crate::progress::{NoProgress, ProgressSink, ScaledProgress};
pub use crate::schema::{DataType, Field, Schema};
pub use crate::text::Needle;
pub use crate::types::{Categorical, Column, ColumnData, RawColumn, RawTable, Scalar, Table, TableInfo};
