#![forbid(unsafe_code)]
//! tabseek-exec: loaded sources, the global search scheduler, and the
//! `Engine` facade.
//!
//! Load path: `LoaderRegistry` (tabseek-io) → optimizer (tabseek-operators)
//! → `Source` → `SourceRegistry`. Search path: registry snapshot → one
//! blocking task per table on a bounded pool → `SearchResult`.

pub mod error;
pub mod failpoints;
pub mod metrics;
pub mod progress;
pub mod registry;
pub mod result;
pub mod runtime;
pub mod scheduler;
pub mod source;

pub use error::{ExecError, Result, SearchError};
pub use progress::{progress_channel, ProgressChannel, ProgressEvent, ProgressReceiver};
pub use registry::SourceRegistry;
pub use result::{SearchResult, TableMatches, TableSummary, TaskError};
pub use runtime::{Engine, EngineStats, PendingLoad, PendingSearch};
pub use scheduler::SearchRequest;
pub use source::{Source, SourceDescriptor, SourceTable};
