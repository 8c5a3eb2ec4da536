#![forbid(unsafe_code)]
//! tabseek-io: turning files into tables.
//!
//! `detect` picks a `FormatKind`, the `LoaderRegistry` dispatches to the
//! matching `FormatLoader`, and loaders hand back raw text tables (or, for
//! SQLite, tables left behind their connection).

pub mod buf;
pub mod detect;
pub mod error;
pub mod fingerprint;
pub mod loader;
pub mod readers;

pub use detect::{detect, FormatKind};
pub use error::{LoadError, Result};
pub use fingerprint::fingerprint;
pub use loader::{FormatLoader, LoadContext, LoadedSource, LoadedTable, LoaderRegistry, TableFailure};
pub use readers::{RelationalMatches, RelationalTable};
