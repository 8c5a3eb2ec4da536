#![forbid(unsafe_code)]
//! tabseek-core: the shared table model and plumbing types.
//!
//! No I/O and no threads live here. Loaders (`tabseek-io`), the optimizer and
//! search operators (`tabseek-operators`), and the runtime (`tabseek-exec`)
//! all speak in terms of the `Table`/`Column`/`Scalar` types defined below.

pub mod cancel;
pub mod config;
pub mod error;
pub mod hash;
pub mod id;
pub mod naming;
pub mod prelude;
pub mod progress;
pub mod schema;
pub mod text;
pub mod types;

pub use error::{Error, Result};
