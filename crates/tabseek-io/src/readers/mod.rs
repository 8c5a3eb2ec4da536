//! One loader per format kind.

pub mod delimited;
pub mod record;
pub mod relational;
pub mod spreadsheet;

pub use delimited::DelimitedLoader;
pub use record::RecordLoader;
pub use relational::{RelationalLoader, RelationalMatches, RelationalTable};
pub use spreadsheet::SpreadsheetLoader;
