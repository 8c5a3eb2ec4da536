//! Format kind detection: extension first, then magic bytes.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::buf::read_prefix;
use crate::error::{LoadError, Result};

const SQLITE_MAGIC: &[u8] = b"SQLite format 3\0";
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0];
const SNIFF_BYTES: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatKind {
    /// CSV/TSV and other separator-delimited text.
    Delimited,
    /// Workbooks; one table per sheet.
    Spreadsheet,
    /// JSON documents and JSON Lines.
    Record,
    /// SQLite databases; tables stay behind the connection.
    Relational,
}

impl FormatKind {
    pub fn from_extension(ext: &str) -> Option<FormatKind> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" | "tsv" | "txt" | "tab" | "psv" => Some(FormatKind::Delimited),
            "xlsx" | "xls" | "xlsm" | "xlsb" | "xla" | "xlam" | "ods" => {
                Some(FormatKind::Spreadsheet)
            }
            "json" | "jsonl" | "ndjson" => Some(FormatKind::Record),
            "db" | "sqlite" | "sqlite3" | "db3" => Some(FormatKind::Relational),
            _ => None,
        }
    }

    /// Classify from leading bytes.
    pub fn sniff(bytes: &[u8]) -> Option<FormatKind> {
        if bytes.starts_with(SQLITE_MAGIC) {
            return Some(FormatKind::Relational);
        }
        if bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(OLE_MAGIC) {
            return Some(FormatKind::Spreadsheet);
        }
        let text = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        match text.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'[') | Some(b'{') => Some(FormatKind::Record),
            _ => None,
        }
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FormatKind::Delimited => "delimited",
            FormatKind::Spreadsheet => "spreadsheet",
            FormatKind::Record => "record",
            FormatKind::Relational => "relational",
        };
        f.write_str(s)
    }
}

/// Detect the kind of the file at `path`.
pub fn detect(path: &Path) -> Result<FormatKind> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    if let Some(ext) = ext.as_deref() {
        if matches!(ext, "mdb" | "accdb") {
            return Err(LoadError::UnsupportedFormat(format!(
                "'.{ext}' databases are not supported"
            )));
        }
        if let Some(kind) = FormatKind::from_extension(ext) {
            return Ok(kind);
        }
    }
    let head = read_prefix(path, SNIFF_BYTES)?;
    FormatKind::sniff(&head).ok_or_else(|| {
        LoadError::UnsupportedFormat(format!("cannot determine the format of '{}'", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn extensions_map_to_kinds() {
        assert_eq!(FormatKind::from_extension("CSV"), Some(FormatKind::Delimited));
        assert_eq!(FormatKind::from_extension("ods"), Some(FormatKind::Spreadsheet));
        assert_eq!(FormatKind::from_extension("ndjson"), Some(FormatKind::Record));
        assert_eq!(FormatKind::from_extension("sqlite3"), Some(FormatKind::Relational));
        assert_eq!(FormatKind::from_extension("exe"), None);
    }

    #[test]
    fn sniffs_magic_bytes() {
        assert_eq!(FormatKind::sniff(b"SQLite format 3\0rest"), Some(FormatKind::Relational));
        assert_eq!(FormatKind::sniff(b"PK\x03\x04...."), Some(FormatKind::Spreadsheet));
        assert_eq!(FormatKind::sniff(b"  \n [{\"a\":1}]"), Some(FormatKind::Record));
        assert_eq!(FormatKind::sniff(b"a,b,c"), None);
    }

    #[test]
    fn access_databases_are_rejected() {
        let err = detect(Path::new("legacy.accdb")).unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedFormat(_)));
    }

    #[test]
    fn unknown_extension_falls_back_to_sniffing() {
        let mut f = tempfile::Builder::new().suffix(".data").tempfile().unwrap();
        f.write_all(b"{\"a\": 1}").unwrap();
        assert_eq!(detect(f.path()).unwrap(), FormatKind::Record);

        let mut g = tempfile::Builder::new().suffix(".bin").tempfile().unwrap();
        g.write_all(&[0u8, 1, 2, 3]).unwrap();
        assert!(matches!(detect(g.path()), Err(LoadError::UnsupportedFormat(_))));
    }
}
