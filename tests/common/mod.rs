//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tabseek_core::config::EngineConfig;
use tabseek_exec::Engine;

/// Small, deterministic config: two workers, progress on every completion.
pub fn test_config() -> EngineConfig {
    EngineConfig {
        max_workers: 2,
        progress_every: 1,
        ..EngineConfig::default()
    }
}

pub fn engine() -> Engine {
    Engine::new(test_config()).expect("engine")
}

pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("write fixture");
    path
}

/// Collects every progress report for later inspection.
#[derive(Default)]
pub struct Recorder {
    pub events: Mutex<Vec<(String, u8)>>,
}

impl Recorder {
    pub fn sink(&self) -> impl Fn(&str, u8) + Send + Sync + '_ {
        move |msg: &str, pct: u8| {
            self.events
                .lock()
                .expect("recorder lock")
                .push((msg.to_string(), pct));
        }
    }

    pub fn percents(&self) -> Vec<u8> {
        self.events
            .lock()
            .expect("recorder lock")
            .iter()
            .map(|(_, p)| *p)
            .collect()
    }
}

pub fn assert_progress_well_formed(percents: &[u8]) {
    assert!(!percents.is_empty(), "no progress reported");
    for pair in percents.windows(2) {
        assert!(pair[0] <= pair[1], "progress went backwards: {:?}", percents);
    }
    assert_eq!(
        percents.iter().filter(|&&p| p == 100).count(),
        1,
        "100% must be reported exactly once: {:?}",
        percents
    );
    assert_eq!(percents.last(), Some(&100));
}

/// One worksheet of a generated workbook. `rows: None` lists the sheet in
/// the workbook without writing its part, so reading it fails.
pub struct SheetSpec<'a> {
    pub name: &'a str,
    pub rows: Option<&'a [&'a [&'a str]]>,
}

const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const PKG_REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn column_letter(idx: usize) -> char {
    (b'A' + idx as u8) as char
}

/// Write a minimal `.xlsx` (shared strings, numeric cells as numbers).
pub fn write_workbook(dir: &Path, name: &str, sheets: &[SheetSpec<'_>]) -> PathBuf {
    use std::io::Write;
    use zip::write::FileOptions;
    use zip::ZipWriter;

    let mut strings: Vec<String> = Vec::new();
    let mut sheet_parts = Vec::new();
    for (i, sheet) in sheets.iter().enumerate() {
        let Some(rows) = sheet.rows else { continue };
        let mut data = String::new();
        for (r, row) in rows.iter().enumerate() {
            data.push_str(&format!("<row r=\"{}\">", r + 1));
            for (c, cell) in row.iter().enumerate() {
                let at = format!("{}{}", column_letter(c), r + 1);
                if cell.parse::<f64>().is_ok() {
                    data.push_str(&format!("<c r=\"{at}\"><v>{cell}</v></c>"));
                } else {
                    let idx = match strings.iter().position(|s| s == cell) {
                        Some(idx) => idx,
                        None => {
                            strings.push(cell.to_string());
                            strings.len() - 1
                        }
                    };
                    data.push_str(&format!("<c r=\"{at}\" t=\"s\"><v>{idx}</v></c>"));
                }
            }
            data.push_str("</row>");
        }
        sheet_parts.push((
            format!("xl/worksheets/sheet{}.xml", i + 1),
            format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?><worksheet xmlns=\"{MAIN_NS}\"><sheetData>{data}</sheetData></worksheet>"),
        ));
    }

    let mut overrides = String::from(
        "<Override PartName=\"/xl/workbook.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml\"/>\
         <Override PartName=\"/xl/sharedStrings.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml\"/>",
    );
    let mut sheet_list = String::new();
    let mut rels = String::new();
    for (i, sheet) in sheets.iter().enumerate() {
        let n = i + 1;
        overrides.push_str(&format!(
            "<Override PartName=\"/xl/worksheets/sheet{n}.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml\"/>"
        ));
        sheet_list.push_str(&format!(
            "<sheet name=\"{}\" sheetId=\"{n}\" r:id=\"rId{n}\"/>",
            xml_escape(sheet.name)
        ));
        rels.push_str(&format!(
            "<Relationship Id=\"rId{n}\" Type=\"{REL_NS}/worksheet\" Target=\"worksheets/sheet{n}.xml\"/>"
        ));
    }
    rels.push_str(&format!(
        "<Relationship Id=\"rId{}\" Type=\"{REL_NS}/sharedStrings\" Target=\"sharedStrings.xml\"/>",
        sheets.len() + 1
    ));
    let shared: String = strings
        .iter()
        .map(|s| format!("<si><t>{}</t></si>", xml_escape(s)))
        .collect();

    let mut parts = vec![
        (
            "[Content_Types].xml".to_string(),
            format!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
                 <Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
                 <Default Extension=\"xml\" ContentType=\"application/xml\"/>{overrides}</Types>"
            ),
        ),
        (
            "_rels/.rels".to_string(),
            format!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Relationships xmlns=\"{PKG_REL_NS}\">\
                 <Relationship Id=\"rId1\" Type=\"{REL_NS}/officeDocument\" Target=\"xl/workbook.xml\"/></Relationships>"
            ),
        ),
        (
            "xl/workbook.xml".to_string(),
            format!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?><workbook xmlns=\"{MAIN_NS}\" xmlns:r=\"{REL_NS}\"><sheets>{sheet_list}</sheets></workbook>"
            ),
        ),
        (
            "xl/_rels/workbook.xml.rels".to_string(),
            format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?><Relationships xmlns=\"{PKG_REL_NS}\">{rels}</Relationships>"),
        ),
        (
            "xl/sharedStrings.xml".to_string(),
            format!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?><sst xmlns=\"{MAIN_NS}\" count=\"{n}\" uniqueCount=\"{n}\">{shared}</sst>",
                n = strings.len()
            ),
        ),
    ];
    parts.extend(sheet_parts);

    let path = dir.join(name);
    let mut zip = ZipWriter::new(fs::File::create(&path).expect("create workbook"));
    for (part, body) in parts {
        zip.start_file(part, FileOptions::<()>::default())
            .expect("start workbook part");
        zip.write_all(body.as_bytes()).expect("write workbook part");
    }
    zip.finish().expect("finish workbook");
    path
}
