//! Substring search over one in-memory table.
//!
//! A row matches when any column's canonical text contains the term,
//! case-insensitively. Rows come back in source order, at most `limit`.

use roaring::RoaringBitmap;

use tabseek_core::schema::DataType;
use tabseek_core::text::Needle;
use tabseek_core::types::{ColumnData, Table};

use crate::index::SearchIndex;

const INT_ALPHABET: &str = "0123456789-";
const FLOAT_ALPHABET: &str = "0123456789-.nafi";
const BOOL_ALPHABET: &str = "truefals";
const DATETIME_ALPHABET: &str = "0123456789-: .";

/// Matching rows of one table.
#[derive(Debug, Clone)]
pub struct LocalResult {
    /// The matched rows, same columns as the searched table.
    pub rows: Table,
    /// Source positions of `rows`, ascending.
    pub row_indices: Vec<usize>,
    /// More rows matched than `limit` allowed.
    pub truncated: bool,
}

impl LocalResult {
    pub fn empty(table: &Table) -> Self {
        Self {
            rows: table.take(&[]),
            row_indices: Vec::new(),
            truncated: false,
        }
    }

    pub fn match_count(&self) -> usize {
        self.row_indices.len()
    }
}

/// Search `table` for `term`. A blank term matches nothing.
pub fn search_table(
    table: &Table,
    term: &str,
    limit: usize,
    index: Option<&SearchIndex>,
) -> LocalResult {
    let Some(needle) = Needle::new(term) else {
        return LocalResult::empty(table);
    };
    let (row_indices, truncated) = find_rows(table, &needle, limit, index);
    LocalResult {
        rows: table.take(&row_indices),
        row_indices,
        truncated,
    }
}

enum Probe<'a> {
    Text {
        data: &'a ColumnData,
        candidates: Option<RoaringBitmap>,
    },
    Dictionary {
        codes: &'a [Option<u32>],
        hits: Vec<bool>,
    },
}

impl Probe<'_> {
    fn hit(&self, needle: &Needle, row: usize) -> bool {
        match self {
            Probe::Text { data, candidates } => {
                if let Some(c) = candidates {
                    if !c.contains(row as u32) {
                        return false;
                    }
                }
                data.text(row).is_some_and(|t| needle.matches_text(&t))
            }
            Probe::Dictionary { codes, hits } => codes
                .get(row)
                .copied()
                .flatten()
                .is_some_and(|c| hits[c as usize]),
        }
    }

    /// Every row this probe could hit, when that set is known without a scan
    /// of the cells.
    fn bounded_rows(&self) -> Option<RoaringBitmap> {
        match self {
            Probe::Text { candidates, .. } => candidates.clone(),
            Probe::Dictionary { codes, hits } => Some(
                codes
                    .iter()
                    .enumerate()
                    .filter(|(_, c)| c.is_some_and(|c| hits[c as usize]))
                    .map(|(r, _)| r as u32)
                    .collect(),
            ),
        }
    }
}

fn alphabet(ty: DataType) -> Option<&'static str> {
    match ty {
        t if t.is_integer() => Some(INT_ALPHABET),
        t if t.is_float() => Some(FLOAT_ALPHABET),
        DataType::Boolean => Some(BOOL_ALPHABET),
        DataType::DateTime => Some(DATETIME_ALPHABET),
        _ => None,
    }
}

fn probes<'a>(table: &'a Table, needle: &Needle, index: Option<&SearchIndex>) -> Vec<Probe<'a>> {
    let mut out = Vec::new();
    for (pos, col) in table.columns().iter().enumerate() {
        if let Some(chars) = alphabet(col.data_type()) {
            if !needle.fits_alphabet(chars) {
                continue;
            }
        }
        let candidates = index.and_then(|idx| idx.candidates(pos, needle));
        match &col.data {
            ColumnData::Categorical(cat) if candidates.is_none() => {
                let hits: Vec<bool> = cat
                    .dictionary()
                    .iter()
                    .map(|v| needle.matches_text(v))
                    .collect();
                if hits.iter().any(|&h| h) {
                    out.push(Probe::Dictionary {
                        codes: cat.codes(),
                        hits,
                    });
                }
            }
            data => {
                if candidates.as_ref().is_some_and(RoaringBitmap::is_empty) {
                    continue;
                }
                out.push(Probe::Text { data, candidates });
            }
        }
    }
    out
}

/// Ascending matching row positions, at most `limit`, plus whether more
/// rows matched.
pub fn find_rows(
    table: &Table,
    needle: &Needle,
    limit: usize,
    index: Option<&SearchIndex>,
) -> (Vec<usize>, bool) {
    let probes = probes(table, needle, index);
    let mut rows = Vec::new();
    if probes.is_empty() {
        return (rows, false);
    }

    let bounded: Option<Vec<RoaringBitmap>> = probes.iter().map(Probe::bounded_rows).collect();
    let mut visit = |row: usize| -> bool {
        if probes.iter().any(|p| p.hit(needle, row)) {
            if rows.len() == limit {
                return false;
            }
            rows.push(row);
        }
        true
    };

    let mut truncated = false;
    match bounded {
        Some(sets) => {
            let union = sets.into_iter().fold(RoaringBitmap::new(), |acc, s| acc | s);
            for row in union.iter() {
                if !visit(row as usize) {
                    truncated = true;
                    break;
                }
            }
        }
        None => {
            for row in 0..table.row_count() {
                if !visit(row) {
                    truncated = true;
                    break;
                }
            }
        }
    }
    (rows, truncated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabseek_core::text::parse_datetime;
    use tabseek_core::types::{Categorical, Column};

    fn people() -> Table {
        Table::new(
            "people",
            vec![
                Column::new("id", ColumnData::Int8(vec![Some(1), Some(2), Some(3)])),
                Column::new(
                    "name",
                    ColumnData::Utf8(vec![
                        Some("Alice".into()),
                        Some("Bob".into()),
                        Some("Carol".into()),
                    ]),
                ),
                Column::new("age", ColumnData::Int8(vec![Some(30), Some(25), Some(30)])),
            ],
        )
        .unwrap()
    }

    fn mixed() -> Table {
        Table::new(
            "mixed",
            vec![
                Column::new(
                    "city",
                    ColumnData::Categorical(Categorical::encode(
                        [Some("Oslo"), Some("Lisbon"), Some("Oslo"), None].into_iter(),
                    )),
                ),
                Column::new(
                    "price",
                    ColumnData::Float32(vec![Some(2.5), Some(30.0), None, Some(0.25)]),
                ),
                Column::new(
                    "seen",
                    ColumnData::DateTime(vec![
                        parse_datetime("2024-03-01"),
                        None,
                        parse_datetime("2023-12-31 23:59:00"),
                        None,
                    ]),
                ),
                Column::new(
                    "ok",
                    ColumnData::Boolean(vec![Some(true), Some(false), None, Some(true)]),
                ),
            ],
        )
        .unwrap()
    }

    /// Reference: every row whose rendered cells contain the term.
    fn brute(table: &Table, term: &str) -> Vec<usize> {
        let needle = Needle::new(term).unwrap();
        (0..table.row_count())
            .filter(|&r| table.row(r).iter().any(|v| needle.matches(v)))
            .collect()
    }

    #[test]
    fn finds_rows_matching_numeric_text() {
        let res = search_table(&people(), "30", 1000, None);
        assert_eq!(res.row_indices, vec![0, 2]);
        assert_eq!(res.rows.row_count(), 2);
        assert_eq!(res.match_count(), 2);
        assert!(!res.truncated);
    }

    #[test]
    fn blank_term_is_empty_not_an_error() {
        for term in ["", "   "] {
            let res = search_table(&people(), term, 1000, None);
            assert_eq!(res.match_count(), 0);
            assert_eq!(res.rows.num_columns(), 3);
        }
    }

    #[test]
    fn limit_caps_and_flags_truncation() {
        for k in 0..4 {
            let res = search_table(&people(), "o", k, None);
            assert!(res.match_count() <= k);
            assert_eq!(res.truncated, k < 2);
        }
    }

    #[test]
    fn matches_reference_scan_with_and_without_index() {
        let tables = [people(), mixed()];
        let terms = [
            "a", "30", "30.0", "OSL", "lis", "2024", "03-01", "23:59", "tru", "fal", "0.25",
            ".5", "-", "zzz", "bo",
        ];
        for table in &tables {
            let index = SearchIndex::build(table, 1);
            for term in terms {
                let expect = brute(table, term);
                let (plain, _) = find_rows(table, &Needle::new(term).unwrap(), usize::MAX, None);
                let (fast, _) =
                    find_rows(table, &Needle::new(term).unwrap(), usize::MAX, Some(&index));
                assert_eq!(plain, expect, "{} / {term}", table.name());
                assert_eq!(fast, expect, "{} / {term} (indexed)", table.name());
            }
        }
    }
}
