//! Trigram index over text columns.
//!
//! For every indexed column, each distinct lowercase 3-character window of
//! a cell maps to the set of rows containing it. A needle of three or more
//! characters can only occur in rows holding all of its trigrams, so the
//! intersection of those sets bounds the rows that need a real substring
//! check. Shorter needles get no pruning.

use std::collections::{HashMap, HashSet};

use roaring::RoaringBitmap;

use tabseek_core::schema::DataType;
use tabseek_core::text::Needle;
use tabseek_core::types::{ColumnData, Table};

type Trigram = u64;

fn pack(a: char, b: char, c: char) -> Trigram {
    ((a as u64) << 42) | ((b as u64) << 21) | (c as u64)
}

fn trigrams(lowered: &str) -> impl Iterator<Item = Trigram> + '_ {
    let chars: Vec<char> = lowered.chars().collect();
    (0..chars.len().saturating_sub(2)).map(move |i| pack(chars[i], chars[i + 1], chars[i + 2]))
}

#[derive(Debug, Default)]
struct ColumnIndex {
    grams: HashMap<Trigram, RoaringBitmap>,
}

impl ColumnIndex {
    fn build(data: &ColumnData) -> Self {
        let mut grams: HashMap<Trigram, RoaringBitmap> = HashMap::new();
        let mut seen = HashSet::new();
        for row in 0..data.len() {
            let Some(text) = data.text(row) else { continue };
            seen.clear();
            for g in trigrams(&text.to_lowercase()) {
                if seen.insert(g) {
                    grams.entry(g).or_default().insert(row as u32);
                }
            }
        }
        Self { grams }
    }

    fn candidates(&self, needle: &Needle) -> RoaringBitmap {
        let mut acc: Option<RoaringBitmap> = None;
        for g in trigrams(needle.as_str()) {
            let Some(rows) = self.grams.get(&g) else {
                return RoaringBitmap::new();
            };
            acc = Some(match acc {
                None => rows.clone(),
                Some(a) => a & rows,
            });
            if acc.as_ref().is_some_and(RoaringBitmap::is_empty) {
                break;
            }
        }
        acc.unwrap_or_default()
    }
}

/// Per-table index. Columns are addressed by position.
#[derive(Debug, Default)]
pub struct SearchIndex {
    columns: Vec<Option<ColumnIndex>>,
}

impl SearchIndex {
    /// Index the text columns of `table`. Categorical columns whose
    /// dictionary is smaller than `min_distinct` are left out: searching
    /// them already costs one pass over the dictionary.
    pub fn build(table: &Table, min_distinct: usize) -> Self {
        if table.row_count() > u32::MAX as usize {
            return Self::default();
        }
        let columns = table
            .columns()
            .iter()
            .map(|col| match (&col.data, col.data_type()) {
                (ColumnData::Categorical(c), _) if c.dictionary().len() < min_distinct => None,
                (data, DataType::Utf8 | DataType::Categorical) => Some(ColumnIndex::build(data)),
                _ => None,
            })
            .collect();
        let index = Self { columns };
        tracing::debug!(
            table = table.name(),
            indexed = index.indexed_columns(),
            "search index built"
        );
        index
    }

    pub fn indexed_columns(&self) -> usize {
        self.columns.iter().filter(|c| c.is_some()).count()
    }

    pub fn is_indexed(&self, column: usize) -> bool {
        matches!(self.columns.get(column), Some(Some(_)))
    }

    /// Rows of `column` that may contain `needle`, or `None` when the
    /// column is not indexed or the needle is too short to prune.
    pub fn candidates(&self, column: usize, needle: &Needle) -> Option<RoaringBitmap> {
        let idx = self.columns.get(column)?.as_ref()?;
        if needle.char_len() < 3 {
            return None;
        }
        Some(idx.candidates(needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabseek_core::types::{Categorical, Column};

    fn table() -> Table {
        Table::new(
            "t",
            vec![
                Column::new(
                    "name",
                    ColumnData::Utf8(vec![
                        Some("Apple Pie".into()),
                        Some("banana".into()),
                        None,
                        Some("pineapple".into()),
                    ]),
                ),
                Column::new("n", ColumnData::Int8(vec![Some(1), Some(2), Some(3), Some(4)])),
                Column::new(
                    "kind",
                    ColumnData::Categorical(Categorical::encode(
                        [Some("a"), Some("a"), Some("b"), Some("a")].into_iter(),
                    )),
                ),
            ],
        )
        .unwrap()
    }

    #[test]
    fn prunes_to_rows_holding_every_trigram() {
        let idx = SearchIndex::build(&table(), 64);
        assert!(idx.is_indexed(0));
        assert!(!idx.is_indexed(1));
        assert!(!idx.is_indexed(2));
        let rows = idx.candidates(0, &Needle::new("APPLE").unwrap()).unwrap();
        assert_eq!(rows.iter().collect::<Vec<_>>(), vec![0, 3]);
        let none = idx.candidates(0, &Needle::new("zzz").unwrap()).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn short_needles_are_not_pruned() {
        let idx = SearchIndex::build(&table(), 64);
        assert!(idx.candidates(0, &Needle::new("an").unwrap()).is_none());
    }

    #[test]
    fn high_cardinality_categoricals_are_indexed() {
        let idx = SearchIndex::build(&table(), 2);
        assert!(idx.is_indexed(2));
    }
}
