//! Name normalization and de-duplication for tables and columns.

use std::collections::HashSet;

/// Spaces and hyphens become underscores; surrounding whitespace is dropped.
pub fn normalize_table_name(raw: &str) -> String {
    raw.trim().replace([' ', '-'], "_")
}

/// Make `names` unique by suffixing `_2`, `_3`, ... onto repeats.
/// Empty names become `column_{position}` (1-based).
pub fn dedupe_names<I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();
    for (idx, name) in names.into_iter().enumerate() {
        let base = if name.trim().is_empty() {
            format!("column_{}", idx + 1)
        } else {
            name
        };
        let mut candidate = base.clone();
        let mut n = 2;
        while seen.contains(&candidate) {
            candidate = format!("{base}_{n}");
            n += 1;
        }
        seen.insert(candidate.clone());
        out.push(candidate);
    }
    out
}
