//! Column-name canonicalization.
//!
//! Names are trimmed, internal whitespace runs collapse to `_`, special
//! characters are optionally stripped, a case transform is applied, and
//! collisions are resolved left-to-right with `_<n>` suffixes. The whole
//! transform is idempotent, so normalizing an already-normalized table is
//! a no-op.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::frame::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[value(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NameCase {
    Upper,
    Lower,
    Title,
    None,
}

/// Normalizes every column name of `table`, returning a new table.
pub fn normalize_names(table: &Table, case: NameCase, strip_special: bool) -> Table {
    let normalized = table
        .column_names()
        .iter()
        .map(|name| normalize_name(name, case, strip_special))
        .collect();
    table.clone().with_names(dedupe_names(normalized))
}

/// Single-name transform: trim, collapse whitespace to `_`, optional
/// `[^A-Za-z0-9_]` strip, then the case transform.
pub fn normalize_name(name: &str, case: NameCase, strip_special: bool) -> String {
    let mut result = name.split_whitespace().collect::<Vec<_>>().join("_");
    if strip_special {
        result.retain(|ch| ch.is_ascii_alphanumeric() || ch == '_');
    }
    match case {
        NameCase::Upper => result.to_uppercase(),
        NameCase::Lower => result.to_lowercase(),
        NameCase::Title => result
            .split('_')
            .map(capitalize)
            .collect::<Vec<_>>()
            .join("_"),
        NameCase::None => result,
    }
}

fn capitalize(part: &str) -> String {
    let mut chars = part.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Resolves name collisions left-to-right: the first occurrence keeps the
/// bare name, repeats get `_<n>` where `n` counts occurrences seen so far,
/// bumped further if the suffixed candidate is itself already taken.
pub fn dedupe_names(names: Vec<String>) -> Vec<String> {
    let mut emitted: Vec<String> = Vec::with_capacity(names.len());
    let mut seen: Vec<(String, usize)> = Vec::new();
    for name in names {
        let count = match seen.iter_mut().find(|(base, _)| *base == name) {
            Some(entry) => {
                entry.1 += 1;
                entry.1
            }
            None => {
                seen.push((name.clone(), 0));
                0
            }
        };
        let mut suffix = count;
        let mut candidate = if suffix == 0 {
            name.clone()
        } else {
            format!("{name}_{suffix}")
        };
        while emitted.contains(&candidate) {
            suffix += 1;
            candidate = format!("{name}_{suffix}");
        }
        emitted.push(candidate);
    }
    emitted
}
