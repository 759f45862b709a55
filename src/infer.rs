//! Advisory column-type inference.
//!
//! Classifies each column from its first non-missing value. The result is
//! metadata for pipeline-job authors and summary reporting; it never
//! mutates cell values.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::frame::Table;

static NUMERIC_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d+(\.\d+)?$").expect("numeric pattern"));
static DATE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}").expect("date pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Unknown,
    Numeric,
    Date,
    Text,
}

/// Classifies every column, in column order.
pub fn infer(table: &Table) -> Vec<(String, ColumnKind)> {
    table
        .columns()
        .iter()
        .map(|column| {
            let sample = column.cells.iter().find(|cell| !cell.is_missing());
            let kind = match sample {
                None => ColumnKind::Unknown,
                Some(cell) => classify(&cell.as_display()),
            };
            (column.name.clone(), kind)
        })
        .collect()
}

fn classify(sample: &str) -> ColumnKind {
    if NUMERIC_PATTERN.is_match(sample) {
        ColumnKind::Numeric
    } else if DATE_PATTERN.is_match(sample) {
        ColumnKind::Date
    } else {
        ColumnKind::Text
    }
}
