//! Combine engine: row concatenation and key-based relational merge.
//!
//! `concat` stacks rows over the union of the inputs' columns, filling
//! absent columns with `Null`. `merge` performs an inner equality join on
//! trimmed key text, with a hash lookup built from the right table and
//! left-major, right-minor output order.

use std::collections::HashMap;

use anyhow::{Context, Result};
use itertools::Itertools;
use log::info;

use crate::{
    cli::{CombineArgs, CombineMethod},
    error::EngineError,
    export,
    frame::{Cell, Column, Table},
    ingest::{self, ResolveOptions, SpreadsheetSupport},
    io_utils,
};

const KEY_SEPARATOR: &str = "\u{1f}";
pub const MERGE_SUFFIXES: (&str, &str) = ("_L", "_R");

/// Stacks `tables` into one. Aliases rename columns before the optional
/// uppercase normalization; the output column set is the union across
/// inputs in first-seen order.
pub fn concat(
    tables: &[Table],
    uppercase_names: bool,
    alias_map: Option<&HashMap<String, String>>,
) -> Result<Table, EngineError> {
    if tables.is_empty() {
        return Err(EngineError::Configuration(
            "concat requires at least one input table".to_string(),
        ));
    }

    let renamed: Vec<Table> = tables
        .iter()
        .map(|table| rename_for_concat(table, uppercase_names, alias_map))
        .collect::<Result<_, _>>()?;

    let names: Vec<String> = renamed
        .iter()
        .flat_map(Table::column_names)
        .unique()
        .collect();

    let mut columns: Vec<Column> = names
        .iter()
        .map(|name| Column::new(name.clone(), Vec::new()))
        .collect();
    for table in &renamed {
        let rows = table.n_rows();
        for (idx, name) in names.iter().enumerate() {
            match table.column(name) {
                Some(column) => columns[idx].cells.extend(column.cells.iter().cloned()),
                None => columns[idx]
                    .cells
                    .extend(std::iter::repeat_n(Cell::Null, rows)),
            }
        }
    }

    Table::from_columns(columns)
}

fn rename_for_concat(
    table: &Table,
    uppercase_names: bool,
    alias_map: Option<&HashMap<String, String>>,
) -> Result<Table, EngineError> {
    let names: Vec<String> = table
        .column_names()
        .into_iter()
        .map(|name| {
            let aliased = alias_map
                .and_then(|aliases| aliases.get(&name).cloned())
                .unwrap_or(name);
            if uppercase_names {
                aliased.trim().to_uppercase()
            } else {
                aliased
            }
        })
        .collect();

    let mut seen = std::collections::HashSet::new();
    for name in &names {
        if !seen.insert(name.as_str()) {
            return Err(EngineError::Configuration(format!(
                "column renaming produced duplicate name '{name}'"
            )));
        }
    }
    Ok(table.clone().with_names(names))
}

/// Inner equality join on every key column simultaneously. Key columns
/// absent from a side are created there as entirely-Null; key values are
/// compared as trimmed text.
pub fn merge(
    left: &Table,
    right: &Table,
    on: &[String],
    suffixes: (&str, &str),
) -> Result<Table, EngineError> {
    if on.is_empty() {
        return Err(EngineError::Configuration("missing join keys".to_string()));
    }

    let left = ensure_key_columns(left, on);
    let right = ensure_key_columns(right, on);

    let mut right_lookup: HashMap<String, Vec<usize>> = HashMap::new();
    for row in 0..right.n_rows() {
        right_lookup
            .entry(row_key(&right, row, on))
            .or_default()
            .push(row);
    }

    // Left-major, right-minor row pairing.
    let mut pairs: Vec<(usize, usize)> = Vec::new();
    for left_row in 0..left.n_rows() {
        if let Some(bucket) = right_lookup.get(&row_key(&left, left_row, on)) {
            for &right_row in bucket {
                pairs.push((left_row, right_row));
            }
        }
    }

    let right_names = right.column_names();
    let left_names = left.column_names();
    let mut columns: Vec<Column> = Vec::new();

    for column in left.columns() {
        let name = if on.contains(&column.name) {
            column.name.clone()
        } else if right_names.contains(&column.name) {
            format!("{}{}", column.name, suffixes.0)
        } else {
            column.name.clone()
        };
        let cells = pairs
            .iter()
            .map(|(left_row, _)| column.cells[*left_row].clone())
            .collect();
        columns.push(Column::new(name, cells));
    }

    for column in right.columns() {
        if on.contains(&column.name) {
            continue;
        }
        let name = if left_names.contains(&column.name) {
            format!("{}{}", column.name, suffixes.1)
        } else {
            column.name.clone()
        };
        let cells = pairs
            .iter()
            .map(|(_, right_row)| column.cells[*right_row].clone())
            .collect();
        columns.push(Column::new(name, cells));
    }

    Table::from_columns(columns)
}

fn ensure_key_columns(table: &Table, on: &[String]) -> Table {
    let mut columns: Vec<Column> = table.columns().to_vec();
    let rows = table.n_rows();
    for key in on {
        if !columns.iter().any(|column| &column.name == key) {
            columns.push(Column::new(key.clone(), vec![Cell::Null; rows]));
        }
    }
    Table::from_columns_unchecked(columns)
}

fn row_key(table: &Table, row: usize, on: &[String]) -> String {
    on.iter()
        .map(|key| {
            table
                .cell(row, key)
                .map(|cell| cell.as_display().trim().to_string())
                .unwrap_or_default()
        })
        .collect::<Vec<_>>()
        .join(KEY_SEPARATOR)
}

/// CLI entry: resolve each input and concat or merge.
pub fn execute(args: &CombineArgs) -> Result<()> {
    let mut tables = Vec::with_capacity(args.inputs.len());
    for input in &args.inputs {
        let bytes = io_utils::read_input_bytes(input)?;
        let filename = input
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        let resolved = ingest::resolve(
            &bytes,
            &filename,
            &ResolveOptions {
                separator: args.separator,
                encoding: args.encoding.clone(),
                ..ResolveOptions::default()
            },
            &SpreadsheetSupport::default(),
        )
        .with_context(|| format!("Resolving {input:?}"))?;
        tables.push(resolved.table);
    }

    let combined = match args.method {
        CombineMethod::Concat => concat(&tables, args.uppercase, None)?,
        CombineMethod::Merge => {
            if tables.len() != 2 {
                return Err(EngineError::Configuration(
                    "merge requires exactly two inputs".to_string(),
                )
                .into());
            }
            merge(&tables[0], &tables[1], &args.on, MERGE_SUFFIXES)?
        }
    };

    export::export(&combined, &args.output, args.format)?;
    info!(
        "Combined {} input(s) into {} row(s) x {} column(s)",
        args.inputs.len(),
        combined.n_rows(),
        combined.n_cols()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Column, Table};

    fn table(columns: Vec<Column>) -> Table {
        Table::from_columns(columns).unwrap()
    }

    #[test]
    fn concat_unions_columns_and_fills_null() {
        let first = table(vec![Column::from_raw("a", &["1", "2"])]);
        let second = table(vec![
            Column::from_raw("a", &["3"]),
            Column::from_raw("b", &["x"]),
        ]);
        let combined = concat(&[first, second], false, None).unwrap();
        assert_eq!(combined.column_names(), vec!["a", "b"]);
        assert_eq!(combined.n_rows(), 3);
        assert_eq!(combined.cell(0, "b"), Some(&Cell::Null));
        assert_eq!(combined.cell(2, "b"), Some(&Cell::Text("x".to_string())));
    }

    #[test]
    fn concat_uppercases_after_aliasing() {
        let first = table(vec![Column::from_raw("qty", &["1"])]);
        let second = table(vec![Column::from_raw("quantity", &["2"])]);
        let aliases: HashMap<String, String> =
            [("quantity".to_string(), "qty".to_string())].into();
        let combined = concat(&[first, second], true, Some(&aliases)).unwrap();
        assert_eq!(combined.column_names(), vec!["QTY"]);
        assert_eq!(combined.n_rows(), 2);
    }

    #[test]
    fn merge_inner_joins_on_trimmed_text_keys() {
        let left = table(vec![Column::from_raw("ID", &["1", "2"])]);
        let right = table(vec![
            Column::from_raw("ID", &["2 ", "3"]),
            Column::from_raw("V", &["9", "8"]),
        ]);
        let merged = merge(&left, &right, &["ID".to_string()], MERGE_SUFFIXES).unwrap();
        assert_eq!(merged.n_rows(), 1);
        assert_eq!(merged.cell(0, "ID"), Some(&Cell::Text("2".to_string())));
        assert_eq!(merged.cell(0, "V"), Some(&Cell::Text("9".to_string())));
    }

    #[test]
    fn merge_without_keys_is_a_configuration_error() {
        let left = table(vec![Column::from_raw("a", &["1"])]);
        let right = table(vec![Column::from_raw("a", &["1"])]);
        assert!(matches!(
            merge(&left, &right, &[], MERGE_SUFFIXES),
            Err(EngineError::Configuration(_))
        ));
    }

    #[test]
    fn merge_creates_missing_key_columns_as_null() {
        let left = table(vec![Column::from_raw("ID", &["1"])]);
        let right = table(vec![Column::from_raw("V", &["9"])]);
        let merged = merge(&left, &right, &["ID".to_string()], MERGE_SUFFIXES).unwrap();
        // Right side key is all-Null, so no trimmed-text key matches "1".
        assert_eq!(merged.n_rows(), 0);
        assert_eq!(merged.column_names(), vec!["ID", "V"]);
    }

    #[test]
    fn merge_suffixes_colliding_non_key_columns() {
        let left = table(vec![
            Column::from_raw("ID", &["1"]),
            Column::from_raw("V", &["a"]),
        ]);
        let right = table(vec![
            Column::from_raw("ID", &["1"]),
            Column::from_raw("V", &["b"]),
        ]);
        let merged = merge(&left, &right, &["ID".to_string()], MERGE_SUFFIXES).unwrap();
        assert_eq!(merged.column_names(), vec!["ID", "V_L", "V_R"]);
        assert_eq!(merged.n_rows(), 1);
    }

    #[test]
    fn merge_emits_left_major_right_minor_order() {
        let left = table(vec![
            Column::from_raw("k", &["a", "b"]),
            Column::from_raw("l", &["1", "2"]),
        ]);
        let right = table(vec![
            Column::from_raw("k", &["b", "a", "a"]),
            Column::from_raw("r", &["x", "y", "z"]),
        ]);
        let merged = merge(&left, &right, &["k".to_string()], MERGE_SUFFIXES).unwrap();
        let keys: Vec<String> = (0..merged.n_rows())
            .map(|row| merged.cell(row, "k").unwrap().as_display())
            .collect();
        let rights: Vec<String> = (0..merged.n_rows())
            .map(|row| merged.cell(row, "r").unwrap().as_display())
            .collect();
        assert_eq!(keys, vec!["a", "a", "b"]);
        assert_eq!(rights, vec!["y", "z", "x"]);
    }
}
