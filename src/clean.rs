//! Cell-level cleaning and row de-duplication.
//!
//! Complements the column-name normalizer: trims text cells, collapses
//! the heterogeneous missing markers into canonical `Null`, and drops
//! duplicate rows with a configurable keep rule.

use anyhow::Result;
use clap::ValueEnum;
use log::info;

use crate::{
    cli::CleanArgs,
    columns,
    error::EngineError,
    export,
    frame::{Cell, Column, Table},
    ingest::{self, ResolveOptions, SpreadsheetSupport},
    io_utils,
};

const ROW_KEY_SEPARATOR: &str = "\u{1f}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lowercase")]
pub enum KeepRule {
    First,
    Last,
}

/// Trims text cells and/or converts missing markers to canonical `Null`.
pub fn clean_cells(table: &Table, strip_whitespace: bool, normalize_missing: bool) -> Table {
    let columns = table
        .columns()
        .iter()
        .map(|column| {
            let cells = column
                .cells
                .iter()
                .map(|cell| clean_cell(cell, strip_whitespace, normalize_missing))
                .collect();
            Column::new(column.name.clone(), cells)
        })
        .collect();
    Table::from_columns_unchecked(columns)
}

fn clean_cell(cell: &Cell, strip_whitespace: bool, normalize_missing: bool) -> Cell {
    let cell = match cell {
        Cell::Text(text) if strip_whitespace => Cell::Text(text.trim().to_string()),
        other => other.clone(),
    };
    if normalize_missing && cell.is_missing() {
        Cell::Null
    } else {
        cell
    }
}

/// Removes duplicate rows, comparing the display form of `subset` columns
/// (all columns when unset).
pub fn dedup_rows(
    table: &Table,
    subset: Option<&[String]>,
    keep: KeepRule,
) -> Result<Table, EngineError> {
    let key_columns: Vec<&Column> = match subset {
        None => table.columns().iter().collect(),
        Some(names) => names
            .iter()
            .map(|name| {
                table.column(name).ok_or_else(|| {
                    EngineError::Configuration(format!(
                        "dedup subset column '{name}' does not exist"
                    ))
                })
            })
            .collect::<Result<_, _>>()?,
    };

    let keys: Vec<String> = (0..table.n_rows())
        .map(|row| {
            key_columns
                .iter()
                .map(|column| column.cells[row].as_display())
                .collect::<Vec<_>>()
                .join(ROW_KEY_SEPARATOR)
        })
        .collect();

    let mut kept = vec![false; table.n_rows()];
    let mut seen = std::collections::HashSet::new();
    match keep {
        KeepRule::First => {
            for (row, key) in keys.iter().enumerate() {
                if seen.insert(key.as_str()) {
                    kept[row] = true;
                }
            }
        }
        KeepRule::Last => {
            for (row, key) in keys.iter().enumerate().rev() {
                if seen.insert(key.as_str()) {
                    kept[row] = true;
                }
            }
        }
    }

    let columns = table
        .columns()
        .iter()
        .map(|column| {
            let cells = column
                .cells
                .iter()
                .zip(&kept)
                .filter(|(_, keep)| **keep)
                .map(|(cell, _)| cell.clone())
                .collect();
            Column::new(column.name.clone(), cells)
        })
        .collect();
    Table::from_columns(columns)
}

/// CLI entry: normalize names, clean cells, optionally de-duplicate.
pub fn execute(args: &CleanArgs) -> Result<()> {
    let bytes = io_utils::read_input_bytes(&args.input)?;
    let filename = args
        .input
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
    )?;

    let original_rows = resolved.table.n_rows();
    let mut table = columns::normalize_names(&resolved.table, args.case, !args.keep_special);
    table = clean_cells(&table, true, true);
    if args.dedup {
        table = dedup_rows(&table, None, args.keep)?;
    }
    let removed = original_rows - table.n_rows();

    export::export(&table, &args.output, args.format)?;
    info!(
        "Cleaned {:?}: {} row(s) kept, {} duplicate(s) removed",
        args.input,
        table.n_rows(),
        removed
    );
    Ok(())
}
