//! Diff engine: aligns two tables, computes cell-level deltas, and
//! renders highlighted workbook artifacts.
//!
//! Two output modes share one comparison heuristic: numeric comparison
//! first, lexical comparison when either side fails to parse. Iteration
//! is column-then-row, so repeated runs over identical inputs produce
//! identical artifacts. Each mapping entry is processed independently;
//! one failed write never blocks the rest.

use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::ValueEnum;
use itertools::Itertools;
use log::{error, info};
use rust_xlsxwriter::{Color, Format, Workbook, Worksheet, XlsxError};
use serde::{Deserialize, Serialize};

use crate::{
    cli::DiffArgs,
    error::EngineError,
    frame::{Cell, Table},
    ingest::{self, ResolveOptions, SpreadsheetSupport},
    io_utils,
};

/// Fill colors for increased and decreased values.
const UP_COLOR: u32 = 0xFFFF00;
const DOWN_COLOR: u32 = 0x00FF00;

const SUMMARY_SHEET: &str = "Diff Summary";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    Up,
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "Up"),
            Direction::Down => write!(f, "Down"),
        }
    }
}

/// One detected cell-level change between two aligned tables.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffRecord {
    /// 0-based data row.
    pub row_index: usize,
    pub column_name: String,
    pub old_value: String,
    pub new_value: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiffMapping {
    pub label_a: String,
    pub label_b: String,
    pub output_path: PathBuf,
    /// Explicit column subset; unset compares the full column universe.
    #[serde(default)]
    pub columns: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lowercase")]
pub enum DiffMode {
    Highlight,
    Report,
}

/// Parses a JSON mapping list, rejecting structural problems up front.
pub fn parse_mappings(json: &str) -> Result<Vec<DiffMapping>, EngineError> {
    let mappings: Vec<DiffMapping> = serde_json::from_str(json)
        .map_err(|e| EngineError::Configuration(format!("invalid mapping list: {e}")))?;
    if mappings.is_empty() {
        return Err(EngineError::Configuration(
            "mapping list is empty".to_string(),
        ));
    }
    let mut paths = std::collections::HashSet::new();
    for (index, mapping) in mappings.iter().enumerate() {
        if mapping.label_a.is_empty() || mapping.label_b.is_empty() {
            return Err(EngineError::Configuration(format!(
                "mapping {index}: labels must be non-empty"
            )));
        }
        if mapping.label_a == mapping.label_b {
            return Err(EngineError::Configuration(format!(
                "mapping {index}: labels must differ"
            )));
        }
        if !paths.insert(mapping.output_path.clone()) {
            return Err(EngineError::Configuration(format!(
                "mapping {index}: duplicate output path {:?}",
                mapping.output_path
            )));
        }
    }
    Ok(mappings)
}

/// Outcome of a single mapping entry; entries succeed or fail
/// independently of each other.
#[derive(Debug)]
pub struct MappingOutcome {
    pub path: PathBuf,
    pub result: Result<Vec<DiffRecord>, EngineError>,
}

pub fn run_mappings(
    table_a: &Table,
    table_b: &Table,
    mappings: &[DiffMapping],
    mode: DiffMode,
) -> Vec<MappingOutcome> {
    mappings
        .iter()
        .map(|mapping| {
            let result = match mode {
                DiffMode::Highlight => diff_highlight(table_a, table_b, mapping).map(|()| Vec::new()),
                DiffMode::Report => diff_report(table_a, table_b, mapping),
            };
            MappingOutcome {
                path: mapping.output_path.clone(),
                result,
            }
        })
        .collect()
}

/// Left-table column order extended with right-only columns at the end.
fn column_universe(table_a: &Table, table_b: &Table) -> Vec<String> {
    table_a
        .column_names()
        .into_iter()
        .chain(table_b.column_names())
        .unique()
        .collect()
}

fn validate_subset(
    table_a: &Table,
    table_b: &Table,
    subset: &[String],
) -> Result<(), EngineError> {
    for name in subset {
        if table_a.column(name).is_none() || table_b.column(name).is_none() {
            return Err(EngineError::ShapeMismatch(format!(
                "diff column '{name}' is not present in both tables"
            )));
        }
    }
    Ok(())
}

fn cells_equal(old: &Cell, new: &Cell) -> bool {
    match (old.as_f64(), new.as_f64()) {
        (Some(left), Some(right)) => left == right,
        _ => old.as_display() == new.as_display(),
    }
}

/// Numeric comparison first; lexical fallback when either side fails to
/// parse. `new <= old` is Down, otherwise Up.
fn direction_of(old: &Cell, new: &Cell) -> Direction {
    match (old.as_f64(), new.as_f64()) {
        (Some(left), Some(right)) => {
            if right > left {
                Direction::Up
            } else {
                Direction::Down
            }
        }
        _ => {
            if new.as_display() > old.as_display() {
                Direction::Up
            } else {
                Direction::Down
            }
        }
    }
}

fn fill_format(direction: Direction) -> Format {
    let color = match direction {
        Direction::Up => UP_COLOR,
        Direction::Down => DOWN_COLOR,
    };
    Format::new().set_background_color(Color::RGB(color))
}

/// Highlight mode: both tables stacked into one sheet behind a `Source`
/// label column, with differing B-block cells colored.
pub fn diff_highlight(
    table_a: &Table,
    table_b: &Table,
    mapping: &DiffMapping,
) -> Result<(), EngineError> {
    let universe = column_universe(table_a, table_b);
    let targets: Vec<String> = match &mapping.columns {
        Some(subset) => {
            validate_subset(table_a, table_b, subset)?;
            subset.clone()
        }
        None => universe.clone(),
    };

    let mut workbook = Workbook::new();
    write_highlight_sheet(&mut workbook, table_a, table_b, mapping, &universe, &targets)
        .map_err(|e| EngineError::artifact(&mapping.output_path, e))?;
    workbook
        .save(&mapping.output_path)
        .map_err(|e| EngineError::artifact(&mapping.output_path, e))?;
    Ok(())
}

fn write_highlight_sheet(
    workbook: &mut Workbook,
    table_a: &Table,
    table_b: &Table,
    mapping: &DiffMapping,
    universe: &[String],
    targets: &[String],
) -> Result<(), XlsxError> {
    let sheet = workbook.add_worksheet();
    sheet.set_name("Comparison")?;

    let up = fill_format(Direction::Up);
    let down = fill_format(Direction::Down);

    sheet.write_string(0, 0, "Source")?;
    for (idx, name) in universe.iter().enumerate() {
        sheet.write_string(0, idx as u16 + 1, name)?;
    }

    let a_rows = table_a.n_rows() as u32;
    for row in 0..table_a.n_rows() {
        let sheet_row = 1 + row as u32;
        sheet.write_string(sheet_row, 0, &mapping.label_a)?;
        for (idx, name) in universe.iter().enumerate() {
            let cell = table_a.cell(row, name).cloned().unwrap_or(Cell::Null);
            write_cell(sheet, sheet_row, idx as u16 + 1, &cell, None)?;
        }
    }
    for row in 0..table_b.n_rows() {
        let sheet_row = 1 + a_rows + row as u32;
        sheet.write_string(sheet_row, 0, &mapping.label_b)?;
        for (idx, name) in universe.iter().enumerate() {
            let new = table_b.cell(row, name).cloned().unwrap_or(Cell::Null);
            let format = if targets.contains(name) {
                // An absent A row counts as missing and always triggers
                // a changed highlight.
                let old = table_a.cell(row, name).cloned().unwrap_or(Cell::Null);
                let changed = row >= table_a.n_rows() || !cells_equal(&old, &new);
                if changed {
                    Some(match direction_of(&old, &new) {
                        Direction::Up => &up,
                        Direction::Down => &down,
                    })
                } else {
                    None
                }
            } else {
                None
            };
            write_cell(sheet, sheet_row, idx as u16 + 1, &new, format)?;
        }
    }
    Ok(())
}

/// Report mode: one sheet per table, changed cells colored on the B
/// sheet, plus a summary sheet when any records exist.
pub fn diff_report(
    table_a: &Table,
    table_b: &Table,
    mapping: &DiffMapping,
) -> Result<Vec<DiffRecord>, EngineError> {
    if table_a.n_rows() != table_b.n_rows() {
        return Err(EngineError::ShapeMismatch(format!(
            "row counts differ: {} vs {}",
            table_a.n_rows(),
            table_b.n_rows()
        )));
    }
    let targets: Vec<String> = match &mapping.columns {
        Some(subset) => {
            validate_subset(table_a, table_b, subset)?;
            subset.clone()
        }
        None => {
            let mut a_names = table_a.column_names();
            let mut b_names = table_b.column_names();
            a_names.sort();
            b_names.sort();
            if a_names != b_names {
                return Err(EngineError::ShapeMismatch(
                    "column sets differ between tables".to_string(),
                ));
            }
            table_a.column_names()
        }
    };

    let mut records = Vec::new();
    for name in &targets {
        for row in 0..table_a.n_rows() {
            let old = table_a.cell(row, name).cloned().unwrap_or(Cell::Null);
            let new = table_b.cell(row, name).cloned().unwrap_or(Cell::Null);
            if old.is_missing() || new.is_missing() || cells_equal(&old, &new) {
                continue;
            }
            records.push(DiffRecord {
                row_index: row,
                column_name: name.clone(),
                old_value: old.as_display(),
                new_value: new.as_display(),
                direction: direction_of(&old, &new),
            });
        }
    }

    let mut workbook = Workbook::new();
    let result = write_report_sheets(&mut workbook, table_a, table_b, mapping, &records);
    result.map_err(|e| EngineError::artifact(&mapping.output_path, e))?;
    workbook
        .save(&mapping.output_path)
        .map_err(|e| EngineError::artifact(&mapping.output_path, e))?;
    Ok(records)
}

fn write_report_sheets(
    workbook: &mut Workbook,
    table_a: &Table,
    table_b: &Table,
    mapping: &DiffMapping,
    records: &[DiffRecord],
) -> Result<(), XlsxError> {
    let sheet_a = workbook.add_worksheet();
    sheet_a.set_name(&mapping.label_a)?;
    write_table(sheet_a, table_a)?;

    let sheet_b = workbook.add_worksheet();
    sheet_b.set_name(&mapping.label_b)?;
    write_table(sheet_b, table_b)?;

    for record in records {
        if let Some(col) = table_b.column_index(&record.column_name) {
            let cell = table_b
                .cell(record.row_index, &record.column_name)
                .cloned()
                .unwrap_or(Cell::Null);
            let format = fill_format(record.direction);
            write_cell(
                sheet_b,
                record.row_index as u32 + 1,
                col as u16,
                &cell,
                Some(&format),
            )?;
        }
    }

    if !records.is_empty() {
        let summary = workbook.add_worksheet();
        summary.set_name(SUMMARY_SHEET)?;
        let headers = [
            "Row".to_string(),
            "Column".to_string(),
            format!("Old{}", mapping.label_a),
            format!("New{}", mapping.label_b),
            "Change".to_string(),
        ];
        for (idx, header) in headers.iter().enumerate() {
            summary.write_string(0, idx as u16, header)?;
        }
        for (idx, record) in records.iter().enumerate() {
            let row = idx as u32 + 1;
            summary.write_number(row, 0, record.row_index as f64)?;
            summary.write_string(row, 1, &record.column_name)?;
            summary.write_string(row, 2, &record.old_value)?;
            summary.write_string(row, 3, &record.new_value)?;
            summary.write_string(row, 4, record.direction.to_string())?;
        }
    }
    Ok(())
}

fn write_table(sheet: &mut Worksheet, table: &Table) -> Result<(), XlsxError> {
    for (idx, name) in table.column_names().iter().enumerate() {
        sheet.write_string(0, idx as u16, name)?;
    }
    for (col, column) in table.columns().iter().enumerate() {
        for (row, cell) in column.cells.iter().enumerate() {
            write_cell(sheet, row as u32 + 1, col as u16, cell, None)?;
        }
    }
    Ok(())
}

fn write_cell(
    sheet: &mut Worksheet,
    row: u32,
    col: u16,
    cell: &Cell,
    format: Option<&Format>,
) -> Result<(), XlsxError> {
    match (cell, format) {
        (Cell::Null, Some(format)) => {
            sheet.write_blank(row, col, format)?;
        }
        (Cell::Null, None) => {}
        (Cell::Integer(value), Some(format)) => {
            sheet.write_number_with_format(row, col, *value as f64, format)?;
        }
        (Cell::Integer(value), None) => {
            sheet.write_number(row, col, *value as f64)?;
        }
        (Cell::Float(value), Some(format)) => {
            sheet.write_number_with_format(row, col, *value, format)?;
        }
        (Cell::Float(value), None) => {
            sheet.write_number(row, col, *value)?;
        }
        (Cell::Boolean(value), Some(format)) => {
            sheet.write_boolean_with_format(row, col, *value, format)?;
        }
        (Cell::Boolean(value), None) => {
            sheet.write_boolean(row, col, *value)?;
        }
        (other, Some(format)) => {
            sheet.write_string_with_format(row, col, other.as_display(), format)?;
        }
        (other, None) => {
            sheet.write_string(row, col, other.as_display())?;
        }
    }
    Ok(())
}

/// CLI entry: resolve both inputs and process every mapping entry,
/// reporting each outcome independently.
pub fn execute(args: &DiffArgs) -> Result<()> {
    let table_a = resolve_input(&args.left, args)?;
    let table_b = resolve_input(&args.right, args)?;

    let mappings_text = std::fs::read_to_string(&args.mappings)
        .with_context(|| format!("Reading mapping file {:?}", args.mappings))?;
    let mappings = parse_mappings(&mappings_text)?;

    let outcomes = run_mappings(&table_a, &table_b, &mappings, args.mode);
    let mut failures = 0usize;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(records) => info!(
                "Wrote {:?} ({} change(s) recorded)",
                outcome.path,
                records.len()
            ),
            Err(err) => {
                failures += 1;
                error!("Mapping for {:?} failed: {err}", outcome.path);
            }
        }
    }
    if failures > 0 {
        anyhow::bail!("{failures} of {} mapping(s) failed", outcomes.len());
    }
    Ok(())
}

fn resolve_input(path: &std::path::Path, args: &DiffArgs) -> Result<Table> {
    let bytes = io_utils::read_input_bytes(path)?;
    let filename = path
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
    .with_context(|| format!("Resolving {path:?}"))?;
    Ok(resolved.table)
}
