//! Table export: CSV (UTF-8 with BOM), Excel, and JSON row objects.
//!
//! The format is inferred from the output path's extension when not
//! given explicitly; an unrecognized extension is a configuration error.

use std::path::Path;

use anyhow::Result;
use clap::ValueEnum;
use log::info;
use rust_xlsxwriter::Workbook;

use crate::{
    cli::ExportArgs,
    error::EngineError,
    frame::{Cell, Table},
    ingest::{self, ResolveOptions, SpreadsheetSupport},
    io_utils,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Excel,
    Json,
}

/// Writes `table` to `path`, inferring the format when unset.
pub fn export(
    table: &Table,
    path: &Path,
    format: Option<ExportFormat>,
) -> Result<(), EngineError> {
    let format = match format {
        Some(format) => format,
        None => infer_format(path)?,
    };
    match format {
        ExportFormat::Csv => export_csv(table, path),
        ExportFormat::Excel => export_excel(table, path),
        ExportFormat::Json => export_json(table, path),
    }
}

pub fn infer_format(path: &Path) -> Result<ExportFormat, EngineError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("csv") => Ok(ExportFormat::Csv),
        Some("xls") | Some("xlsx") => Ok(ExportFormat::Excel),
        Some("json") => Ok(ExportFormat::Json),
        _ => Err(EngineError::Configuration(format!(
            "cannot infer export format from {path:?}; specify csv, excel, or json"
        ))),
    }
}

fn export_csv(table: &Table, path: &Path) -> Result<(), EngineError> {
    let mut writer = io_utils::open_csv_writer(path, io_utils::DEFAULT_SEPARATOR)
        .map_err(|e| EngineError::artifact(path, e))?;
    writer
        .write_record(table.column_names())
        .map_err(|e| EngineError::artifact(path, e))?;
    for row in 0..table.n_rows() {
        writer
            .write_record(table.row_display(row))
            .map_err(|e| EngineError::artifact(path, e))?;
    }
    writer.flush().map_err(|e| EngineError::artifact(path, e))
}

fn export_excel(table: &Table, path: &Path) -> Result<(), EngineError> {
    let mut workbook = Workbook::new();
    write_data_sheet(&mut workbook, table).map_err(|e| EngineError::artifact(path, e))?;
    workbook
        .save(path)
        .map_err(|e| EngineError::artifact(path, e))
}

fn write_data_sheet(
    workbook: &mut Workbook,
    table: &Table,
) -> Result<(), rust_xlsxwriter::XlsxError> {
    let sheet = workbook.add_worksheet();
    sheet.set_name("Data")?;
    for (idx, name) in table.column_names().iter().enumerate() {
        sheet.write_string(0, idx as u16, name)?;
    }
    for (col, column) in table.columns().iter().enumerate() {
        for (row, cell) in column.cells.iter().enumerate() {
            let (row, col) = (row as u32 + 1, col as u16);
            match cell {
                Cell::Null => {}
                Cell::Integer(value) => {
                    sheet.write_number(row, col, *value as f64)?;
                }
                Cell::Float(value) => {
                    sheet.write_number(row, col, *value)?;
                }
                Cell::Boolean(value) => {
                    sheet.write_boolean(row, col, *value)?;
                }
                other => {
                    sheet.write_string(row, col, other.as_display())?;
                }
            }
        }
    }
    Ok(())
}

fn export_json(table: &Table, path: &Path) -> Result<(), EngineError> {
    let rows: Vec<serde_json::Value> = (0..table.n_rows())
        .map(|row| {
            let mut object = serde_json::Map::new();
            for column in table.columns() {
                object.insert(column.name.clone(), cell_to_json(&column.cells[row]));
            }
            serde_json::Value::Object(object)
        })
        .collect();
    let text = serde_json::to_string(&rows).map_err(|e| EngineError::artifact(path, e))?;
    std::fs::write(path, text).map_err(|e| EngineError::artifact(path, e))
}

fn cell_to_json(cell: &Cell) -> serde_json::Value {
    match cell {
        Cell::Null => serde_json::Value::Null,
        Cell::Integer(value) => serde_json::Value::from(*value),
        Cell::Float(value) => serde_json::Value::from(*value),
        Cell::Boolean(value) => serde_json::Value::from(*value),
        other => serde_json::Value::from(other.as_display()),
    }
}

/// CLI entry: resolve the input and re-export it in the target format.
pub fn execute(args: &ExportArgs) -> Result<()> {
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
    export(&resolved.table, &args.output, args.format)?;
    info!(
        "Exported {} row(s) to {:?}",
        resolved.table.n_rows(),
        args.output
    );
    Ok(())
}
