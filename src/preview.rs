//! Preview and summary reporting for resolved tables.
//!
//! `preview` renders the first rows as display strings; `summarize`
//! produces the per-column overview (inferred kinds, missing counts and
//! ratios) that backs the `probe` command.

use std::collections::BTreeMap;

use anyhow::Result;
use log::info;
use serde::Serialize;

use crate::{
    cli::ProbeArgs,
    frame::Table,
    infer::{self, ColumnKind},
    ingest::{self, ResolveOptions, SpreadsheetSupport},
    io_utils, table,
};

#[derive(Debug, Serialize)]
pub struct Summary {
    pub rows: usize,
    pub cols: usize,
    pub columns: Vec<String>,
    pub dtypes: BTreeMap<String, ColumnKind>,
    pub na_count: BTreeMap<String, usize>,
    pub na_ratio: BTreeMap<String, f64>,
}

/// First `n` rows as display strings, with the header.
pub fn preview(table: &Table, n: usize) -> (Vec<String>, Vec<Vec<String>>) {
    let rows = (0..table.n_rows().min(n))
        .map(|row| table.row_display(row))
        .collect();
    (table.column_names(), rows)
}

pub fn summarize(table: &Table) -> Summary {
    let total_rows = table.n_rows();
    let dtypes: BTreeMap<String, ColumnKind> = infer::infer(table).into_iter().collect();

    let mut na_count = BTreeMap::new();
    let mut na_ratio = BTreeMap::new();
    for column in table.columns() {
        let missing = column.cells.iter().filter(|cell| cell.is_missing()).count();
        let ratio = if total_rows > 0 {
            let raw = missing as f64 / total_rows as f64;
            (raw * 10_000.0).round() / 10_000.0
        } else {
            0.0
        };
        na_count.insert(column.name.clone(), missing);
        na_ratio.insert(column.name.clone(), ratio);
    }

    Summary {
        rows: total_rows,
        cols: table.n_cols(),
        columns: table.column_names(),
        dtypes,
        na_count,
        na_ratio,
    }
}

/// CLI entry: preview the first rows, or emit the summary as JSON.
pub fn execute(args: &ProbeArgs) -> Result<()> {
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
            nrows: (!args.summary).then_some(args.rows),
            header_rows: args.header_rows,
        },
        &SpreadsheetSupport::default(),
    )?;
    info!(
        "Resolved {:?} as {} (separator '{}')",
        args.input,
        resolved.encoding,
        resolved
            .separator
            .map(io_utils::printable_separator)
            .unwrap_or_else(|| "n/a".to_string())
    );

    if args.summary {
        let summary = summarize(&resolved.table);
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        let (headers, rows) = preview(&resolved.table, args.rows);
        table::print_table(&headers, &rows);
        info!("Displayed {} row(s) from {:?}", rows.len(), args.input);
    }
    Ok(())
}
