//! Transformation pipeline: executes an ordered job list over a table.
//!
//! Jobs run strictly in list order against the current (possibly already
//! transformed) table. A job only touches columns it names and that
//! exist; unknown names are skipped silently. A single cell that fails to
//! coerce degrades to `Null` and never aborts the job. After the full
//! list runs, a best-effort re-typing pass stores fully numeric-coercible
//! columns as numeric, which drives comparison semantics in the diff
//! engine.

use std::fs;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use log::info;

use crate::{
    cli::TransformArgs,
    error::EngineError,
    export,
    frame::{Cell, Table, parse_numeric},
    ingest::{self, ResolveOptions, SpreadsheetSupport},
    io_utils,
    jobs::{
        self, DatePattern, FillStrategy, JobKind, OutlierMethod, OutlierReplace, ScaleOp,
        TransformationJob,
    },
    stats,
};

/// Applies the job list to `table`, returning a new table.
pub fn apply(table: &Table, jobs: &[TransformationJob]) -> Result<Table, EngineError> {
    jobs::validate_jobs(jobs)?;
    let mut current = table.clone();
    for job in jobs {
        for name in &job.columns {
            let Some(column) = current.column(name) else {
                continue;
            };
            let cells = transform_cells(&column.cells, &job.kind);
            current = current.with_column_cells(name, cells);
        }
    }
    Ok(retype_numeric(current))
}

fn transform_cells(cells: &[Cell], kind: &JobKind) -> Vec<Cell> {
    match kind {
        JobKind::NormalizeString => cells.iter().map(normalize_string).collect(),
        JobKind::CastInteger => cells.iter().map(cast_integer).collect(),
        JobKind::CastFloat { decimals } => cells
            .iter()
            .map(|cell| cast_float(cell, *decimals))
            .collect(),
        JobKind::CastBoolean => cells.iter().map(cast_boolean).collect(),
        JobKind::FormatPercent { decimals } => cells
            .iter()
            .map(|cell| format_percent(cell, *decimals))
            .collect(),
        JobKind::FormatDate { pattern } => cells
            .iter()
            .map(|cell| format_date(cell, *pattern))
            .collect(),
        JobKind::Scale { operation, factor } => cells
            .iter()
            .map(|cell| scale(cell, *operation, *factor))
            .collect(),
        JobKind::FillMissing {
            strategy,
            fill_value,
        } => fill_missing(cells, *strategy, fill_value.as_ref()),
        JobKind::HandleOutlier {
            method,
            threshold,
            replace,
        } => handle_outlier(cells, *method, *threshold, *replace),
    }
}

fn normalize_string(cell: &Cell) -> Cell {
    if cell.is_missing() {
        return Cell::Null;
    }
    let text = cell.as_display().trim().to_uppercase().replace(' ', "_");
    Cell::Text(text)
}

fn cast_integer(cell: &Cell) -> Cell {
    match cell.as_f64() {
        Some(value) if value.fract() == 0.0 && value.abs() <= i64::MAX as f64 => {
            Cell::Integer(value as i64)
        }
        _ => Cell::Null,
    }
}

fn cast_float(cell: &Cell, decimals: u32) -> Cell {
    match cell.as_f64() {
        Some(value) => Cell::Float(round_half_even(value, decimals)),
        None => Cell::Null,
    }
}

fn cast_boolean(cell: &Cell) -> Cell {
    if cell.is_missing() {
        return Cell::Null;
    }
    if let Cell::Boolean(value) = cell {
        return Cell::Boolean(*value);
    }
    match cell.as_display().trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Cell::Boolean(true),
        "false" | "f" | "no" | "n" | "0" => Cell::Boolean(false),
        _ => Cell::Null,
    }
}

fn format_percent(cell: &Cell, decimals: u32) -> Cell {
    if cell.is_missing() {
        return Cell::Null;
    }
    match cell.as_f64() {
        Some(value) => {
            let scaled = round_half_even(value * 100.0, decimals);
            Cell::Text(format!("{}%", Cell::Float(scaled).as_display()))
        }
        None => Cell::Null,
    }
}

fn format_date(cell: &Cell, pattern: DatePattern) -> Cell {
    if cell.is_missing() {
        return Cell::Null;
    }
    let parsed = match cell {
        Cell::Date(date) => Some(*date),
        other => parse_date_permissive(&other.as_display()),
    };
    match parsed {
        Some(date) => match pattern {
            DatePattern::YearMonthDay => Cell::Date(date),
            DatePattern::DayMonthYear => Cell::Text(date.format("%d-%m-%y").to_string()),
            DatePattern::MonthYear => Cell::Text(date.format("%m-%y").to_string()),
        },
        None => Cell::Null,
    }
}

/// Permissive date parsing: a fixed format list with month-first
/// resolution for ambiguous `MM/DD` forms.
pub fn parse_date_permissive(value: &str) -> Option<NaiveDate> {
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%m-%d-%Y", "%Y%m%d"];
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
    ];
    let trimmed = value.trim();
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Some(parsed);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(parsed.date());
        }
    }
    None
}

fn scale(cell: &Cell, operation: ScaleOp, factor: f64) -> Cell {
    match cell.as_f64() {
        Some(value) => {
            let result = match operation {
                ScaleOp::Mul => value * factor,
                ScaleOp::Div => value / factor,
                ScaleOp::Add => value + factor,
                ScaleOp::Sub => value - factor,
            };
            Cell::Float(result)
        }
        None => Cell::Null,
    }
}

fn fill_missing(
    cells: &[Cell],
    strategy: FillStrategy,
    fill_value: Option<&serde_json::Value>,
) -> Vec<Cell> {
    let replacement: Option<Cell> = match strategy {
        FillStrategy::Mean | FillStrategy::Median => {
            let present: Vec<f64> = cells
                .iter()
                .filter(|cell| !cell.is_missing())
                .filter_map(Cell::as_f64)
                .collect();
            let statistic = match strategy {
                FillStrategy::Mean => stats::mean(&present),
                _ => stats::median(&present),
            };
            statistic.map(Cell::Float)
        }
        FillStrategy::Mode => mode_cell(cells),
        FillStrategy::Constant => fill_value.map(constant_cell),
        FillStrategy::Null => Some(Cell::Null),
    };
    let Some(replacement) = replacement else {
        return cells.to_vec();
    };
    cells
        .iter()
        .map(|cell| {
            if cell.is_missing() {
                replacement.clone()
            } else {
                cell.clone()
            }
        })
        .collect()
}

/// Most frequent non-missing cell, first-seen on ties.
fn mode_cell(cells: &[Cell]) -> Option<Cell> {
    let mut tallies: Vec<(&Cell, usize)> = Vec::new();
    for cell in cells.iter().filter(|cell| !cell.is_missing()) {
        if let Some(entry) = tallies
            .iter_mut()
            .find(|(existing, _)| existing.as_display() == cell.as_display())
        {
            entry.1 += 1;
        } else {
            tallies.push((cell, 1));
        }
    }
    let best = tallies.iter().map(|(_, count)| *count).max()?;
    tallies
        .iter()
        .find(|(_, count)| *count == best)
        .map(|(cell, _)| (*cell).clone())
}

fn constant_cell(value: &serde_json::Value) -> Cell {
    match value {
        serde_json::Value::Null => Cell::Null,
        serde_json::Value::Bool(flag) => Cell::Boolean(*flag),
        serde_json::Value::Number(number) => match number.as_i64() {
            Some(int) => Cell::Integer(int),
            None => number.as_f64().map(Cell::Float).unwrap_or(Cell::Null),
        },
        serde_json::Value::String(text) => Cell::Text(text.clone()),
        other => Cell::Text(other.to_string()),
    }
}

fn handle_outlier(
    cells: &[Cell],
    method: OutlierMethod,
    threshold: f64,
    replace: OutlierReplace,
) -> Vec<Cell> {
    let numeric: Vec<Option<f64>> = cells.iter().map(Cell::as_f64).collect();
    let present: Vec<f64> = numeric.iter().flatten().copied().collect();
    if present.is_empty() {
        return numericized(&numeric);
    }

    let bounds = match method {
        OutlierMethod::Zscore => {
            let mean = stats::mean(&present).unwrap_or(0.0);
            match stats::sample_std_dev(&present) {
                Some(sd) if sd > 0.0 => {
                    Some((mean - threshold * sd, mean + threshold * sd))
                }
                // Zero or undefined spread flags nothing.
                _ => None,
            }
        }
        OutlierMethod::Iqr => {
            let q1 = stats::quantile(&present, 0.25);
            let q3 = stats::quantile(&present, 0.75);
            match (q1, q3) {
                (Some(q1), Some(q3)) => {
                    let iqr = q3 - q1;
                    Some((q1 - threshold * iqr, q3 + threshold * iqr))
                }
                _ => None,
            }
        }
    };
    let Some((lower, upper)) = bounds else {
        return numericized(&numeric);
    };

    let mean = stats::mean(&present);
    let median = stats::median(&present);
    numeric
        .iter()
        .map(|value| match value {
            Some(v) if *v < lower || *v > upper => match replace {
                OutlierReplace::Mean => mean.map(Cell::Float).unwrap_or(Cell::Null),
                OutlierReplace::Median => median.map(Cell::Float).unwrap_or(Cell::Null),
                OutlierReplace::Clip => {
                    Cell::Float(if *v < lower { lower } else { upper })
                }
                OutlierReplace::Null => Cell::Null,
            },
            Some(v) => Cell::Float(*v),
            None => Cell::Null,
        })
        .collect()
}

fn numericized(values: &[Option<f64>]) -> Vec<Cell> {
    values
        .iter()
        .map(|value| value.map(Cell::Float).unwrap_or(Cell::Null))
        .collect()
}

pub(crate) fn round_half_even(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round_ties_even() / scale
}

/// Best-effort re-typing: a column whose text cells all parse as numeric
/// is stored as numeric; already-typed columns are left alone.
fn retype_numeric(table: Table) -> Table {
    let names = table.column_names();
    let mut current = table;
    for name in names {
        let Some(column) = current.column(&name) else {
            continue;
        };
        let has_text = column
            .cells
            .iter()
            .any(|cell| matches!(cell, Cell::Text(_)) && !cell.is_missing());
        if !has_text {
            continue;
        }
        let mut parsed: Vec<Option<f64>> = Vec::with_capacity(column.cells.len());
        let mut coercible = true;
        for cell in &column.cells {
            if cell.is_missing() {
                parsed.push(None);
                continue;
            }
            match cell {
                Cell::Text(text) => match parse_numeric(text) {
                    Some(value) => parsed.push(Some(value)),
                    None => {
                        coercible = false;
                        break;
                    }
                },
                Cell::Integer(value) => parsed.push(Some(*value as f64)),
                Cell::Float(value) => parsed.push(Some(*value)),
                _ => {
                    coercible = false;
                    break;
                }
            }
        }
        if !coercible {
            continue;
        }
        let integral = parsed
            .iter()
            .flatten()
            .all(|value| value.fract() == 0.0 && value.abs() <= i64::MAX as f64);
        let cells = parsed
            .into_iter()
            .map(|value| match value {
                Some(v) if integral => Cell::Integer(v as i64),
                Some(v) => Cell::Float(v),
                None => Cell::Null,
            })
            .collect();
        current = current.with_column_cells(&name, cells);
    }
    current
}

/// CLI entry: resolve the input, run the job file, export the result.
pub fn execute(args: &TransformArgs) -> Result<()> {
    let bytes = io_utils::read_input_bytes(&args.input)?;
    let filename = args
        .input
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    let options = ResolveOptions {
        separator: args.separator,
        encoding: args.encoding.clone(),
        nrows: None,
        header_rows: args.header_rows,
    };
    let resolved = ingest::resolve(&bytes, &filename, &options, &SpreadsheetSupport::default())?;
    info!(
        "Resolved {:?} as {} ({} row(s), {} column(s))",
        args.input,
        resolved.encoding,
        resolved.table.n_rows(),
        resolved.table.n_cols()
    );

    let jobs_text = fs::read_to_string(&args.jobs)
        .with_context(|| format!("Reading job file {:?}", args.jobs))?;
    let jobs = jobs::parse_jobs(&jobs_text)?;
    let transformed = apply(&resolved.table, &jobs)?;

    export::export(&transformed, &args.output, args.format)?;
    info!(
        "Applied {} job(s) and wrote {:?}",
        jobs.len(),
        args.output
    );
    Ok(())
}
