//! In-memory table model: named columns of nullable cells.
//!
//! A [`Table`] is an ordered sequence of equally-long [`Column`]s with
//! unique names. Raw ingestion produces Text-or-Null cells only; typed
//! cells come from pipeline jobs. Every engine operation takes a table by
//! reference and returns a new value — nothing mutates a caller's table
//! in place.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Literal tokens treated as missing regardless of the cell's nominal type.
pub const MISSING_MARKERS: &[&str] = &["", "NA", "N/A", "na", "-", "null", "None", "nan"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    Null,
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Text(String),
    Date(NaiveDate),
}

impl Cell {
    /// Wraps a raw parsed field, mapping missing markers to `Null`.
    pub fn from_raw(field: &str) -> Cell {
        if MISSING_MARKERS.contains(&field) {
            Cell::Null
        } else {
            Cell::Text(field.to_string())
        }
    }

    pub fn is_missing(&self) -> bool {
        match self {
            Cell::Null => true,
            Cell::Text(text) => MISSING_MARKERS.contains(&text.as_str()),
            _ => false,
        }
    }

    pub fn as_display(&self) -> String {
        match self {
            Cell::Null => String::new(),
            Cell::Integer(value) => value.to_string(),
            Cell::Float(value) => format_float(*value),
            Cell::Boolean(value) => value.to_string(),
            Cell::Text(text) => text.clone(),
            Cell::Date(date) => date.format("%Y-%m-%d").to_string(),
        }
    }

    /// Numeric view of the cell. Text is trimmed and parsed; booleans,
    /// dates, and missing values have no numeric form.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Integer(value) => Some(*value as f64),
            Cell::Float(value) => Some(*value),
            Cell::Text(text) => parse_numeric(text),
            Cell::Null | Cell::Boolean(_) | Cell::Date(_) => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

/// Parses a trimmed string as a number, rejecting missing markers.
pub fn parse_numeric(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if MISSING_MARKERS.contains(&trimmed) {
        return None;
    }
    if let Ok(value) = trimmed.parse::<i64>() {
        return Some(value as f64);
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Some(value),
        _ => None,
    }
}

fn format_float(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub cells: Vec<Cell>,
}

impl Column {
    pub fn new(name: impl Into<String>, cells: Vec<Cell>) -> Self {
        Self {
            name: name.into(),
            cells,
        }
    }

    /// Builds a Text-or-Null column from raw string fields.
    pub fn from_raw(name: impl Into<String>, fields: &[&str]) -> Self {
        Self {
            name: name.into(),
            cells: fields.iter().map(|field| Cell::from_raw(field)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
        }
    }

    /// Validates the shape invariant: equal column lengths, unique names.
    pub fn from_columns(columns: Vec<Column>) -> Result<Self, EngineError> {
        if let Some(first) = columns.first() {
            let rows = first.len();
            for column in &columns {
                if column.len() != rows {
                    return Err(EngineError::Configuration(format!(
                        "column '{}' has {} row(s), expected {}",
                        column.name,
                        column.len(),
                        rows
                    )));
                }
            }
        }
        let mut seen = std::collections::HashSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(EngineError::Configuration(format!(
                    "duplicate column name '{}'",
                    column.name
                )));
            }
        }
        Ok(Self { columns })
    }

    /// Constructor for internal call sites that preserve an existing
    /// table's shape (same lengths, same name set).
    pub(crate) fn from_columns_unchecked(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&Cell> {
        self.column(column).and_then(|c| c.cells.get(row))
    }

    /// One row rendered as display strings, in column order.
    pub fn row_display(&self, row: usize) -> Vec<String> {
        self.columns
            .iter()
            .map(|column| {
                column
                    .cells
                    .get(row)
                    .map(Cell::as_display)
                    .unwrap_or_default()
            })
            .collect()
    }

    /// Returns a copy with the column replaced; unknown names are ignored.
    pub(crate) fn with_column_cells(mut self, name: &str, cells: Vec<Cell>) -> Self {
        if let Some(column) = self.columns.iter_mut().find(|c| c.name == name) {
            column.cells = cells;
        }
        self
    }

    /// Returns a copy with all names replaced, preserving cell data.
    pub(crate) fn with_names(mut self, names: Vec<String>) -> Self {
        for (column, name) in self.columns.iter_mut().zip(names) {
            column.name = name;
        }
        self
    }
}
