//! Encoding/format resolver: raw bytes plus a filename hint in, a
//! Text-or-Null [`Table`] out, together with the encoding and separator
//! actually used.
//!
//! Delimited text runs through a fixed encoding cascade (UTF-8, UTF-8 with
//! BOM, a locale fallback list, then a byte-preserving Latin-1 decode that
//! cannot fail); the first encoding that both decodes and parses into a
//! rectangular table wins. Spreadsheet inputs are dispatched by extension
//! to `calamine`, gated on the [`SpreadsheetSupport`] capability resolved
//! once at startup. Typing is deferred entirely to inference and the
//! pipeline.

use std::io::Cursor;

use calamine::{Data, Reader, Xls, Xlsx};
use log::debug;

use crate::{
    columns::dedupe_names,
    error::EngineError,
    frame::{Cell, Column, Table},
    io_utils,
};

/// Which spreadsheet sub-formats the host has enabled. Resolved once and
/// threaded into [`resolve`] rather than consulted as global state.
#[derive(Debug, Clone, Copy)]
pub struct SpreadsheetSupport {
    pub xlsx: bool,
    pub xls: bool,
}

impl Default for SpreadsheetSupport {
    fn default() -> Self {
        Self {
            xlsx: true,
            xls: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Explicit separator; unset triggers auto-detection.
    pub separator: Option<u8>,
    /// Explicit encoding label; unset triggers the fallback cascade.
    pub encoding: Option<String>,
    /// Ingestion-time row truncation for preview use cases.
    pub nrows: Option<usize>,
    /// Header levels to flatten when reading a workbook.
    pub header_rows: usize,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            separator: None,
            encoding: None,
            nrows: None,
            header_rows: 1,
        }
    }
}

#[derive(Debug)]
pub struct Resolved {
    pub table: Table,
    /// Label of the encoding that won the cascade (or was given).
    pub encoding: String,
    /// Separator actually used; `None` for workbook inputs.
    pub separator: Option<u8>,
}

#[derive(Debug, Clone, Copy)]
enum EncodingCandidate {
    Utf8,
    Utf8Bom,
    Labeled(&'static str),
    Latin1,
}

const CASCADE: [EncodingCandidate; 8] = [
    EncodingCandidate::Utf8,
    EncodingCandidate::Utf8Bom,
    EncodingCandidate::Labeled("gbk"),
    EncodingCandidate::Labeled("gb2312"),
    EncodingCandidate::Labeled("big5"),
    EncodingCandidate::Labeled("shift_jis"),
    EncodingCandidate::Labeled("windows-1252"),
    EncodingCandidate::Latin1,
];

impl EncodingCandidate {
    fn label(&self) -> &'static str {
        match *self {
            EncodingCandidate::Utf8 => "utf-8",
            EncodingCandidate::Utf8Bom => "utf-8-sig",
            EncodingCandidate::Labeled(label) => label,
            EncodingCandidate::Latin1 => "latin1",
        }
    }

    fn decode(&self, bytes: &[u8]) -> Option<String> {
        match self {
            // A BOM defers to the dedicated BOM entry so the resolver
            // reports which variant actually applied.
            EncodingCandidate::Utf8 => {
                if io_utils::strip_utf8_bom(bytes).is_some() {
                    None
                } else {
                    io_utils::decode_strict(bytes, encoding_rs::UTF_8)
                }
            }
            EncodingCandidate::Utf8Bom => {
                let rest = io_utils::strip_utf8_bom(bytes)?;
                io_utils::decode_strict(rest, encoding_rs::UTF_8)
            }
            EncodingCandidate::Labeled(label) => {
                let encoding = io_utils::resolve_encoding(label).ok()?;
                io_utils::decode_strict(bytes, encoding)
            }
            EncodingCandidate::Latin1 => Some(io_utils::decode_latin1(bytes)),
        }
    }
}

/// Resolves raw bytes into a Text-or-Null table.
pub fn resolve(
    bytes: &[u8],
    filename: &str,
    options: &ResolveOptions,
    support: &SpreadsheetSupport,
) -> Result<Resolved, EngineError> {
    let lower = filename.to_lowercase();
    if lower.ends_with(".xlsx") || lower.ends_with(".xls") {
        let table = read_workbook(bytes, &lower, options, support)?;
        return Ok(Resolved {
            table,
            encoding: "utf-8".to_string(),
            separator: None,
        });
    }

    if let Some(label) = &options.encoding {
        let encoding =
            io_utils::resolve_encoding(label).map_err(|e| EngineError::Decode(e.to_string()))?;
        let text = io_utils::decode_strict(bytes, encoding).ok_or_else(|| {
            EngineError::Decode(format!("input is not valid {}", encoding.name()))
        })?;
        let separator = options
            .separator
            .unwrap_or_else(|| io_utils::detect_separator(&text));
        let table = parse_delimited(&text, separator, options.nrows, false)?;
        return Ok(Resolved {
            table,
            encoding: encoding.name().to_ascii_lowercase(),
            separator: Some(separator),
        });
    }

    for candidate in CASCADE {
        let Some(text) = candidate.decode(bytes) else {
            continue;
        };
        let separator = options
            .separator
            .unwrap_or_else(|| io_utils::detect_separator(&text));
        let lenient = matches!(candidate, EncodingCandidate::Latin1);
        match parse_delimited(&text, separator, options.nrows, lenient) {
            Ok(table) => {
                debug!(
                    "Resolved input as {} with separator '{}'",
                    candidate.label(),
                    io_utils::printable_separator(separator)
                );
                return Ok(Resolved {
                    table,
                    encoding: candidate.label().to_string(),
                    separator: Some(separator),
                });
            }
            Err(err) => {
                if lenient {
                    return Err(err);
                }
                debug!("Candidate {} rejected: {err}", candidate.label());
            }
        }
    }

    Err(EngineError::Decode(
        "all encoding candidates exhausted".to_string(),
    ))
}

/// Parses decoded text into a Text-or-Null table. Strict mode rejects
/// ragged rows; lenient mode (final cascade entry only) pads short rows
/// with `Null` and widens the header with generated names.
fn parse_delimited(
    text: &str,
    separator: u8,
    nrows: Option<usize>,
    lenient: bool,
) -> Result<Table, EngineError> {
    let text = text.strip_prefix('\u{FEFF}').unwrap_or(text);
    let mut reader = io_utils::open_csv_reader(text.as_bytes(), separator, lenient);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| EngineError::Decode(format!("failed to read header row: {e}")))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows: Vec<Vec<String>> = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        if nrows.is_some_and(|limit| idx >= limit) {
            break;
        }
        let record =
            record.map_err(|e| EngineError::Decode(format!("failed to parse row {}: {e}", idx + 2)))?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    let width = rows
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(headers.len()))
        .max()
        .unwrap_or(0);

    let mut names = headers;
    for idx in names.len()..width {
        names.push(format!("column_{idx}"));
    }
    let names: Vec<String> = names
        .into_iter()
        .enumerate()
        .map(|(idx, name)| {
            if name.is_empty() {
                format!("column_{idx}")
            } else {
                name
            }
        })
        .collect();
    let names = dedupe_names(names);

    let columns = names
        .into_iter()
        .enumerate()
        .map(|(col, name)| {
            let cells = rows
                .iter()
                .map(|row| row.get(col).map(|s| Cell::from_raw(s)).unwrap_or(Cell::Null))
                .collect();
            Column::new(name, cells)
        })
        .collect();

    Table::from_columns(columns)
}

fn read_workbook(
    bytes: &[u8],
    lower_name: &str,
    options: &ResolveOptions,
    support: &SpreadsheetSupport,
) -> Result<Table, EngineError> {
    let cursor = Cursor::new(bytes.to_vec());
    let range = if lower_name.ends_with(".xlsx") {
        if !support.xlsx {
            return Err(EngineError::Decode(
                "reading .xlsx workbooks requires the xlsx capability, which is disabled"
                    .to_string(),
            ));
        }
        let mut workbook = Xlsx::new(cursor)
            .map_err(|e| EngineError::Decode(format!("failed to open .xlsx workbook: {e}")))?;
        first_sheet(&mut workbook)?
    } else {
        if !support.xls {
            return Err(EngineError::Decode(
                "reading .xls workbooks requires the xls capability, which is disabled".to_string(),
            ));
        }
        let mut workbook = Xls::new(cursor)
            .map_err(|e| EngineError::Decode(format!("failed to open .xls workbook: {e}")))?;
        first_sheet(&mut workbook)?
    };

    let header_rows = options.header_rows.max(1);
    let width = range.width();
    let all_rows: Vec<&[Data]> = range.rows().collect();

    let mut names = Vec::with_capacity(width);
    for col in 0..width {
        let joined = all_rows
            .iter()
            .take(header_rows)
            .filter_map(|row| row.get(col))
            .map(data_to_display)
            .filter(|level| !level.is_empty())
            .collect::<Vec<_>>()
            .join("_");
        if joined.is_empty() {
            names.push(format!("column_{col}"));
        } else {
            names.push(joined);
        }
    }
    let names = dedupe_names(names);

    let data_rows: Vec<&&[Data]> = all_rows
        .iter()
        .skip(header_rows)
        .take(options.nrows.unwrap_or(usize::MAX))
        .collect();

    let columns = names
        .into_iter()
        .enumerate()
        .map(|(col, name)| {
            let cells = data_rows
                .iter()
                .map(|row| row.get(col).map(data_to_cell).unwrap_or(Cell::Null))
                .collect();
            Column::new(name, cells)
        })
        .collect();

    Table::from_columns(columns)
}

fn first_sheet<RS, R>(workbook: &mut R) -> Result<calamine::Range<Data>, EngineError>
where
    RS: std::io::Read + std::io::Seek,
    R: Reader<RS>,
    R::Error: std::fmt::Display,
{
    workbook
        .worksheet_range_at(0)
        .ok_or_else(|| EngineError::Decode("workbook contains no worksheets".to_string()))?
        .map_err(|e| EngineError::Decode(format!("failed to read worksheet: {e}")))
}

fn data_to_display(data: &Data) -> String {
    match data {
        Data::Empty => String::new(),
        Data::String(text) => text.clone(),
        Data::Float(value) => Cell::Float(*value).as_display(),
        Data::Int(value) => value.to_string(),
        Data::Bool(value) => value.to_string(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(naive) if naive.time() == chrono::NaiveTime::MIN => {
                naive.date().format("%Y-%m-%d").to_string()
            }
            Some(naive) => naive.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => dt.as_f64().to_string(),
        },
        Data::DateTimeIso(text) | Data::DurationIso(text) => text.clone(),
        Data::Error(_) => String::new(),
    }
}

fn data_to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Null,
        other => Cell::from_raw(&data_to_display(other)),
    }
}
