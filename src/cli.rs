use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::{clean::KeepRule, columns::NameCase, diff::DiffMode, export::ExportFormat};

#[derive(Debug, Parser)]
#[command(author, version, about = "Clean, transform, and compare tabular data", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Preview a CSV/Excel file or emit a JSON summary of its shape
    Probe(ProbeArgs),
    /// Apply a JSON job file of typed transformations to a file
    Transform(TransformArgs),
    /// Normalize column names, clean cells, and drop duplicate rows
    Clean(CleanArgs),
    /// Concatenate or merge two or more input files
    Combine(CombineArgs),
    /// Compare two files and write highlighted workbook artifacts
    Diff(DiffArgs),
    /// Convert a file to CSV, Excel, or JSON
    Export(ExportArgs),
}

#[derive(Debug, Args)]
pub struct ProbeArgs {
    /// Input CSV/Excel file to inspect
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Number of rows to preview
    #[arg(long, default_value_t = 5)]
    pub rows: usize,
    /// Emit a JSON summary instead of a preview table
    #[arg(long)]
    pub summary: bool,
    /// Field separator (supports ',', 'tab', ';', '|'); auto-detected if omitted
    #[arg(long = "sep", value_parser = parse_separator)]
    pub separator: Option<u8>,
    /// Character encoding; the fallback cascade runs if omitted
    #[arg(long)]
    pub encoding: Option<String>,
    /// Header levels to flatten when reading a workbook
    #[arg(long = "header-rows", default_value_t = 1)]
    pub header_rows: usize,
}

#[derive(Debug, Args)]
pub struct TransformArgs {
    /// Input CSV/Excel file to transform
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// JSON file describing the transformation jobs
    #[arg(short = 'j', long = "jobs")]
    pub jobs: PathBuf,
    /// Output file; format inferred from the extension
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,
    /// Output format override (csv, excel, json)
    #[arg(long, value_enum)]
    pub format: Option<ExportFormat>,
    /// Field separator; auto-detected if omitted
    #[arg(long = "sep", value_parser = parse_separator)]
    pub separator: Option<u8>,
    /// Character encoding; the fallback cascade runs if omitted
    #[arg(long)]
    pub encoding: Option<String>,
    /// Header levels to flatten when reading a workbook
    #[arg(long = "header-rows", default_value_t = 1)]
    pub header_rows: usize,
}

#[derive(Debug, Args)]
pub struct CleanArgs {
    /// Input CSV/Excel file to clean
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Output file; format inferred from the extension
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,
    /// Case transform for column names
    #[arg(long, value_enum, default_value = "upper")]
    pub case: NameCase,
    /// Keep characters outside [A-Za-z0-9_] in column names
    #[arg(long = "keep-special")]
    pub keep_special: bool,
    /// Remove duplicate rows
    #[arg(long)]
    pub dedup: bool,
    /// Which duplicate to keep when --dedup is set
    #[arg(long, value_enum, default_value = "first")]
    pub keep: KeepRule,
    /// Output format override (csv, excel, json)
    #[arg(long, value_enum)]
    pub format: Option<ExportFormat>,
    /// Field separator; auto-detected if omitted
    #[arg(long = "sep", value_parser = parse_separator)]
    pub separator: Option<u8>,
    /// Character encoding; the fallback cascade runs if omitted
    #[arg(long)]
    pub encoding: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
#[value(rename_all = "lowercase")]
pub enum CombineMethod {
    Concat,
    Merge,
}

#[derive(Debug, Args)]
pub struct CombineArgs {
    /// Two or more input files
    #[arg(short = 'i', long = "input", required = true, action = clap::ArgAction::Append)]
    pub inputs: Vec<PathBuf>,
    /// Output file; format inferred from the extension
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,
    /// Combination method
    #[arg(long, value_enum, default_value = "concat")]
    pub method: CombineMethod,
    /// Key columns for merge (repeatable)
    #[arg(long = "on", action = clap::ArgAction::Append)]
    pub on: Vec<String>,
    /// Uppercase column names before concatenation
    #[arg(long)]
    pub uppercase: bool,
    /// Output format override (csv, excel, json)
    #[arg(long, value_enum)]
    pub format: Option<ExportFormat>,
    /// Field separator; auto-detected if omitted
    #[arg(long = "sep", value_parser = parse_separator)]
    pub separator: Option<u8>,
    /// Character encoding; the fallback cascade runs if omitted
    #[arg(long)]
    pub encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct DiffArgs {
    /// Left ("old") input file
    #[arg(long)]
    pub left: PathBuf,
    /// Right ("new") input file
    #[arg(long)]
    pub right: PathBuf,
    /// JSON file of diff mappings (labels, output paths, column subsets)
    #[arg(short = 'm', long = "mappings")]
    pub mappings: PathBuf,
    /// Output mode
    #[arg(long, value_enum, default_value = "report")]
    pub mode: DiffMode,
    /// Field separator; auto-detected if omitted
    #[arg(long = "sep", value_parser = parse_separator)]
    pub separator: Option<u8>,
    /// Character encoding; the fallback cascade runs if omitted
    #[arg(long)]
    pub encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Input CSV/Excel file to convert
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Output file; format inferred from the extension
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,
    /// Output format override (csv, excel, json)
    #[arg(long, value_enum)]
    pub format: Option<ExportFormat>,
    /// Field separator; auto-detected if omitted
    #[arg(long = "sep", value_parser = parse_separator)]
    pub separator: Option<u8>,
    /// Character encoding; the fallback cascade runs if omitted
    #[arg(long)]
    pub encoding: Option<String>,
}

pub fn parse_separator(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Separator cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Separator must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Separator must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
