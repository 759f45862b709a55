//! I/O utilities: encoding resolution, separator detection, and CSV
//! reader/writer construction.
//!
//! All byte-level concerns of the resolver flow through this module:
//!
//! - **Encoding**: explicit labels resolve via `encoding_rs`; the
//!   auto-detection cascade lives in `ingest` and uses the decode helpers
//!   here, ending in a byte-preserving Latin-1 decode that cannot fail.
//! - **Separator detection**: a fixed candidate set scored by line-wise
//!   field-count consistency over a bounded sample.
//! - **CSV construction**: readers and writers built with the same
//!   builder settings everywhere; output uses `QuoteStyle::Always` for
//!   round-trip safety and UTF-8 with a BOM.

use std::{
    fs::File,
    io::{BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};

pub const DEFAULT_SEPARATOR: u8 = b',';
pub const SEPARATOR_CANDIDATES: [u8; 4] = [b',', b';', b'\t', b'|'];
pub const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// Sample size (chars) used when sniffing the separator.
const SNIFF_SAMPLE_CHARS: usize = 10_000;
/// Upper bound on sampled lines; consistency stabilizes well before this.
const SNIFF_MAX_LINES: usize = 50;

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

/// Reads a whole input into memory, honouring the `-` stdin convention.
pub fn read_input_bytes(path: &Path) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    if is_dash(path) {
        std::io::stdin()
            .lock()
            .read_to_end(&mut bytes)
            .context("Reading bytes from stdin")?;
    } else {
        bytes = std::fs::read(path).with_context(|| format!("Reading input file {path:?}"))?;
    }
    Ok(bytes)
}

pub fn resolve_encoding(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| anyhow!("Unknown encoding '{label}'"))
}

/// Strict decode: any malformed sequence is an error, not a replacement.
pub fn decode_strict(bytes: &[u8], encoding: &'static Encoding) -> Option<String> {
    if encoding == UTF_8 {
        return std::str::from_utf8(bytes).ok().map(str::to_owned);
    }
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|text| text.into_owned())
}

/// Byte-preserving single-byte decode; total over all inputs.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

pub fn strip_utf8_bom(bytes: &[u8]) -> Option<&[u8]> {
    bytes.strip_prefix(UTF8_BOM.as_slice())
}

/// Picks the candidate separator whose line-wise field counts are most
/// consistent across the sample; ties go to the listed candidate order.
pub fn detect_separator(text: &str) -> u8 {
    let sample: String = text.chars().take(SNIFF_SAMPLE_CHARS).collect();
    let lines: Vec<&str> = sample
        .lines()
        .filter(|line| !line.trim().is_empty())
        .take(SNIFF_MAX_LINES)
        .collect();
    if lines.is_empty() {
        return DEFAULT_SEPARATOR;
    }

    let mut best = (DEFAULT_SEPARATOR, 0usize);
    for candidate in SEPARATOR_CANDIDATES {
        let sep = candidate as char;
        let counts: Vec<usize> = lines.iter().map(|line| line.split(sep).count()).collect();
        let Some(modal) = mode_of(&counts) else {
            continue;
        };
        if modal < 2 {
            continue;
        }
        let score = counts.iter().filter(|&&count| count == modal).count();
        if score > best.1 {
            best = (candidate, score);
        }
    }
    best.0
}

fn mode_of(counts: &[usize]) -> Option<usize> {
    let mut tallies: Vec<(usize, usize)> = Vec::new();
    for &count in counts {
        if let Some(entry) = tallies.iter_mut().find(|(value, _)| *value == count) {
            entry.1 += 1;
        } else {
            tallies.push((count, 1));
        }
    }
    tallies
        .iter()
        .max_by_key(|(_, tally)| *tally)
        .map(|(value, _)| *value)
}

pub fn open_csv_reader<R>(reader: R, separator: u8, flexible: bool) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(separator)
        .double_quote(true)
        .flexible(flexible);
    builder.from_reader(reader)
}

/// CSV writer targeting a file path: UTF-8 with BOM, always quoted.
pub fn open_csv_writer(path: &Path, separator: u8) -> Result<csv::Writer<Box<dyn Write>>> {
    let mut file = BufWriter::new(
        File::create(path).with_context(|| format!("Creating output file {path:?}"))?,
    );
    file.write_all(&UTF8_BOM)
        .with_context(|| format!("Writing BOM to {path:?}"))?;
    let base: Box<dyn Write> = Box::new(file);

    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(separator)
        .quote_style(QuoteStyle::Always)
        .double_quote(true);
    Ok(builder.from_writer(base))
}

pub fn printable_separator(separator: u8) -> String {
    match separator {
        b'\t' => "\\t".to_string(),
        other => (other as char).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_comma_from_consistent_lines() {
        assert_eq!(detect_separator("A,B\n1,2\n3,4\n"), b',');
    }

    #[test]
    fn detects_semicolon_over_stray_commas() {
        let text = "a;b;c\n1;2,5;3\n4;5;6\n";
        assert_eq!(detect_separator(text), b';');
    }

    #[test]
    fn detects_tab_and_pipe() {
        assert_eq!(detect_separator("a\tb\n1\t2\n"), b'\t');
        assert_eq!(detect_separator("a|b\n1|2\n"), b'|');
    }

    #[test]
    fn single_column_input_defaults_to_comma() {
        assert_eq!(detect_separator("header\nvalue\n"), b',');
        assert_eq!(detect_separator(""), b',');
    }

    #[test]
    fn strict_decode_rejects_malformed_utf8() {
        assert!(decode_strict(&[0xFF, 0xFE], encoding_rs::UTF_8).is_none());
        assert_eq!(
            decode_strict(b"plain", encoding_rs::UTF_8).as_deref(),
            Some("plain")
        );
    }

    #[test]
    fn latin1_decode_is_total() {
        let every_byte: Vec<u8> = (0..=255).collect();
        let text = decode_latin1(&every_byte);
        assert_eq!(text.chars().count(), 256);
    }

    #[test]
    fn bom_strip_only_applies_when_present() {
        assert_eq!(strip_utf8_bom(b"\xEF\xBB\xBFabc"), Some(b"abc".as_slice()));
        assert_eq!(strip_utf8_bom(b"abc"), None);
    }
}
