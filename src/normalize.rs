//! CSV-to-CSV reformatting.
//!
//! Reads a delimited file whose cells may hold Python-literal collections,
//! cleans every cell and rewrites collection cells as compact JSON. Cells are
//! handled one at a time: a cell that cannot be converted keeps its cleaned
//! text and never affects its neighbours.

use std::borrow::Cow;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::export::csv_writer_builder;
use crate::literal::{looks_like_collection, normalize_value, Normalized};

const CANDIDATE_DELIMITERS: [u8; 4] = [b',', b';', b'\t', b'|'];

#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("File must be a CSV file: {}", .0.display())]
    InvalidExtension(PathBuf),

    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("The input CSV file is empty: {}", .0.display())]
    EmptyInput(PathBuf),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// What a [`format_csv`] run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSummary {
    pub delimiter: u8,
    pub encoding: &'static str,
    pub columns: usize,
    pub rows: usize,
    /// Collection cells rewritten as JSON.
    pub converted_cells: usize,
    /// Collection-looking cells that could not be parsed and were kept.
    pub unchanged_cells: usize,
}

/// Both paths must carry a `.csv` extension; the input must also exist.
pub fn validate_csv_path(path: &Path, must_exist: bool) -> Result<(), NormalizeError> {
    let is_csv = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);
    if !is_csv {
        return Err(NormalizeError::InvalidExtension(path.to_path_buf()));
    }
    if must_exist && !path.exists() {
        return Err(NormalizeError::NotFound(path.to_path_buf()));
    }
    Ok(())
}

/// Picks the most frequent candidate delimiter outside double quotes.
/// Ties go to the earlier candidate; a line with none falls back to `,`.
pub fn sniff_delimiter(first_line: &str) -> u8 {
    let mut counts = [0usize; CANDIDATE_DELIMITERS.len()];
    let mut in_quotes = false;

    for byte in first_line.bytes() {
        if byte == b'"' {
            in_quotes = !in_quotes;
            continue;
        }
        if in_quotes {
            continue;
        }
        if let Some(idx) = CANDIDATE_DELIMITERS.iter().position(|d| *d == byte) {
            counts[idx] += 1;
        }
    }

    let mut best = 0;
    for idx in 1..counts.len() {
        if counts[idx] > counts[best] {
            best = idx;
        }
    }
    if counts[best] == 0 {
        b','
    } else {
        CANDIDATE_DELIMITERS[best]
    }
}

/// Trims the value and strips one pair of wrapping double quotes. Doubled
/// quotes inside are collapsed only when a wrapping pair was removed.
pub fn clean_value(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].replace("\"\"", "\"")
    } else {
        trimmed.to_string()
    }
}

/// Header names lose surrounding whitespace and every embedded quote.
pub fn clean_header(name: &str) -> String {
    name.trim().replace('"', "")
}

/// Decodes file bytes as UTF-8, falling back to Windows-1252.
pub fn decode_input(bytes: &[u8]) -> (Cow<'_, str>, &'static str) {
    match std::str::from_utf8(bytes) {
        Ok(text) => (Cow::Borrowed(text.strip_prefix('\u{feff}').unwrap_or(text)), "UTF-8"),
        Err(_) => {
            let (text, _) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(bytes);
            (text, encoding_rs::WINDOWS_1252.name())
        }
    }
}

/// Reformats `input` into `output`. The output is comma-delimited with
/// minimal quoting.
pub fn format_csv(input: &Path, output: &Path) -> Result<FormatSummary, NormalizeError> {
    validate_csv_path(input, true)?;
    validate_csv_path(output, false)?;

    info!("Reading data from {}", input.display());
    let bytes = fs::read(input).map_err(|source| NormalizeError::Io {
        path: input.to_path_buf(),
        source,
    })?;
    let (text, encoding) = decode_input(&bytes);
    if encoding != "UTF-8" {
        info!("Input is not valid UTF-8, decoded as {}", encoding);
    }

    let delimiter = sniff_delimiter(text.lines().next().unwrap_or(""));
    info!("Detected delimiter: '{}'", char::from(delimiter).escape_default());

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(clean_header).collect();

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut converted_cells = 0;
    let mut unchanged_cells = 0;

    for record in reader.records() {
        let record = record?;
        let mut row: Vec<String> = Vec::with_capacity(headers.len().max(record.len()));
        for cell in record.iter() {
            let cleaned = clean_value(cell);
            if !looks_like_collection(&cleaned) {
                row.push(cleaned);
                continue;
            }
            match normalize_value(&cleaned) {
                Normalized::Converted(json) => {
                    converted_cells += 1;
                    row.push(json);
                }
                Normalized::Unchanged(original) => {
                    unchanged_cells += 1;
                    row.push(original);
                }
            }
        }
        while row.len() < headers.len() {
            row.push(String::new());
        }
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(NormalizeError::EmptyInput(input.to_path_buf()));
    }

    let mut builder = csv_writer_builder();
    builder.delimiter(b',').flexible(true);
    let mut writer = builder.from_path(output)?;
    writer.write_record(&headers)?;
    for row in &rows {
        writer.write_record(row)?;
    }
    writer.flush().map_err(|source| NormalizeError::Io {
        path: output.to_path_buf(),
        source,
    })?;

    debug!(
        "Converted {} cells, kept {} unparseable collection cells",
        converted_cells, unchanged_cells
    );
    info!("Data has been formatted and saved to {}", output.display());

    Ok(FormatSummary {
        delimiter,
        encoding,
        columns: headers.len(),
        rows: rows.len(),
        converted_cells,
        unchanged_cells,
    })
}
