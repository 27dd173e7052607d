//! Strict parsing of the embedded details document into a [`CompanyRecord`].

use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::extract::{ExtractedRow, PageRows, RowSkip, SkipReason};
use crate::record::CompanyRecord;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("{0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a JSON object, found {0}")]
    NotAnObject(&'static str),
}

/// Records parsed from one page, plus every row that was left out.
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    pub records: Vec<CompanyRecord>,
    pub skipped: Vec<RowSkip>,
    pub total_rows: usize,
}

impl ParsedPage {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Parses one extracted row. The details text must be a JSON object.
pub fn parse_record(row: &ExtractedRow) -> Result<CompanyRecord, ParseError> {
    let source: Value = serde_json::from_str(&row.json_text)?;
    if !source.is_object() {
        return Err(ParseError::NotAnObject(json_kind(&source)));
    }
    Ok(CompanyRecord::from_source(&row.raw.domain, &row.raw.version, source))
}

/// Parses every extracted row of a page. Rows that fail are skipped and
/// logged with their domain; they never abort the page.
pub fn parse_page(page: PageRows) -> ParsedPage {
    let mut parsed = ParsedPage {
        records: Vec::with_capacity(page.rows.len()),
        skipped: page.skipped,
        total_rows: page.total_rows,
    };

    for row in &page.rows {
        match parse_record(row) {
            Ok(record) => parsed.records.push(record),
            Err(e) => {
                warn!("Failed to parse JSON for {}: {}", row.raw.domain, e);
                parsed.skipped.push(RowSkip {
                    row_index: row.row_index,
                    domain: Some(row.raw.domain.clone()),
                    reason: SkipReason::InvalidJson(e.to_string()),
                });
            }
        }
    }

    parsed
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
