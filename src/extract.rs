//! Table row extraction from a listing page.
//!
//! The listing renders one company per `<tr>`. The details cell carries a
//! collapsible JSON preview whose text sits between the toggle labels
//! "show" and "close".

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::debug;

use crate::record::RawTableRow;

pub const DOMAIN_HEADER: &str = "domain";
pub const DETAILS_HEADER: &str = "details";
pub const VERSION_HEADER: &str = "current version";

const OPEN_MARKER: &str = "show";
const CLOSE_MARKER: &str = "close";

// Safety: the selector strings are constants with valid CSS syntax, so
// Selector::parse cannot fail on them.
static TABLE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("table").unwrap());

static TH_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("th").unwrap());

static TR_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").unwrap());

static TD_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("td").unwrap());

/// Page-level structural failures. These end the run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("No table found in the HTML")]
    NoTable,

    #[error("Required column '{0}' not found in table headers")]
    MissingHeader(String),
}

/// Why a single row was left out of a page's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    InsufficientCells { found: usize, required: usize },
    MissingMarkers,
    InvalidJson(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::InsufficientCells { found, required } => {
                write!(f, "row has {} cells, needs at least {}", found, required)
            }
            SkipReason::MissingMarkers => write!(f, "details cell has no show/close markers"),
            SkipReason::InvalidJson(e) => write!(f, "failed to parse JSON: {}", e),
        }
    }
}

/// A row that was skipped, with enough context to find it again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowSkip {
    /// 1-based position among the table's body rows.
    pub row_index: usize,
    pub domain: Option<String>,
    pub reason: SkipReason,
}

/// Column positions of the required headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableLayout {
    pub domain: usize,
    pub details: usize,
    pub version: usize,
}

impl TableLayout {
    /// Minimum number of `<td>` cells a row needs to cover every column.
    pub fn required_cells(&self) -> usize {
        self.domain.max(self.details).max(self.version) + 1
    }
}

/// A body row whose details cell contained the embedded document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedRow {
    /// 1-based position among the table's body rows.
    pub row_index: usize,
    pub raw: RawTableRow,
    /// Trimmed text between the markers, handed to the record parser.
    pub json_text: String,
}

/// Everything pulled out of one page's table.
#[derive(Debug, Clone, Default)]
pub struct PageRows {
    pub rows: Vec<ExtractedRow>,
    pub skipped: Vec<RowSkip>,
    /// Number of body rows seen, extracted or not.
    pub total_rows: usize,
}

/// Resolves the required column indices by case-insensitive header text.
pub fn resolve_layout(table: ElementRef<'_>) -> Result<TableLayout, ExtractError> {
    let headers: Vec<String> = table
        .select(&TH_SELECTOR)
        .map(|th| cell_text(th).to_lowercase())
        .collect();

    let position = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| ExtractError::MissingHeader(name.to_string()))
    };

    Ok(TableLayout {
        domain: position(DOMAIN_HEADER)?,
        details: position(DETAILS_HEADER)?,
        version: position(VERSION_HEADER)?,
    })
}

/// Extracts candidate rows from the first table of a page.
pub fn extract_page(html: &str) -> Result<PageRows, ExtractError> {
    let document = Html::parse_document(html);
    let table = document
        .select(&TABLE_SELECTOR)
        .next()
        .ok_or(ExtractError::NoTable)?;

    let layout = resolve_layout(table)?;
    debug!("Resolved table layout: {:?}", layout);

    let mut page = PageRows::default();

    // The first <tr> holds the headers.
    for (index, row) in table.select(&TR_SELECTOR).skip(1).enumerate() {
        let row_index = index + 1;
        page.total_rows += 1;

        let cells: Vec<ElementRef<'_>> = row.select(&TD_SELECTOR).collect();
        if cells.len() < layout.required_cells() {
            debug!("Skipping row {}: {} cells", row_index, cells.len());
            page.skipped.push(RowSkip {
                row_index,
                domain: cells.get(layout.domain).map(|c| cell_text(*c)),
                reason: SkipReason::InsufficientCells {
                    found: cells.len(),
                    required: layout.required_cells(),
                },
            });
            continue;
        }

        let domain = cell_text(cells[layout.domain]);
        let details = cell_text(cells[layout.details]);
        let version = cell_text(cells[layout.version]);

        match slice_embedded_json(&details).map(str::to_string) {
            Some(json_text) => {
                page.rows.push(ExtractedRow {
                    row_index,
                    raw: RawTableRow::new(domain, version, details),
                    json_text,
                });
            }
            None => page.skipped.push(RowSkip {
                row_index,
                domain: Some(domain),
                reason: SkipReason::MissingMarkers,
            }),
        }
    }

    debug!(
        "Extracted {} of {} rows ({} skipped)",
        page.rows.len(),
        page.total_rows,
        page.skipped.len()
    );
    Ok(page)
}

/// Returns the trimmed text between the first "show" and the last "close"
/// that follows it, or `None` when either marker is missing.
pub fn slice_embedded_json(details: &str) -> Option<&str> {
    let start = details.find(OPEN_MARKER)? + OPEN_MARKER.len();
    let rest = &details[start..];
    let end = rest.rfind(CLOSE_MARKER)?;
    Some(rest[..end].trim())
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(rows: &str) -> String {
        format!(
            r#"<html><body><table>
                <tr><th>Domain</th><th>Current Version</th><th>Details</th></tr>
                {}
            </table></body></html>"#,
            rows
        )
    }

    #[test]
    fn test_slice_embedded_json_between_markers() {
        let details = r#"abc show {"name": "Acme"} close def"#;
        assert_eq!(slice_embedded_json(details), Some(r#"{"name": "Acme"}"#));
    }

    #[test]
    fn test_slice_embedded_json_without_markers() {
        assert_eq!(slice_embedded_json(r#"{"name": "Acme"}"#), None);
        assert_eq!(slice_embedded_json(r#"show {"name": "Acme"}"#), None);
        assert_eq!(slice_embedded_json(r#"{"name": "Acme"} close"#), None);
    }

    #[test]
    fn test_slice_keeps_close_inside_json() {
        let details = r#"show {"status": "closed"} close"#;
        assert_eq!(slice_embedded_json(details), Some(r#"{"status": "closed"}"#));
    }

    #[test]
    fn test_headers_resolved_case_insensitively() {
        let html = page(
            r#"<tr><td>acme.test</td><td>2</td><td>show {"name": "Acme"} close</td></tr>"#,
        );
        let rows = extract_page(&html).unwrap();

        assert_eq!(rows.total_rows, 1);
        assert_eq!(rows.rows.len(), 1);
        assert_eq!(rows.rows[0].raw.domain, "acme.test");
        assert_eq!(rows.rows[0].raw.version, "2");
        assert_eq!(rows.rows[0].json_text, r#"{"name": "Acme"}"#);
    }

    #[test]
    fn test_missing_table_is_structural_error() {
        let err = extract_page("<html><body><p>nothing</p></body></html>").unwrap_err();
        assert_eq!(err, ExtractError::NoTable);
    }

    #[test]
    fn test_missing_header_is_structural_error() {
        let html = r#"<table><tr><th>Domain</th><th>Details</th></tr></table>"#;
        let err = extract_page(html).unwrap_err();
        assert_eq!(err, ExtractError::MissingHeader("current version".to_string()));
    }

    #[test]
    fn test_short_rows_are_skipped() {
        let html = page(
            r#"<tr><td>short.test</td><td>1</td></tr>
               <tr><td>ok.test</td><td>1</td><td>show {} close</td></tr>"#,
        );
        let rows = extract_page(&html).unwrap();

        assert_eq!(rows.total_rows, 2);
        assert_eq!(rows.rows.len(), 1);
        assert_eq!(rows.skipped.len(), 1);
        assert_eq!(rows.skipped[0].row_index, 1);
        assert_eq!(
            rows.skipped[0].reason,
            SkipReason::InsufficientCells { found: 2, required: 3 }
        );
    }

    #[test]
    fn test_row_without_markers_skipped_but_next_row_kept() {
        let html = page(
            r#"<tr><td>plain.test</td><td>1</td><td>{"name": "Plain"}</td></tr>
               <tr><td>acme.test</td><td>1</td><td>show {"name": "Acme"} close</td></tr>"#,
        );
        let rows = extract_page(&html).unwrap();

        assert_eq!(rows.rows.len(), 1);
        assert_eq!(rows.rows[0].raw.domain, "acme.test");
        assert_eq!(rows.skipped[0].domain.as_deref(), Some("plain.test"));
        assert_eq!(rows.skipped[0].reason, SkipReason::MissingMarkers);
    }

    #[test]
    fn test_markup_inside_details_cell_is_flattened_to_text() {
        let html = page(
            r#"<tr><td> acme.test </td><td>4</td>
               <td><button>show</button><pre>{"name": "Acme"}</pre><button>close</button></td></tr>"#,
        );
        let rows = extract_page(&html).unwrap();
        assert_eq!(rows.rows[0].raw.domain, "acme.test");
        assert_eq!(rows.rows[0].json_text, r#"{"name": "Acme"}"#);
    }

    #[test]
    fn test_header_only_table_has_no_rows() {
        let rows = extract_page(&page("")).unwrap();
        assert_eq!(rows.total_rows, 0);
        assert!(rows.rows.is_empty());
    }
}
