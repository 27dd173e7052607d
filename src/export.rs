use crate::paginator::PageSink;
use crate::record::CompanyRecord;
use anyhow::{Context, Result};
use chrono::Local;
use csv::{QuoteStyle, WriterBuilder};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Header row of every export file, in column order.
pub const EXPORT_HEADERS: [&str; 23] = [
    "domain",
    "version",
    "name",
    "firstCompanyName",
    "category",
    "street",
    "city",
    "zip",
    "phone",
    "email",
    "website_title",
    "website_url",
    "website_description",
    "website_images",
    "created",
    "utc_time_create",
    "person",
    "og_title",
    "og_description",
    "og_image",
    "og_site_name",
    "og_url",
    "raw_details",
];

/// Number of flattened record columns before the trailing `raw_details`.
pub const FLAT_COLUMNS: usize = 22;

/// CSV writer settings shared by the exporter and the format utility:
/// minimal quoting, quotes escaped by doubling.
pub fn csv_writer_builder() -> WriterBuilder {
    let mut builder = WriterBuilder::new();
    builder
        .quote_style(QuoteStyle::Necessary)
        .double_quote(true)
        .has_headers(false);
    builder
}

/// One record flattened into fixed columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatRow {
    pub columns: [String; FLAT_COLUMNS],
    pub raw_details: String,
}

impl FlatRow {
    pub fn from_record(record: &CompanyRecord) -> Result<Self> {
        let meta = &record.website_info.meta;
        let og = &record.website_info.og;

        let columns = [
            record.domain.clone(),
            record.version.clone(),
            record.name.clone(),
            record.first_company_name.clone(),
            record.category.clone(),
            record.contact.street.clone(),
            record.contact.city.clone(),
            record.contact.zip.clone(),
            record.contact.phone.clone(),
            record.contact.email.clone(),
            meta.title.clone(),
            meta.url.clone(),
            meta.description.clone(),
            record.image_sources(),
            record.created.clone(),
            record.created.clone(),
            record.person.clone(),
            og.title.clone(),
            og.description.clone(),
            og.image.clone(),
            og.site_name.clone(),
            og.url.clone(),
        ];

        let raw_details = serde_json::to_string(&record.raw)
            .with_context(|| format!("Failed to serialize details for {}", record.domain))?;

        Ok(Self {
            columns,
            raw_details,
        })
    }

    pub fn into_csv_record(self) -> Vec<String> {
        let mut fields = Vec::with_capacity(EXPORT_HEADERS.len());
        fields.extend(self.columns);
        fields.push(self.raw_details);
        fields
    }
}

/// The run's output file. The header is written once by [`ExportFile::create`];
/// every later write appends rows.
#[derive(Debug)]
pub struct ExportFile {
    path: PathBuf,
    rows_written: usize,
}

impl ExportFile {
    /// Creates `<dir>/<prefix>_<YYYYmmdd_HHMMSS>.csv`, making `dir` if needed.
    pub fn create(dir: &Path, prefix: &str) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let path = dir.join(format!("{}_{}.csv", prefix, timestamp));
        Self::create_at(path)
    }

    /// Creates (or truncates) the file at `path` and writes the header row.
    pub fn create_at(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = File::create(&path)
            .with_context(|| format!("Failed to create export file {}", path.display()))?;

        let mut wtr = csv_writer_builder().from_writer(file);
        wtr.write_record(EXPORT_HEADERS)?;
        wtr.flush()?;

        debug!("Created export file {}", path.display());
        Ok(Self {
            path,
            rows_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Appends one row per record and flushes before returning.
    pub fn append(&mut self, records: &[CompanyRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open export file {}", self.path.display()))?;
        let mut wtr = csv_writer_builder().from_writer(file);

        for record in records {
            wtr.write_record(FlatRow::from_record(record)?.into_csv_record())?;
        }
        wtr.flush()?;

        self.rows_written += records.len();
        Ok(records.len())
    }
}

impl PageSink for ExportFile {
    fn write_page(&mut self, page: u32, records: &[CompanyRecord]) -> Result<()> {
        let written = self.append(records)?;
        debug!(
            "Appended {} rows for page {} to {} (total: {})",
            written,
            page,
            self.path.display(),
            self.rows_written
        );
        Ok(())
    }
}
