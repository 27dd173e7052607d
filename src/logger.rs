use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Local;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::RwLock;
use tracing_subscriber::EnvFilter;

use crate::extract::RowSkip;
use crate::paginator::RunReport;

#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub enum VerbosityLevel {
    Silent = 0,   // Spinner and final summary only
    Summary = 1,  // Page progress (default)
    Detailed = 2, // Row skips and warnings
    Debug = 3,    // Everything
}

impl VerbosityLevel {
    pub fn from_verbose_count(count: u8) -> Self {
        match count {
            0 => VerbosityLevel::Summary,
            1 => VerbosityLevel::Detailed,
            2.. => VerbosityLevel::Debug,
        }
    }
}

/// Installs a stderr `tracing` subscriber when `RUST_LOG` is set.
pub fn init_tracing() {
    if std::env::var_os("RUST_LOG").is_none() {
        return;
    }
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .with_target(false)
            .try_init();
    }
}

/// User-facing run logger: timestamped lines on stderr, a spinner while
/// paging, an optional log file and the final summary.
#[derive(Clone)]
pub struct ExportLogger {
    verbosity: VerbosityLevel,
    progress_bar: Arc<RwLock<Option<ProgressBar>>>,
    run_metadata: Arc<Mutex<RunMetadata>>,
    log_buffer: Arc<Mutex<Vec<String>>>,
    log_file_path: Option<PathBuf>,
}

#[derive(Default, Clone)]
struct RunMetadata {
    start_time: Option<Instant>,
    end_time: Option<Instant>,
    pages_fetched: u32,
    rows_seen: usize,
    rows_skipped: usize,
    records_exported: usize,
    output_file: String,
    stop_reason: String,
    failed: bool,
}

impl ExportLogger {
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            progress_bar: Arc::new(RwLock::new(None)),
            run_metadata: Arc::new(Mutex::new(RunMetadata::default())),
            log_buffer: Arc::new(Mutex::new(Vec::new())),
            log_file_path: None,
        }
    }

    pub fn with_log_file(verbosity: VerbosityLevel, log_file_path: impl Into<PathBuf>) -> Self {
        Self {
            log_file_path: Some(log_file_path.into()),
            ..Self::new(verbosity)
        }
    }

    pub fn info(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Summary {
            self.print_message("INFO", message);
        }
    }

    pub fn warn(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Detailed {
            self.print_message("WARN", message);
        }
    }

    /// Always shown.
    pub fn error(&self, message: &str) {
        self.print_message("ERROR", message);
    }

    pub fn debug(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Debug {
            self.print_message("DEBUG", message);
        }
    }

    fn print_message(&self, level: &str, message: &str) {
        let msg = format!("[{}] {}: {}", Local::now().format("%H:%M:%S%.3f"), level, message);

        if self.log_file_path.is_some() {
            if let Ok(mut buffer) = self.log_buffer.lock() {
                buffer.push(msg.clone());
            }
        }

        // Print above the spinner so it stays on the last line. A hidden
        // spinner (stderr not a terminal) would swallow the line.
        if let Ok(guard) = self.progress_bar.try_read() {
            if let Some(pb) = guard.as_ref().filter(|pb| !pb.is_hidden()) {
                pb.println(msg);
                return;
            }
        }

        eprintln!("{}", msg);
    }

    pub async fn start_progress(&self) {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        pb.set_message("Starting...");

        *self.progress_bar.write().await = Some(pb);

        if let Ok(mut metadata) = self.run_metadata.lock() {
            metadata.start_time = Some(Instant::now());
        }
    }

    pub async fn update_progress(&self, message: &str) {
        if let Some(pb) = self.progress_bar.read().await.as_ref() {
            pb.set_message(message.to_string());
        }
    }

    pub async fn finish_progress(&self, final_message: &str) {
        if let Some(pb) = self.progress_bar.write().await.take() {
            pb.finish_and_clear();
        }

        if let Ok(mut metadata) = self.run_metadata.lock() {
            metadata.end_time = Some(Instant::now());
        }

        self.info(final_message);
    }

    pub async fn log_page_fetch(&self, page: u32) {
        self.update_progress(&format!("Fetching page {}", page)).await;
        self.info(&format!("Fetching page {}...", page));
    }

    pub fn log_rows_found(&self, page: u32, rows: usize) {
        self.debug(&format!("Page {}: {} table rows", page, rows));
    }

    pub fn log_row_skipped(&self, page: u32, skip: &RowSkip) {
        let domain = skip.domain.as_deref().unwrap_or("<unknown>");
        self.warn(&format!(
            "Skipping row {} on page {} ({}): {}",
            skip.row_index, page, domain, skip.reason
        ));
    }

    pub fn log_page_saved(&self, page: u32, saved: usize, total: usize) {
        self.info(&format!(
            "Saved {} entries from page {} (total: {})",
            saved, page, total
        ));
    }

    pub fn record_output_file(&self, path: &Path) {
        if let Ok(mut metadata) = self.run_metadata.lock() {
            metadata.output_file = path.display().to_string();
        }
    }

    pub fn record_report(&self, report: &RunReport) {
        if let Ok(mut metadata) = self.run_metadata.lock() {
            metadata.pages_fetched = report.pages_fetched;
            metadata.rows_seen = report.rows_seen;
            metadata.rows_skipped = report.skipped.len();
            metadata.records_exported = report.records.len();
            metadata.stop_reason = report.stop_reason.to_string();
            metadata.failed = !report.is_success();
        }
    }

    pub fn print_final_summary(&self) {
        let Ok(metadata) = self.run_metadata.lock() else {
            return;
        };

        println!("\n=== EXPORT SUMMARY ===");

        if let (Some(start), Some(end)) = (metadata.start_time, metadata.end_time) {
            println!("Run Duration: {:.2}s", end.duration_since(start).as_secs_f64());
        }

        println!("Pages Fetched: {}", metadata.pages_fetched);
        println!("Rows Seen: {}", metadata.rows_seen);
        println!("Rows Skipped: {}", metadata.rows_skipped);
        println!("Records Exported: {}", metadata.records_exported);
        if !metadata.output_file.is_empty() {
            println!("Output File: {}", metadata.output_file);
        }
        if !metadata.stop_reason.is_empty() {
            println!("Stopped: {}", metadata.stop_reason);
        }
        println!("======================\n");

        if metadata.failed {
            println!(
                "Export stopped early. {} records were saved before the failure.",
                metadata.records_exported
            );
        } else {
            println!(
                "Export completed successfully! {} records saved.",
                metadata.records_exported
            );
        }
    }

    /// Writes every buffered message to the log file, if one was requested.
    pub fn export_logs(&self) -> Result<()> {
        let Some(path) = &self.log_file_path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;

        if let Ok(buffer) = self.log_buffer.lock() {
            for entry in buffer.iter() {
                writeln!(file, "{}", entry)?;
            }
        }
        file.flush()?;
        Ok(())
    }

    pub fn log_count(&self) -> usize {
        self.log_buffer.lock().map(|b| b.len()).unwrap_or(0)
    }
}
