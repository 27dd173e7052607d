use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};

use aidb_export::cli::{Cli, Commands};
use aidb_export::config::{self, AppConfig};
use aidb_export::export::ExportFile;
use aidb_export::logger::{self, ExportLogger, VerbosityLevel};
use aidb_export::normalize::format_csv;
use aidb_export::paginator::{HttpPageSource, Paginator, RunReport};
use aidb_export::stats::{search, DatabaseStats};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::init_tracing();

    // Handle --init flag first (before any other processing)
    if cli.init {
        match AppConfig::create_default_config() {
            Ok(path) => {
                println!("✅ Created default configuration file at: {}", path.display());
                println!("   Edit this file to customize settings, then run aidb-export again.");
                std::process::exit(0);
            }
            Err(e) => {
                eprintln!("❌ Failed to create configuration file: {}", e);
                std::process::exit(1);
            }
        }
    }

    if let Err(e) = cli.validate() {
        eprintln!("❌ {}", e);
        std::process::exit(2);
    }

    let verbosity = VerbosityLevel::from_verbose_count(cli.verbose);
    let logger = match &cli.log_file {
        Some(path) => ExportLogger::with_log_file(verbosity, path),
        None => ExportLogger::new(verbosity),
    };

    // `format` works on local files only and needs no configuration.
    if let Commands::Format { input, output, force } = cli.command() {
        let code = run_format(&logger, &input, &output, force);
        finish_logs(&logger);
        std::process::exit(code);
    }

    let app_config = load_config(&cli);

    let (report, output_path) = match run_export(&app_config, &logger).await {
        Ok(result) => result,
        Err(e) => {
            logger.error(&format!("Export failed: {:#}", e));
            finish_logs(&logger);
            std::process::exit(1);
        }
    };

    match cli.command() {
        Commands::Stats => DatabaseStats::from_records(&report.records).print(),
        Commands::Search { term } => print_search_results(&report, &term),
        _ => {}
    }

    logger.print_final_summary();
    logger.debug(&format!("Output written to {}", output_path.display()));
    finish_logs(&logger);

    if !report.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

/// Loads the configuration file (or the built-in defaults) and applies
/// command line overrides. Exits on any configuration problem.
fn load_config(cli: &Cli) -> AppConfig {
    let loaded = if cli.no_config {
        AppConfig::builtin()
    } else {
        AppConfig::load()
    };

    let base = match loaded {
        Ok(cfg) => cfg,
        Err(config::ConfigError::FileNotFound(path)) => {
            // Config not found - prompt to create if interactive
            match AppConfig::prompt_create_config() {
                Ok(Some(created_path)) => {
                    println!("✅ Created default configuration file at: {}", created_path.display());
                    println!("   Edit this file to customize settings, then run aidb-export again.");
                    std::process::exit(0);
                }
                Ok(None) => {
                    eprintln!("❌ Configuration file not found at: {}", path.display());
                    eprintln!("   Run with --init to create a default configuration file,");
                    eprintln!("   or --no-config to use the built-in defaults.");
                    std::process::exit(1);
                }
                Err(e) => {
                    eprintln!("❌ Failed to create configuration file: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Err(e) => {
            eprintln!("❌ Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    match base.with_overrides(cli.overrides()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("❌ Configuration error: {}", e);
            std::process::exit(1);
        }
    }
}

async fn run_export(app_config: &AppConfig, logger: &ExportLogger) -> Result<(RunReport, PathBuf)> {
    let source = HttpPageSource::new(&app_config.http)?;
    let mut export = ExportFile::create(&app_config.export.output_dir, &app_config.export.file_prefix)?;
    logger.record_output_file(export.path());
    logger.info(&format!(
        "Exporting {} to {}",
        source.base_url(),
        export.path().display()
    ));

    let paginator = Paginator::new(source)
        .with_start_page(app_config.pagination.start_page)
        .with_max_pages(app_config.pagination.page_cap())
        .with_logger(logger.clone());

    logger.start_progress().await;
    let report = paginator.run(&mut export).await;

    logger.record_report(&report);
    if report.stop_reason.is_fatal() {
        logger.finish_progress("Export stopped early").await;
        logger.error(&format!("Export stopped: {}", report.stop_reason));
    } else {
        logger
            .finish_progress(&format!("Pagination finished: {}", report.stop_reason))
            .await;
    }

    Ok((report, export.path().to_path_buf()))
}

fn run_format(logger: &ExportLogger, input: &Path, output: &Path, force: bool) -> i32 {
    if output.exists() && !force {
        logger.error(&format!(
            "'{}' already exists. Use --force to overwrite it.",
            output.display()
        ));
        return 1;
    }

    match format_csv(input, output) {
        Ok(summary) => {
            logger.info(&format!(
                "Detected delimiter '{}', encoding {}",
                char::from(summary.delimiter).escape_default(),
                summary.encoding
            ));
            if summary.unchanged_cells > 0 {
                logger.warn(&format!(
                    "{} collection cells could not be converted and were kept as-is",
                    summary.unchanged_cells
                ));
            }
            println!(
                "✅ Formatted {} rows x {} columns ({} cells converted) into {}",
                summary.rows,
                summary.columns,
                summary.converted_cells,
                output.display()
            );
            0
        }
        Err(e) => {
            logger.error(&e.to_string());
            1
        }
    }
}

fn print_search_results(report: &RunReport, term: &str) {
    let matches = search(&report.records, term);
    println!("\nFound {} matches for term '{}'", matches.len(), term);
    for record in matches {
        println!(
            "- {}: {} ({}, {})",
            record.domain, record.name, record.category, record.contact.city
        );
    }
}

fn finish_logs(logger: &ExportLogger) {
    if let Err(e) = logger.export_logs() {
        eprintln!("❌ Failed to write log file: {:#}", e);
    }
}
