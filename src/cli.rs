use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::ConfigOverrides;

#[derive(Parser, Debug)]
#[command(name = "aidb-export")]
#[command(about = "Export the AI company database listing to CSV")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Create default configuration file at ./config/aidb-export.toml
    #[arg(long, global = true)]
    pub init: bool,

    /// Verbose logging (use -v for row warnings, -vv for DEBUG)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export execution logs to a file (specify file path)
    #[arg(long, global = true, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Run with the built-in defaults instead of the configuration file
    #[arg(long, global = true)]
    pub no_config: bool,

    /// Listing URL (overrides config)
    #[arg(long, global = true, value_name = "URL")]
    pub base_url: Option<String>,

    /// Directory for export files (overrides config)
    #[arg(long, global = true, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Stop after this many pages, 0 = no limit (overrides config)
    #[arg(long, global = true, value_name = "N")]
    pub max_pages: Option<u32>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Walk every listing page and export the records (default)
    Scrape,

    /// Export, then print category, city, TLD and version breakdowns
    Stats,

    /// Export, then list records containing TERM (case-insensitive)
    Search {
        /// Text to look for in each record
        term: String,
    },

    /// Reformat an existing CSV, converting literal collections to JSON
    Format {
        /// Input CSV file
        input: PathBuf,
        /// Output CSV file
        output: PathBuf,
        /// Overwrite the output file if it exists
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Scrape)
    }

    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            base_url: self.base_url.clone(),
            output_dir: self.output_dir.clone(),
            max_pages: self.max_pages,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        match self.command() {
            Commands::Search { term } if term.trim().is_empty() => {
                Err("Search term cannot be empty".to_string())
            }
            Commands::Format { input, output, .. } if input == output => {
                Err("Input and output must be different files".to_string())
            }
            _ => Ok(()),
        }
    }
}
