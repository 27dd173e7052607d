pub mod cli;
pub mod config;
pub mod export;
pub mod extract;
pub mod literal;
pub mod logger;
pub mod normalize;
pub mod paginator;
pub mod parser;
pub mod record;
pub mod stats;

pub use export::{ExportFile, FlatRow};
pub use paginator::{HttpPageSource, Paginator, RunReport, StopReason};
pub use record::CompanyRecord;
