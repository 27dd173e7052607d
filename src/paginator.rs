//! Sequential page walker.
//!
//! Pages are fetched one at a time starting from the configured first page.
//! The walk is a two-state machine: `Fetching { page }` and `Done(reason)`.
//! The normal end of the listing is the first page that yields no records.
//! Nothing else bounds the walk unless `max_pages` is set, so a source that
//! never serves an empty page keeps the run going.

use std::time::Duration;

use anyhow::Result;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::config::HttpConfig;
use crate::extract::{extract_page, ExtractError, RowSkip};
use crate::logger::ExportLogger;
use crate::parser::{parse_page, ParsedPage};
use crate::record::CompanyRecord;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Request for page {page} failed: {source}")]
    Transport {
        page: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error("Page {page} returned HTTP {status}: {body}")]
    Status { page: u32, status: u16, body: String },

    #[error("Invalid base URL '{0}'")]
    InvalidUrl(String),
}

/// Anything that can serve listing pages by number.
#[allow(async_fn_in_trait)]
pub trait PageSource {
    async fn fetch_page(&self, page: u32) -> Result<String, FetchError>;
}

/// Receives each page's records as soon as the page is parsed.
pub trait PageSink {
    fn write_page(&mut self, page: u32, records: &[CompanyRecord]) -> Result<()>;
}

/// Longest slice of an error body kept in [`FetchError::Status`].
const ERROR_BODY_LIMIT: usize = 200;

/// Fetches `base_url?page=N` over HTTP.
pub struct HttpPageSource {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpPageSource {
    pub fn new(config: &HttpConfig) -> Result<Self, FetchError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|_| FetchError::InvalidUrl(config.base_url.clone()))?;

        let mut headers = reqwest::header::HeaderMap::new();
        if let Ok(accept) = reqwest::header::HeaderValue::from_str(&config.accept) {
            headers.insert(reqwest::header::ACCEPT, accept);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(5))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

impl PageSource for HttpPageSource {
    async fn fetch_page(&self, page: u32) -> Result<String, FetchError> {
        debug!("GET {} page={}", self.base_url, page);

        let response = self
            .client
            .get(self.base_url.clone())
            .query(&[("page", page)])
            .send()
            .await
            .map_err(|source| FetchError::Transport { page, source })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                page,
                status: status.as_u16(),
                body: body.chars().take(ERROR_BODY_LIMIT).collect(),
            });
        }

        response
            .text()
            .await
            .map_err(|source| FetchError::Transport { page, source })
    }
}

/// Why the walk stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The page produced zero records: the end of the listing.
    EmptyPage { page: u32 },
    /// The configured page cap was reached.
    PageLimit { pages: u32 },
    /// The page had no table.
    NoTable { page: u32 },
    /// A required column header was missing.
    MissingHeader { page: u32, header: String },
    /// Network error or non-success HTTP status.
    Transport { page: u32, error: String },
    /// The page's records could not be written to the sink.
    Write { page: u32, error: String },
}

impl StopReason {
    /// Transport and structural failures end the run as errors.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            StopReason::NoTable { .. }
                | StopReason::MissingHeader { .. }
                | StopReason::Transport { .. }
                | StopReason::Write { .. }
        )
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::EmptyPage { page } => write!(f, "page {} returned no records", page),
            StopReason::PageLimit { pages } => write!(f, "page limit of {} reached", pages),
            StopReason::NoTable { page } => write!(f, "no table found on page {}", page),
            StopReason::MissingHeader { page, header } => {
                write!(f, "column '{}' missing on page {}", header, page)
            }
            StopReason::Transport { page, error } => {
                write!(f, "fetching page {} failed: {}", page, error)
            }
            StopReason::Write { page, error } => {
                write!(f, "saving page {} failed: {}", page, error)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaginationState {
    Fetching { page: u32 },
    Done(StopReason),
}

/// Everything collected by a run, including partial results of a failed one.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub records: Vec<CompanyRecord>,
    pub pages_fetched: u32,
    pub rows_seen: usize,
    pub skipped: Vec<RowSkip>,
    pub stop_reason: StopReason,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        !self.stop_reason.is_fatal()
    }
}

#[derive(Default)]
struct RunTally {
    records: Vec<CompanyRecord>,
    pages_fetched: u32,
    rows_seen: usize,
    skipped: Vec<RowSkip>,
}

/// The single termination predicate for a successfully parsed page.
pub fn is_last_page(page: &ParsedPage) -> bool {
    page.is_empty()
}

pub struct Paginator<S: PageSource> {
    source: S,
    start_page: u32,
    max_pages: Option<u32>,
    logger: Option<ExportLogger>,
}

impl<S: PageSource> Paginator<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            start_page: 1,
            max_pages: None,
            logger: None,
        }
    }

    pub fn with_start_page(mut self, page: u32) -> Self {
        self.start_page = page.max(1);
        self
    }

    /// `None` or `Some(0)` leaves the walk unbounded.
    pub fn with_max_pages(mut self, max_pages: Option<u32>) -> Self {
        self.max_pages = max_pages.filter(|m| *m > 0);
        self
    }

    pub fn with_logger(mut self, logger: ExportLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Walks the listing until the end, a failure or the page cap, handing
    /// each non-empty page to `sink` before moving on.
    ///
    /// Failures end the walk through [`RunReport::stop_reason`], so records
    /// saved before the failure are always reported.
    pub async fn run<K: PageSink>(&self, sink: &mut K) -> RunReport {
        let mut tally = RunTally::default();
        let mut state = PaginationState::Fetching {
            page: self.start_page,
        };

        loop {
            match state {
                PaginationState::Fetching { page } => {
                    state = self.step(page, sink, &mut tally).await;
                }
                PaginationState::Done(stop_reason) => {
                    info!("Pagination finished: {}", stop_reason);
                    return RunReport {
                        records: tally.records,
                        pages_fetched: tally.pages_fetched,
                        rows_seen: tally.rows_seen,
                        skipped: tally.skipped,
                        stop_reason,
                    };
                }
            }
        }
    }

    async fn step<K: PageSink>(
        &self,
        page: u32,
        sink: &mut K,
        tally: &mut RunTally,
    ) -> PaginationState {
        if let Some(max) = self.max_pages {
            if tally.pages_fetched >= max {
                return PaginationState::Done(StopReason::PageLimit { pages: max });
            }
        }

        if let Some(logger) = &self.logger {
            logger.log_page_fetch(page).await;
        }

        let html = match self.source.fetch_page(page).await {
            Ok(html) => html,
            Err(e) => {
                return PaginationState::Done(StopReason::Transport {
                    page,
                    error: e.to_string(),
                });
            }
        };
        tally.pages_fetched += 1;

        let rows = match extract_page(&html) {
            Ok(rows) => rows,
            Err(ExtractError::NoTable) => {
                return PaginationState::Done(StopReason::NoTable { page });
            }
            Err(ExtractError::MissingHeader(header)) => {
                return PaginationState::Done(StopReason::MissingHeader { page, header });
            }
        };

        let parsed = parse_page(rows);
        tally.rows_seen += parsed.total_rows;
        if let Some(logger) = &self.logger {
            logger.log_rows_found(page, parsed.total_rows);
            for skip in &parsed.skipped {
                logger.log_row_skipped(page, skip);
            }
        }
        tally.skipped.extend(parsed.skipped.iter().cloned());

        if is_last_page(&parsed) {
            return PaginationState::Done(StopReason::EmptyPage { page });
        }

        if let Err(e) = sink.write_page(page, &parsed.records) {
            return PaginationState::Done(StopReason::Write {
                page,
                error: format!("{:#}", e),
            });
        }
        let saved = parsed.records.len();
        tally.records.extend(parsed.records);
        if let Some(logger) = &self.logger {
            logger.log_page_saved(page, saved, tally.records.len());
        }

        PaginationState::Fetching { page: page + 1 }
    }
}
