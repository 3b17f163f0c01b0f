//! Typed errors for the notice scraper.
//!
//! Uses `thiserror` for library errors (not `anyhow`). Most of these never
//! reach the caller: detail and category failures are converted to result
//! values at the boundary of each unit of work. Only configuration and
//! output errors escape a run.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that end a run before or after scraping.
#[derive(Debug, Error)]
pub enum NoticeError {
    /// Invalid run configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Output tree could not be written
    #[error("output error: {0}")]
    Output(#[from] OutputError),
}

/// Errors raised by a browser engine implementation.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// Engine process could not be started
    #[error("browser launch failed: {0}")]
    Launch(String),

    /// Navigation did not complete
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    /// A wait exceeded its deadline
    #[error("timed out after {timeout:?} waiting for {what}")]
    Timeout { what: String, timeout: Duration },

    /// Element or control not present on the page
    #[error("element not found: {0}")]
    NotFound(String),

    /// The site served its "session invalid" interstitial
    #[error("session invalid at {url}")]
    SessionInvalid { url: String },

    /// Page or session was already closed
    #[error("browser target closed")]
    Closed,

    /// Protocol-level failure from the engine
    #[error("browser protocol error: {0}")]
    Protocol(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors that can occur while scraping one unit of work.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Browser engine failure
    #[error("browser error: {0}")]
    Browser(#[from] BrowserError),

    /// Plain HTTP fallback failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Listing page never rendered a result marker
    #[error("listing did not render at {url}")]
    ListingNotRendered { url: String },

    /// Invalid URL format
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },
}

/// Configuration errors. Reported before any work starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("cannot read config file {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid JSON for a run configuration
    #[error("invalid JSON in config file: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// Category selector matches nothing in the catalog
    #[error("invalid category reference: {0}")]
    UnknownCategory(String),

    /// Nothing selected to run
    #[error("no categories selected")]
    NoCategories,

    /// A numeric setting is out of range
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Errors writing or reading run outputs.
#[derive(Debug, Error)]
pub enum OutputError {
    /// Filesystem failure
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV encode/decode failure
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl OutputError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for whole-run operations.
pub type Result<T> = std::result::Result<T, NoticeError>;

/// Result type alias for browser operations.
pub type BrowserResult<T> = std::result::Result<T, BrowserError>;

/// Result type alias for fetch and crawl operations.
pub type FetchResult<T> = std::result::Result<T, ScrapeError>;

/// Result type alias for configuration.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for output operations.
pub type OutputResult<T> = std::result::Result<T, OutputError>;
