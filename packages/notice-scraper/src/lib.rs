//! Procurement Notice Scraper
//!
//! Collects procurement notices from the PhilGEPS opportunities site,
//! category by category, and turns them into one deduplicated, normalized
//! CSV dataset.
//!
//! # Pipeline
//!
//! 1. A [`ListingCrawler`] walks each category listing in a fresh browser
//!    session, clicking "next" until the links stop changing.
//! 2. Its cookies are published to the [`CookieRelay`] so detail sessions
//!    start with a valid server-side session.
//! 3. A pool of detail workers, each owning one pooled session, extracts a
//!    [`Record`] per notice with [`DetailExtractor`].
//! 4. Category outputs are merged (dedup by reference ID), sorted, cleaned
//!    and summarized by the [`Orchestrator`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use notice_scraper::{Orchestrator, RunConfig};
//! use notice_scraper::browser::chromium::ChromiumEngine;
//!
//! let config = RunConfig::new().with_categories(["Printing Services"]).with_limit(10);
//! let orchestrator = Orchestrator::new(Arc::new(ChromiumEngine::new()), config);
//! let results = orchestrator.run().await?;
//! println!("{} notices", results.merged_entries);
//! ```
//!
//! # Modules
//!
//! - [`browser`] - Browser engine traits, session pool, Chromium backend
//! - [`crawler`] - Paginated listing crawl
//! - [`extract`] - Detail page lookup cascade and record building
//! - [`contact`] - Contact block parsing
//! - [`pipeline`] - Merge and clean passes
//! - [`orchestrator`] - Multi-category run with retries and cancellation
//! - [`testing`] - Scripted in-memory browser for tests

pub mod browser;
pub mod contact;
pub mod cookies;
pub mod crawler;
pub mod error;
pub mod extract;
pub mod http;
pub mod normalize;
pub mod orchestrator;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod testing;
pub mod text;
pub mod types;

pub use browser::{
    BrowserEngine, BrowserPage, BrowserSession, ControlSelector, ControlState, SessionPool,
    SessionProfile, WorkerId,
};
pub use contact::{parse_contact, ContactParts};
pub use cookies::{Cookie, CookieRelay, CookieSnapshot};
pub use crawler::{CrawlSettings, ListingCrawler};
pub use error::{
    BrowserError, ConfigError, NoticeError, OutputError, Result, ScrapeError,
};
pub use extract::{DetailExtractor, ExtractSettings};
pub use http::HttpFallback;
pub use normalize::{normalize_currency, normalize_date};
pub use orchestrator::Orchestrator;
pub use output::OutputLayout;
pub use pipeline::{CleaningReport, MergeOutcome};
pub use progress::{NullProgress, ProgressSink, TracingProgress};
pub use types::{
    category::{Catalog, Category},
    config::RunConfig,
    record::Record,
    result::{RunResults, ScrapeResult},
};
