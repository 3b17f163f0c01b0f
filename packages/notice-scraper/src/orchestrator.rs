//! Multi-category orchestration.
//!
//! Two levels of bounded concurrency: categories run through
//! `buffer_unordered(max_category_workers)`, and within a category
//! `max_detail_workers` workers drain one shared URL queue. Each worker owns
//! one pooled browser session for the whole category.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::browser::{BrowserEngine, SessionPool, SessionProfile, WorkerId};
use crate::cookies::CookieRelay;
use crate::crawler::{CrawlSettings, ListingCrawler};
use crate::error::Result;
use crate::extract::{DetailExtractor, ExtractSettings};
use crate::http::HttpFallback;
use crate::output::{write_records, write_report, OutputLayout};
use crate::pipeline::{clean_file, merge_files};
use crate::progress::{ProgressSink, TracingProgress};
use crate::types::category::{validate_listing_url, Catalog, Category};
use crate::types::config::RunConfig;
use crate::types::record::Record;
use crate::types::result::{RunResults, ScrapeResult};

/// Drives listing crawls, detail fetches, merge, clean and reporting.
pub struct Orchestrator<E: BrowserEngine> {
    engine: Arc<E>,
    config: RunConfig,
    catalog: Catalog,
    layout: OutputLayout,
    relay: Arc<CookieRelay>,
    profile: SessionProfile,
    crawl_settings: CrawlSettings,
    extract_settings: ExtractSettings,
    http: Option<Arc<HttpFallback>>,
    progress: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
    results: Mutex<RunResults>,
}

impl<E: BrowserEngine> Orchestrator<E> {
    pub fn new(engine: Arc<E>, config: RunConfig) -> Self {
        let profile = SessionProfile::default();
        let http = if config.http_fallback {
            match HttpFallback::new(&profile.user_agent) {
                Ok(http) => Some(Arc::new(http)),
                Err(e) => {
                    warn!(error = %e, "HTTP fallback unavailable");
                    None
                }
            }
        } else {
            None
        };

        Self {
            engine,
            layout: OutputLayout::new(&config.output_dir),
            config,
            catalog: Catalog::builtin().clone(),
            relay: Arc::new(CookieRelay::new()),
            profile,
            crawl_settings: CrawlSettings::default(),
            extract_settings: ExtractSettings::default(),
            http,
            progress: Arc::new(TracingProgress),
            cancel: CancellationToken::new(),
            results: Mutex::new(RunResults::default()),
        }
    }

    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Stop signal checked before each category, retry and detail URL.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_cookie_relay(mut self, relay: Arc<CookieRelay>) -> Self {
        self.relay = relay;
        self
    }

    pub fn with_profile(mut self, profile: SessionProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Listing crawl settings. The page cap always comes from the config.
    pub fn with_crawl_settings(mut self, settings: CrawlSettings) -> Self {
        self.crawl_settings = settings;
        self
    }

    pub fn with_extract_settings(mut self, settings: ExtractSettings) -> Self {
        self.extract_settings = settings;
        self
    }

    pub fn cookie_relay(&self) -> &Arc<CookieRelay> {
        &self.relay
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Snapshot of the results accumulated so far.
    pub fn results(&self) -> RunResults {
        self.lock_results().clone()
    }

    /// Full run: scrape the selected categories, merge, clean, report.
    ///
    /// Only configuration and output-tree errors are returned. Category
    /// failures and a failed merge are listed in the results and the report.
    pub async fn run(&self) -> Result<RunResults> {
        let categories = self.config.resolve_categories(&self.catalog)?;
        self.layout.create_dirs()?;

        self.progress.message(&format!(
            "Scraping {} categories with {} category workers and {} detail workers each",
            categories.len(),
            self.config.max_category_workers,
            self.config.max_detail_workers
        ));
        self.scrape_categories_parallel(&categories).await;

        let succeeded: Vec<PathBuf> = {
            let results = self.lock_results();
            categories
                .iter()
                .filter(|c| results.successful.contains(&c.id))
                .map(|c| self.layout.raw_path(c))
                .collect()
        };

        let mut merge_error = None;
        let final_output = if succeeded.is_empty() {
            warn!("No category produced data; skipping merge");
            None
        } else {
            match self.merge_and_clean(&succeeded).await {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!(error = %e, "Merge failed; reporting category outcomes only");
                    merge_error = Some(e.to_string());
                    None
                }
            }
        };

        let report = self.layout.report_path(chrono::Utc::now().timestamp());
        let results = {
            let mut results = self.lock_results();
            results.final_output = final_output;
            results.merge_error = merge_error;
            results.cancelled = self.cancel.is_cancelled();
            results.report = Some(report.clone());
            results.clone()
        };
        write_report(&report, &results, &self.catalog)?;

        info!(
            successful = results.successful.len(),
            failed = results.failed.len(),
            merged = results.merged_entries,
            duplicates = results.duplicates_removed,
            report = %report.display(),
            "Run finished"
        );
        Ok(results)
    }

    async fn merge_and_clean(&self, raw_paths: &[PathBuf]) -> Result<PathBuf> {
        self.progress.message("Merging data from all categories");
        let merged = merge_files(raw_paths)?;
        let merged_path = self.layout.merged_path();
        write_records(&merged_path, &merged.records)?;
        {
            let mut results = self.lock_results();
            results.merged_entries = merged.records.len();
            results.duplicates_removed = merged.duplicates_removed;
        }
        self.progress.message(&format!(
            "Merged {} unique notices ({} duplicates removed)",
            merged.records.len(),
            merged.duplicates_removed
        ));

        if self.config.no_clean {
            return Ok(merged_path);
        }

        let cleaned_path = self.layout.cleaned_path();
        match clean_file(&merged_path, &cleaned_path) {
            Ok(_) => Ok(cleaned_path),
            Err(e) => {
                warn!(error = %e, "Cleaning failed; keeping merged output");
                Ok(merged_path)
            }
        }
    }

    /// Scrape `categories` with bounded concurrency, folding each outcome
    /// into the shared results as it completes.
    pub async fn scrape_categories_parallel(&self, categories: &[Category]) -> Vec<ScrapeResult> {
        stream::iter(categories)
            .map(|category| async move {
                let result = self.scrape_category(category).await;
                self.lock_results().record(&result);
                self.progress.category_finished(&result);
                result
            })
            .buffer_unordered(self.config.max_category_workers.max(1))
            .collect()
            .await
    }

    /// Scrape one category, retrying when no links or no rows came back.
    pub async fn scrape_category(&self, category: &Category) -> ScrapeResult {
        let url = category.listing_url();
        if !validate_listing_url(&url) {
            return ScrapeResult::failed(
                category.clone(),
                format!("Invalid listing URL for {}", category.name),
            );
        }

        let mut last_error = String::new();
        for attempt in 0..=self.config.retry_count {
            if self.cancel.is_cancelled() {
                return ScrapeResult::failed(category.clone(), cancelled_reason(&last_error));
            }
            if attempt > 0 {
                self.progress.message(&format!(
                    "Retry {}/{} for {}",
                    attempt, self.config.retry_count, category.name
                ));
                tokio::select! {
                    _ = self.cancel.cancelled() => {
                        return ScrapeResult::failed(category.clone(), cancelled_reason(&last_error));
                    }
                    _ = tokio::time::sleep(self.config.backoff_duration()) => {}
                }
            }

            self.progress.category_started(category, attempt + 1);
            match self.attempt(category, &url).await {
                Ok(result) => return result,
                Err(reason) => {
                    warn!(category = %category.name, attempt = attempt + 1, reason = %reason, "Category attempt failed");
                    last_error = reason;
                }
            }
        }

        ScrapeResult::failed(category.clone(), last_error)
    }

    /// One pass over a category. `Err` carries a retryable reason.
    async fn attempt(
        &self,
        category: &Category,
        url: &str,
    ) -> std::result::Result<ScrapeResult, String> {
        let crawler = ListingCrawler::new(Arc::clone(&self.engine), Arc::clone(&self.relay))
            .with_profile(self.profile.clone())
            .with_settings(
                self.crawl_settings
                    .clone()
                    .with_max_pages(self.config.max_pages),
            );

        let mut links = crawler.collect_detail_links(url).await;
        if links.is_empty() {
            return Err(format!("No links found for {}", category.name));
        }
        if self.config.limit > 0 {
            links.truncate(self.config.limit);
        }
        self.progress.message(&format!(
            "Found {} notices in {}",
            links.len(),
            category.name
        ));

        let records = self.fetch_details(category, links).await;
        if records.is_empty() {
            return Err(format!("No data extracted for {}", category.name));
        }

        let path = self.layout.raw_path(category);
        if let Err(e) = write_records(&path, &records) {
            return Ok(ScrapeResult::failed(
                category.clone(),
                format!("Could not save {}: {}", category.name, e),
            ));
        }
        info!(category = %category.name, rows = records.len(), path = %path.display(), "Saved category output");
        Ok(ScrapeResult::succeeded(category.clone(), records, Some(path)))
    }

    /// Fetch every URL with a fresh worker pool; rows arrive in completion
    /// order.
    async fn fetch_details(&self, category: &Category, links: Vec<String>) -> Vec<Record> {
        let total = links.len();
        let pool = Arc::new(SessionPool::new(
            Arc::clone(&self.engine),
            self.profile.clone(),
        ));
        let mut extractor = DetailExtractor::new(Arc::clone(&pool), Arc::clone(&self.relay))
            .with_settings(self.extract_settings.clone());
        if let Some(http) = &self.http {
            extractor = extractor.with_http_fallback(Arc::clone(http));
        }

        let queue = Mutex::new(VecDeque::from(links));
        let rows = Mutex::new(Vec::with_capacity(total));
        let done = AtomicUsize::new(0);
        let batch = DetailBatch {
            category,
            extractor: &extractor,
            queue: &queue,
            rows: &rows,
            done: &done,
            total,
        };

        let workers = self.config.max_detail_workers.min(total).max(1);
        let handles: Vec<_> = (0..workers)
            .map(|i| self.detail_worker(WorkerId(i), &batch))
            .collect();
        futures::future::join_all(handles).await;

        pool.release_all().await;
        rows.into_inner().unwrap_or_else(|e| e.into_inner())
    }

    async fn detail_worker(&self, worker: WorkerId, batch: &DetailBatch<'_, E>) {
        let delay = self.config.delay_duration();
        loop {
            if self.cancel.is_cancelled() {
                debug!(%worker, "Stop requested; leaving queued URLs");
                break;
            }
            let next = lock(batch.queue).pop_front();
            let Some(url) = next else {
                break;
            };

            let record = batch.extractor.parse_detail(worker, &url).await;
            if record.is_empty() {
                debug!(%worker, url = %url, "Skipping empty record");
            } else {
                lock(batch.rows).push(record);
            }

            let done = batch.done.fetch_add(1, Ordering::SeqCst) + 1;
            self.progress
                .detail_progress(batch.category, done, batch.total);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }

    fn lock_results(&self) -> MutexGuard<'_, RunResults> {
        lock(&self.results)
    }
}

/// Shared state of one category's detail fetches.
struct DetailBatch<'a, E: BrowserEngine> {
    category: &'a Category,
    extractor: &'a DetailExtractor<E>,
    queue: &'a Mutex<VecDeque<String>>,
    rows: &'a Mutex<Vec<Record>>,
    done: &'a AtomicUsize,
    total: usize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

fn cancelled_reason(last_error: &str) -> String {
    if last_error.is_empty() {
        "Cancelled".to_string()
    } else {
        format!("Cancelled after: {last_error}")
    }
}
