//! Progress observation for presentation layers.

use tracing::info;

use crate::types::category::Category;
use crate::types::result::ScrapeResult;

/// Receives progress events from a run. Implementations must be cheap;
/// events are sent from worker tasks.
pub trait ProgressSink: Send + Sync {
    /// Free-form status line.
    fn message(&self, text: &str);

    fn category_started(&self, category: &Category, attempt: u32);

    fn category_finished(&self, result: &ScrapeResult);

    /// `done` of `total` detail pages processed for `category`.
    fn detail_progress(&self, category: &Category, done: usize, total: usize);
}

/// Logs every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn message(&self, text: &str) {
        info!("{}", text);
    }

    fn category_started(&self, category: &Category, attempt: u32) {
        info!(category = %category.name, id = category.id, attempt, "Category started");
    }

    fn category_finished(&self, result: &ScrapeResult) {
        info!(
            category = %result.category.name,
            success = result.success,
            rows = result.rows,
            error = result.error.as_deref().unwrap_or(""),
            "Category finished"
        );
    }

    fn detail_progress(&self, category: &Category, done: usize, total: usize) {
        info!(category = %category.name, done, total, "Detail progress");
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn message(&self, _text: &str) {}

    fn category_started(&self, _category: &Category, _attempt: u32) {}

    fn category_finished(&self, _result: &ScrapeResult) {}

    fn detail_progress(&self, _category: &Category, _done: usize, _total: usize) {}
}
