//! Per-category and per-run outcomes.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::category::Category;
use crate::types::record::Record;

/// Outcome of the final attempt at one category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeResult {
    pub category: Category,
    pub success: bool,
    pub rows: usize,
    pub error: Option<String>,
    pub records: Vec<Record>,
    /// Raw CSV written for this category, if any rows were produced
    pub output: Option<PathBuf>,
}

impl ScrapeResult {
    pub fn succeeded(category: Category, records: Vec<Record>, output: Option<PathBuf>) -> Self {
        Self {
            category,
            success: true,
            rows: records.len(),
            error: None,
            records,
            output,
        }
    }

    pub fn failed(category: Category, reason: impl Into<String>) -> Self {
        Self {
            category,
            success: false,
            rows: 0,
            error: Some(reason.into()),
            records: vec![],
            output: None,
        }
    }
}

/// Accumulated outcome of a whole run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunResults {
    /// Category IDs that produced rows
    pub successful: Vec<u32>,

    /// Category IDs that failed, with the reason
    pub failed: Vec<(u32, String)>,

    /// Rows produced across all categories, before dedup
    pub total_entries: usize,

    /// Rows in the merged dataset
    pub merged_entries: usize,

    pub duplicates_removed: usize,

    /// Final dataset path: the cleaned file, or the merged file when
    /// cleaning is skipped
    pub final_output: Option<PathBuf>,

    /// Why the merge step produced no dataset, when it failed
    pub merge_error: Option<String>,

    /// Summary report path
    pub report: Option<PathBuf>,

    /// Set when the run stopped early on request
    pub cancelled: bool,
}

impl RunResults {
    /// Fold one category outcome into the totals.
    pub fn record(&mut self, result: &ScrapeResult) {
        if result.success {
            self.successful.push(result.category.id);
            self.total_entries += result.rows;
        } else {
            let reason = result
                .error
                .clone()
                .unwrap_or_else(|| "unknown error".to_string());
            self.failed.push((result.category.id, reason));
        }
    }

    pub fn any_succeeded(&self) -> bool {
        !self.successful.is_empty()
    }
}
