//! Run configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::types::category::{Catalog, Category};

/// Resolved settings for one scraping run.
///
/// Loaded from a JSON file, built in code with the `with_*` methods, or
/// both. Durations are seconds in the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Category names or numeric IDs. Empty selects the whole catalog.
    pub categories: Vec<String>,

    /// Maximum detail pages per category (0 = all)
    pub limit: usize,

    /// Pause after each detail fetch, in seconds
    pub delay: f64,

    /// Extra attempts per category after the first
    pub retry_count: u32,

    /// Pause between category attempts, in seconds
    pub retry_backoff: f64,

    /// Categories scraped concurrently
    pub max_category_workers: usize,

    /// Detail pages fetched concurrently within one category
    pub max_detail_workers: usize,

    /// Root of the raw/merged/cleaned/reports tree
    pub output_dir: PathBuf,

    /// Skip the normalization pass
    pub no_clean: bool,

    /// Listing pages visited per category before giving up on pagination
    pub max_pages: usize,

    /// Fetch detail pages over plain HTTP when the browser fails
    pub http_fallback: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            categories: vec![],
            limit: 0,
            delay: 0.5,
            retry_count: 2,
            retry_backoff: 3.0,
            max_category_workers: 2,
            max_detail_workers: 5,
            output_dir: PathBuf::from("output"),
            no_clean: false,
            max_pages: 100,
            http_fallback: false,
        }
    }
}

impl RunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON config file. Missing keys take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_categories(mut self, categories: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_delay(mut self, seconds: f64) -> Self {
        self.delay = seconds;
        self
    }

    pub fn with_retry_count(mut self, retries: u32) -> Self {
        self.retry_count = retries;
        self
    }

    pub fn with_retry_backoff(mut self, seconds: f64) -> Self {
        self.retry_backoff = seconds;
        self
    }

    pub fn with_category_workers(mut self, workers: usize) -> Self {
        self.max_category_workers = workers;
        self
    }

    pub fn with_detail_workers(mut self, workers: usize) -> Self {
        self.max_detail_workers = workers;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_no_clean(mut self, no_clean: bool) -> Self {
        self.no_clean = no_clean;
        self
    }

    pub fn with_max_pages(mut self, pages: usize) -> Self {
        self.max_pages = pages;
        self
    }

    pub fn with_http_fallback(mut self, enabled: bool) -> Self {
        self.http_fallback = enabled;
        self
    }

    /// Check numeric ranges.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_category_workers == 0 {
            return Err(invalid("max_category_workers", "must be at least 1"));
        }
        if self.max_detail_workers == 0 {
            return Err(invalid("max_detail_workers", "must be at least 1"));
        }
        if self.max_pages == 0 {
            return Err(invalid("max_pages", "must be at least 1"));
        }
        if !self.delay.is_finite() || self.delay < 0.0 {
            return Err(invalid("delay", "must be a non-negative number of seconds"));
        }
        if !self.retry_backoff.is_finite() || self.retry_backoff < 0.0 {
            return Err(invalid(
                "retry_backoff",
                "must be a non-negative number of seconds",
            ));
        }
        Ok(())
    }

    /// Validate and resolve the selected categories against a catalog.
    pub fn resolve_categories(&self, catalog: &Catalog) -> ConfigResult<Vec<Category>> {
        self.validate()?;
        let selected = if self.categories.is_empty() {
            catalog.all().to_vec()
        } else {
            catalog.resolve_all(&self.categories)?
        };
        if selected.is_empty() {
            return Err(ConfigError::NoCategories);
        }
        Ok(selected)
    }

    pub fn delay_duration(&self) -> Duration {
        Duration::from_secs_f64(self.delay)
    }

    pub fn backoff_duration(&self) -> Duration {
        Duration::from_secs_f64(self.retry_backoff)
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.retry_count, 2);
        assert_eq!(config.max_category_workers, 2);
        assert_eq!(config.max_detail_workers, 5);
        assert_eq!(config.max_pages, 100);
        assert_eq!(config.backoff_duration(), Duration::from_secs(3));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_with_partial_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"categories": ["Tokens", "29"], "limit": 10, "delay": 1.0}}"#
        )
        .unwrap();

        let config = RunConfig::from_file(file.path()).unwrap();
        assert_eq!(config.limit, 10);
        assert_eq!(config.retry_count, 2);

        let selected = config.resolve_categories(Catalog::builtin()).unwrap();
        let ids: Vec<u32> = selected.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![29, 129]);
    }

    #[test]
    fn test_from_file_errors() {
        assert!(matches!(
            RunConfig::from_file("/nonexistent/notice-config.json"),
            Err(ConfigError::Unreadable { .. })
        ));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        assert!(matches!(
            RunConfig::from_file(file.path()),
            Err(ConfigError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = RunConfig::new().with_detail_workers(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "max_detail_workers",
                ..
            })
        ));
    }

    #[test]
    fn test_unknown_category_rejected() {
        let config = RunConfig::new().with_categories(["Fireworks"]);
        assert!(matches!(
            config.resolve_categories(Catalog::builtin()),
            Err(ConfigError::UnknownCategory(name)) if name == "Fireworks"
        ));
    }

    #[test]
    fn test_empty_selection_means_whole_catalog() {
        let selected = RunConfig::new()
            .resolve_categories(Catalog::builtin())
            .unwrap();
        assert_eq!(selected.len(), Catalog::builtin().all().len());
    }

    #[test]
    fn test_empty_catalog_is_an_error() {
        let catalog = Catalog::new(vec![]);
        assert!(matches!(
            RunConfig::new().resolve_categories(&catalog),
            Err(ConfigError::NoCategories)
        ));
    }
}
