//! Output tree and file formats.
//!
//! ```text
//! <root>/raw/<category_slug>.csv
//! <root>/merged/merged.csv
//! <root>/cleaned/merged_cleaned.csv
//! <root>/reports/scraping_summary_<unix-ts>.txt
//! ```

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{OutputError, OutputResult};
use crate::types::category::{Catalog, Category};
use crate::types::record::Record;
use crate::types::result::RunResults;

/// Paths of one run's output tree.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.root.join("raw")
    }

    pub fn merged_dir(&self) -> PathBuf {
        self.root.join("merged")
    }

    pub fn cleaned_dir(&self) -> PathBuf {
        self.root.join("cleaned")
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.root.join("reports")
    }

    /// Create every directory of the tree.
    pub fn create_dirs(&self) -> OutputResult<()> {
        for dir in [
            self.raw_dir(),
            self.merged_dir(),
            self.cleaned_dir(),
            self.reports_dir(),
        ] {
            fs::create_dir_all(&dir).map_err(|e| OutputError::io(&dir, e))?;
        }
        Ok(())
    }

    pub fn raw_path(&self, category: &Category) -> PathBuf {
        self.raw_dir().join(format!("{}.csv", category.slug()))
    }

    pub fn merged_path(&self) -> PathBuf {
        self.merged_dir().join("merged.csv")
    }

    pub fn cleaned_path(&self) -> PathBuf {
        self.cleaned_dir().join("merged_cleaned.csv")
    }

    pub fn report_path(&self, timestamp: i64) -> PathBuf {
        self.reports_dir()
            .join(format!("scraping_summary_{timestamp}.txt"))
    }
}

/// Write records as CSV with the standard header, even when empty.
pub fn write_records(path: &Path, records: &[Record]) -> OutputResult<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    writer.write_record(Record::HEADERS)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush().map_err(|e| OutputError::io(path, e))?;
    Ok(())
}

/// Read a CSV written by [`write_records`]. Empty cells read as `None`.
pub fn read_records(path: &Path) -> OutputResult<Vec<Record>> {
    let mut reader = csv::Reader::from_path(path)?;
    let records = reader.deserialize().collect::<Result<Vec<Record>, _>>()?;
    Ok(records)
}

/// Render the plain-text run summary.
pub fn render_report(results: &RunResults, catalog: &Catalog) -> String {
    let name = |id: u32| {
        catalog
            .get(id)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| format!("Category {id}"))
    };

    let mut out = String::new();
    let _ = writeln!(out, "Procurement Notice Scraping Summary");
    let _ = writeln!(out, "{}", "=".repeat(50));
    let _ = writeln!(out);
    let _ = writeln!(out, "Results:");
    for id in &results.successful {
        let _ = writeln!(out, "  OK    {}: scraped successfully", name(*id));
    }
    for (id, reason) in &results.failed {
        let _ = writeln!(out, "  FAIL  {}: {}", name(*id), reason);
    }
    if results.cancelled {
        let _ = writeln!(out, "  Run cancelled before all categories finished");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Total entries collected : {}", results.total_entries);
    let _ = writeln!(out, "Final merged entries    : {}", results.merged_entries);
    let _ = writeln!(out, "Duplicates removed      : {}", results.duplicates_removed);
    let _ = writeln!(out);
    match (&results.final_output, &results.merge_error) {
        (Some(path), _) => {
            let _ = writeln!(out, "Final file: {}", path.display());
        }
        (None, Some(reason)) => {
            let _ = writeln!(out, "Final file: none (merge failed: {reason})");
        }
        (None, None) => {
            let _ = writeln!(out, "Final file: none (no data collected)");
        }
    }
    out
}

/// Write the run summary to `path`.
pub fn write_report(path: &Path, results: &RunResults, catalog: &Catalog) -> OutputResult<()> {
    fs::write(path, render_report(results, catalog)).map_err(|e| OutputError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_paths() {
        let layout = OutputLayout::new("/tmp/run");
        let category = Category::new(80, "General Merchandise");
        assert_eq!(
            layout.raw_path(&category),
            PathBuf::from("/tmp/run/raw/general_merchandise.csv")
        );
        assert_eq!(
            layout.cleaned_path(),
            PathBuf::from("/tmp/run/cleaned/merged_cleaned.csv")
        );
        assert_eq!(
            layout.report_path(1_700_000_000),
            PathBuf::from("/tmp/run/reports/scraping_summary_1700000000.txt")
        );
    }

    #[test]
    fn test_write_then_read_preserves_empty_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.csv");
        let records = vec![
            Record {
                ref_id: Some("1".into()),
                title: Some("Bond paper, A4".into()),
                contact_address: Some("Line one\nLine two".into()),
                ..Default::default()
            },
            Record::default(),
        ];

        write_records(&path, &records).unwrap();
        assert_eq!(read_records(&path).unwrap(), records);
    }

    #[test]
    fn test_empty_file_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        write_records(&path, &[]).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.trim_end(), Record::HEADERS.join(","));
        assert!(read_records(&path).unwrap().is_empty());
    }

    #[test]
    fn test_report_lists_every_outcome() {
        let results = RunResults {
            successful: vec![29],
            failed: vec![(129, "No links found for Tokens".to_string())],
            total_entries: 12,
            merged_entries: 10,
            duplicates_removed: 2,
            final_output: Some(PathBuf::from("out/cleaned/merged_cleaned.csv")),
            ..Default::default()
        };

        let report = render_report(&results, Catalog::builtin());
        assert!(report.contains("OK    Printing Services"));
        assert!(report.contains("FAIL  Tokens: No links found for Tokens"));
        assert!(report.contains("Duplicates removed      : 2"));
        assert!(report.contains("out/cleaned/merged_cleaned.csv"));
    }

    #[test]
    fn test_report_names_merge_failure() {
        let results = RunResults {
            successful: vec![129],
            total_entries: 1,
            merge_error: Some("I/O error on out/merged/merged.csv".to_string()),
            ..Default::default()
        };

        let report = render_report(&results, Catalog::builtin());
        assert!(report.contains("OK    Tokens: scraped successfully"));
        assert!(report.contains("Final file: none (merge failed: I/O error on out/merged/merged.csv)"));
    }
}
