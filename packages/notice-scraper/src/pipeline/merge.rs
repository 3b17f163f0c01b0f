//! Cross-category merge: dedup by reference ID, then sort.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::error::OutputResult;
use crate::normalize::normalize_currency;
use crate::output::read_records;
use crate::types::record::Record;

/// Result of merging category outputs.
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    /// Deduplicated, sorted records
    pub records: Vec<Record>,
    /// Rows read across all inputs
    pub total_read: usize,
    pub duplicates_removed: usize,
}

/// Merge category outputs given in category order.
///
/// The first row seen for each non-null reference ID is kept; rows without
/// one are always kept. The result is sorted with [`sort_records`].
pub fn merge<I>(outputs: I) -> MergeOutcome
where
    I: IntoIterator<Item = Vec<Record>>,
{
    let mut seen = HashSet::new();
    let mut records = Vec::new();
    let mut total_read = 0;

    for rows in outputs {
        total_read += rows.len();
        for row in rows {
            let first = match &row.ref_id {
                Some(id) => seen.insert(id.clone()),
                None => true,
            };
            if first {
                records.push(row);
            }
        }
    }

    sort_records(&mut records);
    let duplicates_removed = total_read - records.len();
    info!(
        read = total_read,
        kept = records.len(),
        duplicates = duplicates_removed,
        "Merged category outputs"
    );

    MergeOutcome {
        records,
        total_read,
        duplicates_removed,
    }
}

/// Merge the raw CSV files at `paths`, in order. Missing files are skipped.
pub fn merge_files(paths: &[PathBuf]) -> OutputResult<MergeOutcome> {
    let mut outputs = Vec::with_capacity(paths.len());
    for path in paths {
        if !path.exists() {
            debug!(path = %path.display(), "No raw output to merge");
            continue;
        }
        outputs.push(read_records(path)?);
    }
    Ok(merge(outputs))
}

/// Stable sort: area of delivery A–Z (case-insensitive, empty last), then
/// budget largest first (unparseable counts as zero).
pub fn sort_records(records: &mut [Record]) {
    records.sort_by(compare_records);
}

fn compare_records(a: &Record, b: &Record) -> Ordering {
    area_key(a)
        .cmp(&area_key(b))
        .then_with(|| budget_key(b).total_cmp(&budget_key(a)))
}

fn area_key(record: &Record) -> (bool, String) {
    let area = record.area_of_delivery.as_deref().unwrap_or("").trim();
    (area.is_empty(), area.to_uppercase())
}

fn budget_key(record: &Record) -> f64 {
    record
        .abc_php
        .as_deref()
        .and_then(normalize_currency)
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: Option<&str>, area: Option<&str>, abc: Option<&str>) -> Record {
        Record {
            ref_id: id.map(String::from),
            area_of_delivery: area.map(String::from),
            abc_php: abc.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_first_seen_wins() {
        let mut a = row(Some("1"), Some("Cebu"), Some("100"));
        a.title = Some("from packaging".into());
        let mut b = row(Some("1"), Some("Cebu"), Some("100"));
        b.title = Some("from printing".into());

        let outcome = merge(vec![vec![a], vec![b]]);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].title.as_deref(), Some("from packaging"));
        assert_eq!(outcome.total_read, 2);
        assert_eq!(outcome.duplicates_removed, 1);
    }

    #[test]
    fn test_rows_without_ref_id_are_kept() {
        let outcome = merge(vec![vec![row(None, None, None), row(None, None, None)]]);
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.duplicates_removed, 0);
    }

    #[test]
    fn test_sort_area_then_budget_desc() {
        let outcome = merge(vec![vec![
            row(Some("1"), Some("manila"), Some("1,000.00")),
            row(Some("2"), None, Some("999999")),
            row(Some("3"), Some("Cebu"), Some("50")),
            row(Some("4"), Some("Manila"), Some("PHP 5,000")),
            row(Some("5"), Some("Manila"), Some("n/a")),
            row(Some("6"), Some("  "), None),
        ]]);

        let ids: Vec<_> = outcome
            .records
            .iter()
            .map(|r| r.ref_id.as_deref().unwrap())
            .collect();
        assert_eq!(ids, vec!["3", "4", "1", "5", "2", "6"]);
    }

    #[test]
    fn test_sort_is_stable_for_equal_keys() {
        let mut records = vec![
            row(Some("b"), Some("Davao"), None),
            row(Some("a"), Some("DAVAO"), Some("0")),
        ];
        sort_records(&mut records);
        assert_eq!(records[0].ref_id.as_deref(), Some("b"));
    }
}
