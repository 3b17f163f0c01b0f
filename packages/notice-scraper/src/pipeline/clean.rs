//! Normalization pass over merged records.

use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::error::OutputResult;
use crate::normalize::{normalize_currency, normalize_date};
use crate::output::{read_records, write_records};
use crate::types::record::Record;

/// Before/after counts of populated values for one column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ColumnReport {
    pub original_valid: usize,
    pub cleaned_valid: usize,
    pub lost: usize,
}

impl ColumnReport {
    fn tally(&mut self, original: &Option<String>, cleaned: &Option<String>) {
        self.original_valid += usize::from(original.is_some());
        self.cleaned_valid += usize::from(cleaned.is_some());
        self.lost = self.original_valid.saturating_sub(self.cleaned_valid);
    }
}

/// Summary of one cleaning pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleaningReport {
    pub rows: usize,
    pub budget: ColumnReport,
    pub date_published: ColumnReport,
    pub closing_datetime: ColumnReport,
    pub last_updated: ColumnReport,
}

/// Normalize budget and date columns of one record.
///
/// The budget becomes a two-decimal amount; the three date columns become
/// `YYYY-MM-DD`. Values that do not parse are cleared.
pub fn clean_record(record: &Record) -> Record {
    Record {
        abc_php: record
            .abc_php
            .as_deref()
            .and_then(normalize_currency)
            .map(|amount| format!("{amount:.2}")),
        date_published: record.date_published.as_deref().and_then(normalize_date),
        closing_datetime: record.closing_datetime.as_deref().and_then(normalize_date),
        last_updated: record.last_updated.as_deref().and_then(normalize_date),
        ..record.clone()
    }
}

/// Clean every record and count what survived.
pub fn clean(records: &[Record]) -> (Vec<Record>, CleaningReport) {
    let mut report = CleaningReport {
        rows: records.len(),
        ..Default::default()
    };
    let cleaned: Vec<Record> = records
        .iter()
        .map(|original| {
            let cleaned = clean_record(original);
            report.budget.tally(&original.abc_php, &cleaned.abc_php);
            report
                .date_published
                .tally(&original.date_published, &cleaned.date_published);
            report
                .closing_datetime
                .tally(&original.closing_datetime, &cleaned.closing_datetime);
            report
                .last_updated
                .tally(&original.last_updated, &cleaned.last_updated);
            cleaned
        })
        .collect();
    (cleaned, report)
}

/// Read `input`, clean it, write `output`.
pub fn clean_file(input: &Path, output: &Path) -> OutputResult<CleaningReport> {
    let records = read_records(input)?;
    let (cleaned, report) = clean(&records);
    write_records(output, &cleaned)?;
    info!(
        rows = report.rows,
        budgets_lost = report.budget.lost,
        output = %output.display(),
        "Cleaned merged data"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_record() {
        let record = Record {
            ref_id: Some("42".into()),
            title: Some("Tarpaulin Printing".into()),
            abc_php: Some("55200.00".into()),
            date_published: Some("15/03/2024".into()),
            closing_datetime: Some("12/25/2024 10:00 AM".into()),
            last_updated: Some("soon".into()),
            ..Default::default()
        };

        let cleaned = clean_record(&record);
        assert_eq!(cleaned.abc_php.as_deref(), Some("55200.00"));
        assert_eq!(cleaned.date_published.as_deref(), Some("2024-03-15"));
        assert_eq!(cleaned.closing_datetime.as_deref(), Some("2024-12-25"));
        assert_eq!(cleaned.last_updated, None);
        assert_eq!(cleaned.title, record.title);
        assert_eq!(cleaned.ref_id, record.ref_id);
    }

    #[test]
    fn test_budget_formatting() {
        let record = Record {
            abc_php: Some("1000".into()),
            ..Default::default()
        };
        assert_eq!(clean_record(&record).abc_php.as_deref(), Some("1000.00"));
    }

    #[test]
    fn test_report_counts_lost_values() {
        let records = vec![
            Record {
                abc_php: Some("1,500".into()),
                last_updated: Some("not a date".into()),
                ..Default::default()
            },
            Record {
                abc_php: Some("TBA".into()),
                ..Default::default()
            },
            Record::default(),
        ];

        let (cleaned, report) = clean(&records);
        assert_eq!(cleaned.len(), 3);
        assert_eq!(report.rows, 3);
        assert_eq!(
            report.budget,
            ColumnReport {
                original_valid: 2,
                cleaned_valid: 1,
                lost: 1
            }
        );
        assert_eq!(report.last_updated.lost, 1);
        assert_eq!(report.date_published, ColumnReport::default());
    }
}
