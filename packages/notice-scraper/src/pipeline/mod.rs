//! Post-scrape data pipeline: merge category outputs, then normalize.

pub mod clean;
pub mod merge;

pub use clean::{clean, clean_file, clean_record, CleaningReport, ColumnReport};
pub use merge::{merge, merge_files, sort_records, MergeOutcome};
