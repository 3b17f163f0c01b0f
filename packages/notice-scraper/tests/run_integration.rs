//! Whole-run behavior with a file-based config and partial failure.

use std::io::Write;
use std::sync::Arc;

use notice_scraper::output::read_records;
use notice_scraper::testing::MockEngine;
use notice_scraper::types::category::BASE_URL;
use notice_scraper::{Catalog, CrawlSettings, NullProgress, Orchestrator, RunConfig};

const DETAIL: &str =
    "https://notices.philgeps.gov.ph/GEPSNONPILOT/Tender/SplashBidNoticeAbstractUI.aspx";

fn listing(ids: &[u32]) -> String {
    ids.iter()
        .map(|id| format!(r#"<a href="SplashBidNoticeAbstractUI.aspx?refID={id}">{id}</a>"#))
        .collect()
}

fn detail(id: u32, budget: &str, published: &str) -> String {
    format!(
        r#"<table>
          <tr><td><span>Reference Number</span></td><td>{id}</td></tr>
          <tr><td><span>Area of Delivery</span></td><td>Quezon City</td></tr>
          <tr><td><span>Approved Budget for the Contract</span></td><td>{budget}</td></tr>
          <tr><td><span>Date Published</span></td><td>{published}</td></tr>
        </table>"#
    )
}

#[tokio::test]
async fn test_partial_success_still_produces_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let mut config_file = tempfile::NamedTempFile::new().unwrap();
    write!(
        config_file,
        r#"{{
            "categories": ["tokens", "Educational"],
            "delay": 0,
            "retry_count": 1,
            "retry_backoff": 0,
            "output_dir": "{}"
        }}"#,
        dir.path().display()
    )
    .unwrap();

    let tokens = Catalog::builtin().get(129).unwrap().listing_url();
    let engine = MockEngine::new()
        .with_page(BASE_URL, "home")
        .with_page(tokens, listing(&[10, 11]))
        .with_page(format!("{DETAIL}?refID=10"), detail(10, "₱ 2,500.00", "3/4/2024"))
        .with_page(format!("{DETAIL}?refID=11"), detail(11, "TBA", "31/12/2023"));

    let config = RunConfig::from_file(config_file.path()).unwrap();
    let results = Orchestrator::new(Arc::new(engine.clone()), config)
        .with_progress(Arc::new(NullProgress))
        .with_crawl_settings(CrawlSettings::default().without_delays())
        .run()
        .await
        .unwrap();

    assert_eq!(results.successful, vec![129]);
    assert_eq!(
        results.failed,
        vec![(134, "No links found for Educational".to_string())]
    );
    assert_eq!(results.merged_entries, 2);

    let rows = read_records(results.final_output.as_ref().unwrap()).unwrap();
    assert_eq!(rows[0].ref_id.as_deref(), Some("10"));
    assert_eq!(rows[0].abc_php.as_deref(), Some("2500.00"));
    assert_eq!(rows[0].date_published.as_deref(), Some("2024-04-03"));
    assert_eq!(rows[1].abc_php, None);
    assert_eq!(rows[1].date_published.as_deref(), Some("2023-12-31"));

    let report = std::fs::read_to_string(results.report.as_ref().unwrap()).unwrap();
    assert!(report.contains("OK    Tokens: scraped successfully"));
    assert!(report.contains("FAIL  Educational: No links found for Educational"));
    assert!(report.contains("merged_cleaned.csv"));

    assert_eq!(engine.open_sessions(), 0);
}

#[tokio::test]
async fn test_merge_failure_still_writes_report() {
    let dir = tempfile::tempdir().unwrap();
    // A directory where the merged file belongs makes the merge write fail
    std::fs::create_dir_all(dir.path().join("merged").join("merged.csv")).unwrap();

    let tokens = Catalog::builtin().get(129).unwrap().listing_url();
    let engine = MockEngine::new()
        .with_page(BASE_URL, "home")
        .with_page(tokens, listing(&[10]))
        .with_page(format!("{DETAIL}?refID=10"), detail(10, "1,000", "3/4/2024"));

    let config = RunConfig::new()
        .with_categories(["Tokens"])
        .with_delay(0.0)
        .with_output_dir(dir.path().to_path_buf());
    let results = Orchestrator::new(Arc::new(engine.clone()), config)
        .with_progress(Arc::new(NullProgress))
        .with_crawl_settings(CrawlSettings::default().without_delays())
        .run()
        .await
        .unwrap();

    assert_eq!(results.successful, vec![129]);
    assert_eq!(results.final_output, None);
    assert!(results.merge_error.is_some());

    let reports: Vec<_> = std::fs::read_dir(dir.path().join("reports"))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(reports.len(), 1);

    let report = std::fs::read_to_string(results.report.as_ref().unwrap()).unwrap();
    assert!(report.contains("OK    Tokens: scraped successfully"));
    assert!(report.contains("Final file: none (merge failed:"));
    assert_eq!(engine.open_sessions(), 0);
}

#[test]
fn test_zero_workers_rejected_before_work() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{"max_detail_workers": 0}}"#).unwrap();

    assert!(RunConfig::from_file(file.path()).is_err());
}
