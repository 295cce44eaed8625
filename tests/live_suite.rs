//! End-to-end runs against the live site.
//!
//! These drive a real search in a real browser and depend on network access,
//! a local Chrome/Chromium, and the third party keeping its DOM contract.
//!
//! Run with: cargo test --test live_suite -- --ignored --nocapture

use stay_check::scenario::{checks, run_suite};
use stay_check::{Session, SessionConfig};

#[tokio::test]
#[ignore = "requires network, a local Chrome/Chromium, and the live site"]
async fn default_suite_runs_and_reports() {
    let config = SessionConfig::from_env();
    let session = Session::launch(&config).expect("Chrome should launch");
    let scenarios = checks::default_suite(&config).expect("suite input is well-formed");

    let report_dir = std::env::temp_dir().join("stay-check-live-reports");
    let reports = run_suite(&session, &scenarios, &report_dir)
        .await
        .expect("the suite should run to completion");

    assert_eq!(reports.len(), scenarios.len());
    assert!(report_dir.join("report.json").exists());
    for report in &reports {
        println!("{}: {:?}", report.name, report.outcome);
        for note in &report.summary.notes {
            println!("  - {note}");
        }
        assert!(
            report.outcome.passed(),
            "scenario '{}' did not pass: {:?}",
            report.name,
            report.outcome
        );
    }
}
