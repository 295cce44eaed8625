use std::path::Path;

use stay_check::scenario::{checks, run_suite};
use stay_check::{Session, SessionConfig};
use tracing::{info, Level};
use tracing_subscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    info!("🏨 Stay Check - listing site end-to-end checks");
    info!("==============================================");
    info!("");

    let config = SessionConfig::from_env();
    info!("Target site: {}", config.base_url);

    // One browser session for the whole run, torn down exactly once.
    let session = Session::launch(&config)?;
    let scenarios = checks::default_suite(&config)?;

    let reports = run_suite(&session, &scenarios, Path::new("reports")).await?;
    drop(session);

    println!();
    for (i, report) in reports.iter().enumerate() {
        let status = if report.outcome.passed() { "PASS" } else { "FAIL" };
        println!("{}. [{}] {}", i + 1, status, report.name);
        println!(
            "   {} listings checked, {} skipped",
            report.summary.listings_checked, report.summary.skipped
        );
        for note in &report.summary.notes {
            println!("   - {}", note);
        }
        println!();
    }

    let failed = reports.iter().filter(|r| !r.outcome.passed()).count();
    if failed > 0 {
        anyhow::bail!("{failed} of {} scenarios did not pass", reports.len());
    }
    info!("✅ All {} scenarios passed", reports.len());
    Ok(())
}
