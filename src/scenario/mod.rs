//! Scenario input, the scenario trait, and the sequential suite runner.

pub mod checks;

use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use tracing::{error, info};

use crate::browser::Session;
use crate::error::{CheckError, CheckResult};
use crate::models::{FilterCriteria, Outcome, ScenarioReport, ScenarioSummary, SearchCriteria};

/// Ordered key/value rows, the shape scenario parameters arrive in.
#[derive(Debug, Clone, Default)]
pub struct Table {
    rows: Vec<(String, String)>,
}

impl Table {
    pub fn from_rows<K: Into<String>, V: Into<String>>(
        rows: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        Self {
            rows: rows
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.rows
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn keys(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|(k, _)| k.as_str())
    }
}

fn reject_unknown_keys(table: &Table, known: &[&str]) -> CheckResult<()> {
    for key in table.keys() {
        if !known.contains(&key) {
            return Err(CheckError::InvalidScenario(format!(
                "unrecognized row {key:?} (expected one of {known:?})"
            )));
        }
    }
    Ok(())
}

fn required<'t>(table: &'t Table, key: &str) -> CheckResult<&'t str> {
    table
        .get(key)
        .ok_or_else(|| CheckError::InvalidScenario(format!("missing required row {key:?}")))
}

/// "one week ahead", "two weeks ahead", "N days ahead" or a plain integer.
fn parse_day_offset(value: &str) -> CheckResult<i64> {
    let normalized = value.trim().to_lowercase();
    if let Ok(days) = normalized.parse::<i64>() {
        return Ok(days);
    }
    match normalized.as_str() {
        "today" => return Ok(0),
        "one week ahead" => return Ok(7),
        "two weeks ahead" => return Ok(14),
        _ => {}
    }
    if let Some(prefix) = normalized.strip_suffix(" days ahead") {
        if let Ok(days) = prefix.trim().parse::<i64>() {
            return Ok(days);
        }
    }
    Err(CheckError::InvalidScenario(format!(
        "unrecognized day offset {value:?}"
    )))
}

fn parse_count_field(value: &str, key: &str) -> CheckResult<u32> {
    value.trim().parse().map_err(|_| {
        CheckError::InvalidScenario(format!("row {key:?} is not a count: {value:?}"))
    })
}

/// Build validated search criteria out of a scenario table.
pub fn parse_search_criteria(location: &str, table: &Table) -> CheckResult<SearchCriteria> {
    reject_unknown_keys(table, &["Check-In", "Check-Out", "Adults", "Children"])?;

    if location.trim().is_empty() {
        return Err(CheckError::InvalidScenario("empty location".into()));
    }
    let check_in_offset_days = parse_day_offset(required(table, "Check-In")?)?;
    let check_out_offset_days = parse_day_offset(required(table, "Check-Out")?)?;
    if check_out_offset_days <= check_in_offset_days {
        return Err(CheckError::InvalidScenario(format!(
            "check-out (+{check_out_offset_days}d) must come after check-in (+{check_in_offset_days}d)"
        )));
    }
    let adults = parse_count_field(required(table, "Adults")?, "Adults")?;
    if adults == 0 {
        return Err(CheckError::InvalidScenario(
            "a search needs at least one adult".into(),
        ));
    }
    let children = match table.get("Children") {
        Some(value) => parse_count_field(value, "Children")?,
        None => 0,
    };

    Ok(SearchCriteria {
        location: location.trim().to_string(),
        check_in_offset_days,
        check_out_offset_days,
        adults,
        children,
    })
}

/// Build validated filter criteria out of a scenario table.
pub fn parse_filter_criteria(table: &Table) -> CheckResult<FilterCriteria> {
    reject_unknown_keys(table, &["Bedrooms", "Amenities"])?;

    let min_bedrooms = table
        .get("Bedrooms")
        .map(|value| parse_count_field(value, "Bedrooms"))
        .transpose()?;
    let amenities = table
        .get("Amenities")
        .map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(FilterCriteria {
        min_bedrooms,
        amenities,
    })
}

/// One validated behavior of the target site.
#[async_trait]
pub trait Scenario: Send + Sync {
    fn name(&self) -> &str;

    /// Drive the scenario against the shared session, accumulating evidence
    /// into `summary` as it goes so skips and extracted values survive a
    /// failure.
    async fn run(&self, session: &Session, summary: &mut ScenarioSummary) -> CheckResult<()>;
}

/// Run every scenario strictly sequentially against the one shared session
/// and write the machine-readable reports.
pub async fn run_suite(
    session: &Session,
    scenarios: &[Box<dyn Scenario>],
    report_dir: &Path,
) -> CheckResult<Vec<ScenarioReport>> {
    let mut reports = Vec::new();

    for scenario in scenarios {
        info!("━━━ Scenario: {} ━━━", scenario.name());
        let mut summary = ScenarioSummary::default();

        let outcome = match scenario.run(session, &mut summary).await {
            Ok(()) => {
                info!(
                    "Scenario '{}' passed ({} listings checked, {} skipped)",
                    scenario.name(),
                    summary.listings_checked,
                    summary.skipped
                );
                Outcome::Passed
            }
            Err(CheckError::AssertionFailed(reason)) => {
                error!("Scenario '{}' failed: {}", scenario.name(), reason);
                Outcome::Failed(reason)
            }
            Err(err) => {
                error!("Scenario '{}' aborted: {}", scenario.name(), err);
                Outcome::Errored(err.to_string())
            }
        };

        reports.push(ScenarioReport {
            name: scenario.name().to_string(),
            outcome,
            summary,
            finished_at: Utc::now(),
        });
    }

    write_reports(&reports, report_dir).await?;
    Ok(reports)
}

async fn write_reports(reports: &[ScenarioReport], report_dir: &Path) -> CheckResult<()> {
    tokio::fs::create_dir_all(report_dir)
        .await
        .context("Failed to create the report directory")?;

    for report in reports {
        let path = report_dir.join(format!("{}.json", file_stem(&report.name)));
        let json = serde_json::to_string_pretty(report).context("Report serialization failed")?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    let aggregate = report_dir.join("report.json");
    let json = serde_json::to_string_pretty(reports).context("Report serialization failed")?;
    tokio::fs::write(&aggregate, json)
        .await
        .with_context(|| format!("Failed to write {}", aggregate.display()))?;
    info!("Saved {} scenario reports to {}", reports.len(), report_dir.display());
    Ok(())
}

fn file_stem(name: &str) -> String {
    let mut stem = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            stem.push(ch.to_ascii_lowercase());
        } else if !stem.ends_with('_') {
            stem.push('_');
        }
    }
    stem.trim_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn search_table() -> Table {
        Table::from_rows([
            ("Check-In", "one week ahead"),
            ("Check-Out", "two weeks ahead"),
            ("Adults", "2"),
            ("Children", "1"),
        ])
    }

    #[test]
    fn well_formed_search_table_parses() {
        let criteria = parse_search_criteria("Rome", &search_table()).unwrap();
        assert_eq!(criteria.location, "Rome");
        assert_eq!(criteria.check_in_offset_days, 7);
        assert_eq!(criteria.check_out_offset_days, 14);
        assert_eq!(criteria.adults, 2);
        assert_eq!(criteria.children, 1);
    }

    #[test]
    fn day_offsets_accept_all_documented_shapes() {
        assert_eq!(parse_day_offset("one week ahead").unwrap(), 7);
        assert_eq!(parse_day_offset("Two Weeks Ahead").unwrap(), 14);
        assert_eq!(parse_day_offset("3 days ahead").unwrap(), 3);
        assert_eq!(parse_day_offset("21").unwrap(), 21);
        assert_eq!(parse_day_offset("today").unwrap(), 0);
        assert!(parse_day_offset("next blue moon").is_err());
    }

    #[test]
    fn unknown_rows_are_rejected_at_parse_time() {
        let table = Table::from_rows([
            ("Check-In", "one week ahead"),
            ("Check-Out", "two weeks ahead"),
            ("Adults", "2"),
            ("Pets", "1"),
        ]);
        let err = parse_search_criteria("Rome", &table).unwrap_err();
        assert!(matches!(err, CheckError::InvalidScenario(_)));
        assert!(err.to_string().contains("Pets"));
    }

    #[test]
    fn malformed_counts_are_rejected() {
        let table = Table::from_rows([
            ("Check-In", "one week ahead"),
            ("Check-Out", "two weeks ahead"),
            ("Adults", "a couple"),
        ]);
        assert!(parse_search_criteria("Rome", &table).is_err());
    }

    #[test]
    fn inverted_date_ranges_are_rejected() {
        let table = Table::from_rows([
            ("Check-In", "two weeks ahead"),
            ("Check-Out", "one week ahead"),
            ("Adults", "2"),
        ]);
        let err = parse_search_criteria("Rome", &table).unwrap_err();
        assert!(err.to_string().contains("check-out"));
    }

    #[test]
    fn empty_location_is_rejected() {
        assert!(parse_search_criteria("  ", &search_table()).is_err());
    }

    #[test]
    fn filter_table_parses_bedrooms_and_amenity_list() {
        let table = Table::from_rows([("Bedrooms", "2"), ("Amenities", "Pool, Wifi , ")]);
        let filters = parse_filter_criteria(&table).unwrap();
        assert_eq!(filters.min_bedrooms, Some(2));
        assert_eq!(filters.amenities, vec!["Pool", "Wifi"]);
    }

    #[test]
    fn filter_rows_are_optional() {
        let filters = parse_filter_criteria(&Table::default()).unwrap();
        assert_eq!(filters.min_bedrooms, None);
        assert!(filters.amenities.is_empty());
    }

    #[test]
    fn report_file_names_are_slugs() {
        assert_eq!(
            file_stem("Search applies the requested criteria"),
            "search_applies_the_requested_criteria"
        );
        assert_eq!(file_stem("bedrooms >= 2 (filtered)"), "bedrooms_2_filtered");
    }
}
