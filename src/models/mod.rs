use chrono::{DateTime, Duration, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// What to search for, built once per scenario from tabular input and
/// immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub location: String,
    pub check_in_offset_days: i64,
    pub check_out_offset_days: i64,
    pub adults: u32,
    pub children: u32,
}

impl SearchCriteria {
    pub fn check_in_date(&self) -> NaiveDate {
        future_date(self.check_in_offset_days)
    }

    pub fn check_out_date(&self) -> NaiveDate {
        future_date(self.check_out_offset_days)
    }
}

/// The site's calendar cells are addressed by MM/DD/YYYY test ids.
pub fn calendar_cell_id(date: NaiveDate) -> String {
    date.format("%m/%d/%Y").to_string()
}

fn future_date(days_ahead: i64) -> NaiveDate {
    Local::now().date_naive() + Duration::days(days_ahead)
}

/// Result-narrowing filters applied after the initial search.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterCriteria {
    pub min_bedrooms: Option<u32>,
    pub amenities: Vec<String>,
}

/// One search result worth inspecting.
///
/// Card element handles go stale as soon as the page navigates, so a listing
/// is carried as its position on the results page plus the absolute details
/// URL; cards are re-queried after any navigation boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingRef {
    pub index: usize,
    pub url: String,
}

impl std::fmt::Display for ListingRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "listing #{} ({})", self.index + 1, self.url)
    }
}

/// How a scenario ended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "reason")]
pub enum Outcome {
    /// Every checked listing satisfied the scenario's expectations.
    Passed,
    /// A recovered fact violated an expected invariant.
    Failed(String),
    /// A setup step failed; the scenario could not run to completion.
    Errored(String),
}

impl Outcome {
    pub fn passed(&self) -> bool {
        matches!(self, Outcome::Passed)
    }
}

/// Per-scenario tallies accumulated while the scenario runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScenarioSummary {
    /// Listings actually verified against the scenario's expectations.
    pub listings_checked: usize,
    /// Listings skipped after a per-listing infrastructure failure or an
    /// unknown attribute.
    pub skipped: usize,
    /// Human-readable notes (skip reasons, extracted values) kept for the
    /// report so a failure can be diagnosed without re-running against the
    /// live site.
    pub notes: Vec<String>,
}

impl ScenarioSummary {
    pub fn note(&mut self, line: impl Into<String>) {
        self.notes.push(line.into());
    }
}

/// Machine-readable record of one scenario run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub name: String,
    pub outcome: Outcome,
    #[serde(flatten)]
    pub summary: ScenarioSummary,
    pub finished_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_map_to_future_dates() {
        let criteria = SearchCriteria {
            location: "Rome".into(),
            check_in_offset_days: 7,
            check_out_offset_days: 14,
            adults: 2,
            children: 1,
        };
        let span = criteria.check_out_date() - criteria.check_in_date();
        assert_eq!(span.num_days(), 7);
        assert!(criteria.check_in_date() > Local::now().date_naive());
    }

    #[test]
    fn calendar_ids_are_zero_padded() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 5).unwrap();
        assert_eq!(calendar_cell_id(date), "03/05/2026");
    }

    #[test]
    fn listing_display_is_one_based() {
        let listing = ListingRef {
            index: 0,
            url: "https://stays.example/rooms/42".into(),
        };
        assert_eq!(
            listing.to_string(),
            "listing #1 (https://stays.example/rooms/42)"
        );
    }

    #[test]
    fn report_serializes_with_flattened_summary() {
        let report = ScenarioReport {
            name: "search".into(),
            outcome: Outcome::Failed("2 bedrooms < 3".into()),
            summary: ScenarioSummary {
                listings_checked: 4,
                skipped: 1,
                notes: vec!["listing #2: bedrooms unknown".into()],
            },
            finished_at: Utc::now(),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outcome"]["kind"], "Failed");
        assert_eq!(json["listings_checked"], 4);
        assert_eq!(json["notes"][0], "listing #2: bedrooms unknown");
    }
}
