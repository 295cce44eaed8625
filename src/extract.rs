//! Recovering typed numeric facts from free-form label text.
//!
//! Listing cards and detail pages describe capacity in human-readable labels
//! ("3 bedrooms · 2 bathrooms", "6 guests"). The extractor scans a bounded
//! region for the first label mentioning a keyword and parses the count out
//! of it. Absence is a valid sentinel, never an error: callers decide whether
//! to widen scope (details page) or record the attribute as unknown.

use regex::Regex;
use scraper::{Html, Selector};

use crate::error::CheckResult;

/// Parse `<digits> <keyword>s?` out of a label, case-insensitively.
///
/// The spelled-out singular ("one bedroom") is accepted as the literal value
/// 1. Returns `None` when nothing matches.
pub fn parse_count(text: &str, keyword: &str) -> Option<u32> {
    let kw = regex::escape(keyword);

    let counted = Regex::new(&format!(r"(?i)(\d+)\s+{kw}s?\b")).unwrap();
    if let Some(caps) = counted.captures(text) {
        return caps[1].parse().ok();
    }

    let singular = Regex::new(&format!(r"(?i)\bone\s+{kw}\b")).unwrap();
    if singular.is_match(text) {
        return Some(1);
    }

    None
}

/// Parse the leading digits of a stepper's displayed value ("2", "12+").
pub fn leading_count(text: &str) -> Option<u32> {
    let digits: String = text
        .trim()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

/// Pick the first label containing `keyword` (case-insensitive) and parse a
/// count out of it.
pub fn count_from_labels<'a>(
    labels: impl IntoIterator<Item = &'a str>,
    keyword: &str,
) -> Option<u32> {
    let needle = keyword.to_lowercase();
    labels
        .into_iter()
        .find(|label| label.to_lowercase().contains(&needle))
        .and_then(|label| parse_count(label, keyword))
}

/// Scoped DOM-region extraction: enumerate label-like nodes inside an HTML
/// fragment and parse the first one mentioning the keyword.
pub fn count_in_fragment(html: &str, label_selector: &str, keyword: &str) -> Option<u32> {
    let fragment = Html::parse_fragment(html);
    let selector = Selector::parse(label_selector).unwrap();

    let labels: Vec<String> = fragment
        .select(&selector)
        .map(|node| node.text().collect::<Vec<_>>().join(" "))
        .collect();

    count_from_labels(labels.iter().map(String::as_str), keyword)
}

/// Outcome of a two-tier extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    pub value: Option<T>,
    /// Whether the secondary source supplied the value (or its absence).
    pub via_fallback: bool,
}

/// Two-tier extraction: cheap local scan first, expensive wider scan second.
///
/// The secondary source runs at most once, and only when the primary one
/// yields absent; whatever it produces is final. Errors from either tier
/// propagate untouched.
pub fn resolve_with_fallback<T>(
    primary: impl FnOnce() -> CheckResult<Option<T>>,
    secondary: impl FnOnce() -> CheckResult<Option<T>>,
) -> CheckResult<Resolved<T>> {
    if let Some(value) = primary()? {
        return Ok(Resolved {
            value: Some(value),
            via_fallback: false,
        });
    }
    Ok(Resolved {
        value: secondary()?,
        via_fallback: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plural_counts_parse() {
        assert_eq!(parse_count("3 bedrooms · 2 bathrooms", "bedroom"), Some(3));
        assert_eq!(parse_count("Sleeps 6 guests comfortably", "guest"), Some(6));
        assert_eq!(parse_count("12 bedrooms", "bedroom"), Some(12));
    }

    #[test]
    fn singular_forms_parse_to_one() {
        assert_eq!(parse_count("1 bedroom", "bedroom"), Some(1));
        assert_eq!(parse_count("cosy flat with one bedroom", "bedroom"), Some(1));
        assert_eq!(parse_count("1 guest", "guest"), Some(1));
    }

    #[test]
    fn keyword_matching_is_case_insensitive() {
        assert_eq!(parse_count("4 Bedrooms · garden view", "bedroom"), Some(4));
        assert_eq!(parse_count("8 GUESTS", "guest"), Some(8));
    }

    #[test]
    fn no_match_is_absent_not_an_error() {
        assert_eq!(parse_count("Entire rental unit", "bedroom"), None);
        assert_eq!(parse_count("bedrooms galore", "bedroom"), None);
        assert_eq!(parse_count("", "guest"), None);
        // A different keyword's count must not leak through.
        assert_eq!(parse_count("2 bathrooms", "bedroom"), None);
    }

    #[test]
    fn stepper_values_parse_their_leading_digits() {
        assert_eq!(leading_count("2"), Some(2));
        assert_eq!(leading_count("12+"), Some(12));
        assert_eq!(leading_count("  3 \n"), Some(3));
        assert_eq!(leading_count("Add"), None);
        assert_eq!(leading_count(""), None);
    }

    #[test]
    fn extraction_is_idempotent() {
        let text = "3 bedrooms · 2 bathrooms";
        assert_eq!(
            parse_count(text, "bedroom"),
            parse_count(text, "bedroom"),
        );
    }

    #[test]
    fn first_matching_label_wins() {
        let labels = ["Stay in Trastevere", "2 beds", "4 bedrooms", "7 bedrooms"];
        assert_eq!(count_from_labels(labels, "bedroom"), Some(4));
    }

    #[test]
    fn label_without_parsable_count_yields_absent() {
        // The label mentions the keyword but carries no digits, and the scan
        // does not fall through to later labels.
        let labels = ["bedroom linens provided", "5 bedrooms"];
        assert_eq!(count_from_labels(labels, "bedroom"), None);
    }

    #[test]
    fn fragment_extraction_reads_subtitle_spans() {
        let html = r#"
            <div data-testid="card-container">
              <span data-testid="listing-card-subtitle">Stay near the Colosseum</span>
              <span data-testid="listing-card-subtitle">3 bedrooms &middot; 2 bathrooms</span>
            </div>
        "#;
        assert_eq!(
            count_in_fragment(html, r#"[data-testid="listing-card-subtitle"]"#, "bedroom"),
            Some(3)
        );
        assert_eq!(
            count_in_fragment(html, r#"[data-testid="listing-card-subtitle"]"#, "guest"),
            None
        );
    }

    #[test]
    fn fragment_with_no_labels_yields_absent() {
        assert_eq!(
            count_in_fragment("<div><p>no subtitles here</p></div>", "li", "bedroom"),
            None
        );
    }

    #[test]
    fn fallback_is_skipped_when_primary_resolves() {
        let mut secondary_calls = 0;
        let resolved = resolve_with_fallback(
            || Ok(Some(3)),
            || {
                secondary_calls += 1;
                Ok(Some(99))
            },
        )
        .unwrap();
        assert_eq!(resolved.value, Some(3));
        assert!(!resolved.via_fallback);
        assert_eq!(secondary_calls, 0);
    }

    #[test]
    fn fallback_runs_exactly_once_and_its_value_wins() {
        let mut secondary_calls = 0;
        let resolved = resolve_with_fallback(
            || Ok(None),
            || {
                secondary_calls += 1;
                Ok(Some(4))
            },
        )
        .unwrap();
        assert_eq!(resolved.value, Some(4));
        assert!(resolved.via_fallback);
        assert_eq!(secondary_calls, 1);
    }

    #[test]
    fn absence_through_both_tiers_stays_absent() {
        let resolved = resolve_with_fallback(
            || -> CheckResult<Option<u32>> { Ok(None) },
            || Ok(None),
        )
        .unwrap();
        assert_eq!(resolved.value, None);
        assert!(resolved.via_fallback);
    }

    #[test]
    fn fallback_errors_propagate() {
        let result = resolve_with_fallback(
            || -> CheckResult<Option<u32>> { Ok(None) },
            || {
                Err(crate::error::CheckError::RegionNotFound {
                    region: "overview".into(),
                })
            },
        );
        assert!(matches!(
            result,
            Err(crate::error::CheckError::RegionNotFound { .. })
        ));
    }
}
