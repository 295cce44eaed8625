//! The results page: cards, the filter modal, and the map panel.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::browser::{self, Session};
use crate::error::{CheckError, CheckResult};
use crate::extract;
use crate::models::ListingRef;

const CARD: &str = r#"[data-testid="card-container"]"#;
const CARD_SUBTITLE: &str = r#"[data-testid="listing-card-subtitle"]"#;
const LOCATION_CHIP: &str = r#"[data-testid="little-search-location"] div"#;
const FILTERS_BUTTON: &str = r#"[data-testid="category-bar-filter-button"]"#;
const FILTERS_MODAL: &str = r#"[data-testid="modal-container"]"#;
const MIN_BEDROOMS_INCREASE: &str =
    r#"[data-testid="stepper-filter-item-min_bedrooms-stepper-increase-button"]"#;
const MIN_BEDROOMS_VALUE: &str =
    r#"[data-testid="stepper-filter-item-min_bedrooms-stepper-value"]"#;
const AMENITIES_SECTION: &str = r#"[aria-labelledby="filter-section-heading-id-FILTER_SECTION_CONTAINER:MORE_FILTERS_AMENITIES_WITH_SUBCATEGORIES"]"#;
const MAP_PIN: &str = r#"[data-testid="map/markers/BasePillMarker"]"#;

pub struct ResultsPage<'s> {
    session: &'s Session,
    /// Origin used to absolutize relative card links.
    origin: String,
}

impl<'s> ResultsPage<'s> {
    pub fn new(session: &'s Session, base_url: &str) -> Self {
        Self {
            session,
            origin: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Wait until at least `min` result cards are on the page.
    pub fn wait_for_cards(&self, min: usize) -> CheckResult<()> {
        let tab = self.session.root();
        self.session
            .poller()
            .poll_for(&format!("at least {min} result cards"), || {
                Ok(browser::count_of(tab, CARD)? >= min)
            })
    }

    /// Final text of the location chip, read only after its placeholder
    /// spans have drained away.
    pub fn location_chip_text(&self) -> CheckResult<String> {
        let tab = self.session.root();
        let poller = self.session.poller();

        poller.poll_for("the location chip to finish rendering", || {
            let spans = browser::count_of(tab, &format!("{LOCATION_CHIP} span"))?;
            Ok(browser::exists(tab, LOCATION_CHIP)? && spans == 0)
        })?;

        poller.poll_until("the location chip to carry text", || {
            Ok(browser::inner_text(tab, LOCATION_CHIP)?.filter(|text| !text.is_empty()))
        })
    }

    /// Collect the first `max` listings as stable `{index, url}` references.
    ///
    /// Cards without a usable link are skipped with a log line; they cannot
    /// be inspected any further.
    pub fn collect_listings(&self, max: usize) -> CheckResult<Vec<ListingRef>> {
        let tab = self.session.root();
        let script = format!(
            r"(() => {{
                const cards = Array.from(document.querySelectorAll({card})).slice(0, {max});
                return JSON.stringify(cards.map(card => {{
                    const link = card.querySelector('a');
                    return link === null ? null : link.getAttribute('href');
                }}));
            }})()",
            card = serde_json::to_string(CARD).unwrap_or_else(|_| "''".to_string()),
            max = max,
        );

        let raw = match browser::eval(tab, &script)? {
            Value::String(json) => json,
            _ => return Ok(Vec::new()),
        };
        let hrefs: Vec<Option<String>> = serde_json::from_str(&raw)
            .map_err(|err| anyhow::anyhow!("card link harvest returned bad JSON: {err}"))?;

        let mut listings = Vec::new();
        for (index, href) in hrefs.into_iter().enumerate() {
            match href {
                Some(href) => listings.push(ListingRef {
                    index,
                    url: absolutize(&self.origin, &href),
                }),
                None => warn!("Card #{} has no link, skipping it", index + 1),
            }
        }
        info!("Collected {} listing URLs", listings.len());
        Ok(listings)
    }

    /// Card-level bedroom extraction: scan the card's subtitle labels.
    ///
    /// `Ok(None)` means the card carries no parsable bedroom label; callers
    /// fall back to the details page. A card that is no longer on the page at
    /// all is a missing region.
    pub fn bedrooms_on_card(&self, index: usize) -> CheckResult<Option<u32>> {
        let tab = self.session.root();
        let html = browser::outer_html_at(tab, CARD, index)?.ok_or_else(|| {
            CheckError::RegionNotFound {
                region: format!("result card #{}", index + 1),
            }
        })?;
        let count = extract::count_in_fragment(&html, CARD_SUBTITLE, "bedroom");
        debug!("Card #{} bedroom label parsed to {:?}", index + 1, count);
        Ok(count)
    }

    /// Open the filter modal.
    pub fn open_filters(&self) -> CheckResult<()> {
        let tab = self.session.root();
        let poller = self.session.poller();

        info!("Opening the filters modal...");
        poller.poll_for("the filters button to become interactable", || {
            browser::interactable(tab, FILTERS_BUTTON)
        })?;
        tab.find_element(FILTERS_BUTTON)?.click()?;
        poller.poll_for("the filters modal to open", || {
            browser::visible(tab, FILTERS_MODAL)
        })
    }

    /// Raise the minimum-bedrooms stepper to `bedrooms`, confirming every
    /// click against the displayed value.
    pub fn set_min_bedrooms(&self, bedrooms: u32) -> CheckResult<()> {
        let tab = self.session.root();
        let poller = self.session.poller();

        info!("Setting minimum bedrooms to {}", bedrooms);
        for next in 1..=bedrooms {
            poller.poll_for("the bedrooms stepper to become interactable", || {
                browser::interactable(tab, MIN_BEDROOMS_INCREASE)
            })?;
            tab.find_element(MIN_BEDROOMS_INCREASE)?.click()?;
            poller.poll_for(&format!("the bedrooms stepper to read {next}"), || {
                let text = browser::inner_text(tab, MIN_BEDROOMS_VALUE)?;
                Ok(text.as_deref().and_then(extract::leading_count) == Some(next))
            })?;
        }
        Ok(())
    }

    /// Toggle each named amenity chip inside the amenities section,
    /// expanding the section's "Show more" fold first when present.
    pub fn select_amenities(&self, amenities: &[String]) -> CheckResult<()> {
        if amenities.is_empty() {
            return Ok(());
        }
        let tab = self.session.root();
        let poller = self.session.poller();

        poller
            .poll_for("the amenities section to appear", || {
                browser::exists(tab, AMENITIES_SECTION)
            })
            .map_err(|err| browser::as_region(err, "the amenities filter section"))?;

        if browser::click_by_text(tab, AMENITIES_SECTION, "button", "show more", true)? {
            debug!("Expanded the amenities section");
        }

        for amenity in amenities {
            info!("Selecting amenity: {}", amenity);
            if !browser::click_by_text(tab, AMENITIES_SECTION, "button", amenity, true)? {
                return Err(CheckError::RegionNotFound {
                    region: format!("amenity chip '{amenity}'"),
                });
            }
            poller.poll_for(&format!("the '{amenity}' chip to report selected"), || {
                amenity_pressed(tab, amenity)
            })?;
        }
        Ok(())
    }

    /// Clear every applied filter from the modal footer.
    pub fn clear_filters(&self) -> CheckResult<()> {
        let tab = self.session.root();
        info!("Clearing all filters...");
        if !browser::click_by_text(tab, FILTERS_MODAL, "button", "clear all", true)? {
            return Err(CheckError::RegionNotFound {
                region: "the 'Clear all' button".to_string(),
            });
        }
        Ok(())
    }

    /// Apply the filters via the modal's footer link and wait for the modal
    /// to close over the refreshed results.
    pub fn show_stays(&self) -> CheckResult<()> {
        let tab = self.session.root();
        info!("Applying filters...");
        if !browser::click_by_text(tab, "footer", "a", "show", false)? {
            return Err(CheckError::RegionNotFound {
                region: "the footer 'Show stays' link".to_string(),
            });
        }
        self.session
            .poller()
            .poll_for("the filters modal to close", || {
                Ok(!browser::exists(tab, FILTERS_MODAL)?)
            })
    }

    /// Number of pins the map panel is currently showing.
    pub fn map_pin_count(&self) -> CheckResult<usize> {
        browser::count_of(self.session.root(), MAP_PIN)
    }
}

fn absolutize(origin: &str, href: &str) -> String {
    if href.starts_with("http") {
        href.to_string()
    } else {
        format!("{origin}{href}")
    }
}

fn amenity_pressed(tab: &headless_chrome::Tab, amenity: &str) -> CheckResult<bool> {
    let script = format!(
        r"(() => {{
            const scope = document.querySelector({scope});
            if (scope === null) return false;
            const needle = {needle}.toLowerCase();
            for (const el of scope.querySelectorAll('button')) {{
                if ((el.innerText || '').trim().toLowerCase() === needle) {{
                    return el.getAttribute('aria-pressed') === 'true';
                }}
            }}
            return false;
        }})()",
        scope = serde_json::to_string(AMENITIES_SECTION).unwrap_or_else(|_| "''".to_string()),
        needle = serde_json::to_string(amenity).unwrap_or_else(|_| "''".to_string()),
    );
    Ok(browser::eval(tab, &script)?.as_bool().unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_links_gain_the_origin() {
        assert_eq!(
            absolutize("https://stays.example", "/rooms/42"),
            "https://stays.example/rooms/42"
        );
        assert_eq!(
            absolutize("https://stays.example", "https://elsewhere.example/x"),
            "https://elsewhere.example/x"
        );
    }
}
