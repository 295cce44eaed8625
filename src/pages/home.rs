//! The landing page: location, dates, guests, search submission.
//!
//! Selectors are the third-party site's contract and may change without
//! notice; they are kept together as constants so a site revision is a
//! one-place fix.

use std::thread;
use std::time::Duration;

use anyhow::Context;
use tracing::{debug, info};

use crate::browser::{self, Session};
use crate::error::CheckResult;
use crate::extract;
use crate::models::{calendar_cell_id, SearchCriteria};

const LOCATION_INPUT: &str = r#"input[data-testid="structured-search-input-field-query"]"#;
const COOKIE_ACCEPT: &str = r#"button[data-testid="accept-cookie-banner"]"#;
const CHECK_IN_BUTTON: &str = r#"[data-testid="structured-search-input-field-split-dates-0"]"#;
const DATES_PANEL: &str = r#"[data-testid="structured-search-input-field-dates-panel"]"#;
const GUESTS_BUTTON: &str = r#"[data-testid="structured-search-input-field-guests-button"]"#;
const ADULTS_INCREASE: &str = r#"[data-testid="stepper-adults-increase-button"]"#;
const ADULTS_VALUE: &str = r#"[data-testid="stepper-adults-value"]"#;
const CHILDREN_INCREASE: &str = r#"[data-testid="stepper-children-increase-button"]"#;
const CHILDREN_VALUE: &str = r#"[data-testid="stepper-children-value"]"#;
const SEARCH_BUTTON: &str = r#"[data-testid="structured-search-input-search-button"]"#;

/// The search bar finishes hydrating a moment after the load event and the
/// page exposes no signal for it, so the open step keeps one fixed pause.
const HYDRATION_SETTLE: Duration = Duration::from_secs(2);

pub struct HomePage<'s> {
    session: &'s Session,
}

impl<'s> HomePage<'s> {
    pub fn new(session: &'s Session) -> Self {
        Self { session }
    }

    /// Navigate to the landing page and get it into an interactable state.
    pub fn open(&self, base_url: &str) -> CheckResult<()> {
        info!("Opening {}", base_url);
        let tab = self.session.root();
        tab.navigate_to(base_url).context("Failed to open the landing page")?;
        tab.wait_until_navigated().context("Landing page never settled")?;

        thread::sleep(HYDRATION_SETTLE);
        self.dismiss_cookie_banner()?;

        self.session
            .poller()
            .poll_for("the search box to become visible", || {
                browser::visible(tab, LOCATION_INPUT)
            })?;
        debug!("Landing page ready: {}", tab.get_url());
        Ok(())
    }

    /// Best-effort dismissal of the consent banner; absence is the normal
    /// case outside cookie-law regions.
    fn dismiss_cookie_banner(&self) -> CheckResult<()> {
        let tab = self.session.root();
        match browser::find_optional(tab, COOKIE_ACCEPT)? {
            Some(button) => {
                button.click()?;
                debug!("Dismissed cookie banner");
            }
            None => debug!("No cookie banner shown"),
        }
        Ok(())
    }

    pub fn enter_location(&self, location: &str) -> CheckResult<()> {
        info!("Entering location: {}", location);
        let tab = self.session.root();

        let input = tab.find_element(LOCATION_INPUT)?;
        input.click()?;
        // Clear whatever a previous scenario left in the field.
        browser::eval(
            tab,
            &format!("document.querySelector({:?}).value = ''", LOCATION_INPUT),
        )?;
        input.type_into(location)?;
        tab.press_key("Enter")?;

        let filled = browser::attribute_of(tab, LOCATION_INPUT, "value")?.unwrap_or_default();
        debug!("Location field now reads: {:?}", filled);
        Ok(())
    }

    /// Pick check-in and check-out on the calendar.
    pub fn select_dates(&self, criteria: &SearchCriteria) -> CheckResult<()> {
        let tab = self.session.root();
        let poller = self.session.poller();

        info!("Opening the date picker...");
        tab.find_element(CHECK_IN_BUTTON)?.click()?;
        poller.poll_for("the date panel to open", || {
            browser::visible(tab, DATES_PANEL)
        })?;

        for date in [criteria.check_in_date(), criteria.check_out_date()] {
            let cell = format!(
                r#"[data-testid="{}"][data-is-day-blocked="false"]"#,
                calendar_cell_id(date)
            );
            debug!("Selecting calendar day {}", calendar_cell_id(date));
            let day = poller.poll_until(&format!("day {} to be selectable", date), || {
                browser::find_optional(tab, &cell)
            })?;
            day.click()?;
        }
        Ok(())
    }

    /// Step the guest counters up to the requested counts.
    ///
    /// Each click is confirmed by polling the stepper's displayed value, not
    /// by a fixed pause.
    pub fn select_guests(&self, criteria: &SearchCriteria) -> CheckResult<()> {
        let tab = self.session.root();

        info!(
            "Selecting guests: {} adults, {} children",
            criteria.adults, criteria.children
        );
        tab.find_element(GUESTS_BUTTON)?.click()?;
        self.session
            .poller()
            .poll_for("the guest panel to open", || {
                browser::visible(tab, ADULTS_INCREASE)
            })?;

        self.step_counter(ADULTS_INCREASE, ADULTS_VALUE, criteria.adults, "adults")?;
        self.step_counter(
            CHILDREN_INCREASE,
            CHILDREN_VALUE,
            criteria.children,
            "children",
        )?;
        Ok(())
    }

    fn step_counter(
        &self,
        increase: &str,
        value: &str,
        target: u32,
        label: &str,
    ) -> CheckResult<()> {
        let tab = self.session.root();
        let poller = self.session.poller();

        for next in 1..=target {
            tab.find_element(increase)?.click()?;
            poller.poll_for(&format!("the {label} counter to read {next}"), || {
                let text = browser::inner_text(tab, value)?;
                Ok(text.as_deref().and_then(extract::leading_count) == Some(next))
            })?;
            debug!("{} counter now at {}", label, next);
        }
        Ok(())
    }

    /// Submit the search and wait until the results view is the current page.
    pub fn search(&self) -> CheckResult<()> {
        info!("Submitting the search...");
        let tab = self.session.root();
        tab.find_element(SEARCH_BUTTON)?.click()?;

        self.session
            .poller()
            .poll_for("the search to land on a results page", || {
                Ok(tab.get_url().contains("/s/"))
            })
    }
}

