//! A listing's details page, always visited inside an isolated tab.

use std::time::Duration;

use headless_chrome::Tab;
use tracing::debug;

use crate::browser;
use crate::error::{CheckError, CheckResult};
use crate::extract;
use crate::wait::Poller;

const TRANSLATION_DIALOG: &str = r#"[role="dialog"][aria-label="Translation on"]"#;
const TRANSLATION_CLOSE: &str = r#"[role="dialog"][aria-label="Translation on"] button[aria-label="Close"]"#;
const OVERVIEW: &str = r#"[data-section-id="OVERVIEW_DEFAULT_V2"]"#;
/// Label-like nodes inside the overview region.
const OVERVIEW_LABEL: &str = "li";

pub struct DetailsPage<'t> {
    tab: &'t Tab,
    poller: Poller,
}

impl<'t> DetailsPage<'t> {
    pub fn new(tab: &'t Tab) -> Self {
        Self {
            tab,
            poller: Poller::default(),
        }
    }

    /// Close the auto-translation dialog if the site decides to show one.
    /// Not seeing it within a short budget is the normal case.
    pub fn dismiss_translation_overlay(&self) -> CheckResult<()> {
        let quick = Poller::with_timeout(Duration::from_secs(3));
        match quick.poll_for("the translation overlay", || {
            browser::exists(self.tab, TRANSLATION_DIALOG)
        }) {
            Ok(()) => {
                if let Some(close) = browser::find_optional(self.tab, TRANSLATION_CLOSE)? {
                    close.click()?;
                    debug!("Closed the translation overlay");
                }
                Ok(())
            }
            Err(CheckError::TimeoutExceeded { .. }) => {
                debug!("No translation overlay shown");
                Ok(())
            }
            Err(other) => Err(other),
        }
    }

    /// The overview region's HTML. The region not appearing within its wait
    /// budget means this page cannot be inspected at all.
    fn overview_html(&self) -> CheckResult<String> {
        self.poller
            .poll_until("the listing overview region", || {
                browser::outer_html_at(self.tab, OVERVIEW, 0)
            })
            .map_err(|err| browser::as_region(err, "the listing overview region"))
    }

    /// Secondary-region bedroom extraction from the overview labels.
    pub fn bedroom_count(&self) -> CheckResult<Option<u32>> {
        let html = self.overview_html()?;
        let count = extract::count_in_fragment(&html, OVERVIEW_LABEL, "bedroom");
        debug!("Overview bedroom label parsed to {:?}", count);
        Ok(count)
    }

    /// Maximum guest capacity from the overview labels.
    pub fn guest_capacity(&self) -> CheckResult<Option<u32>> {
        let html = self.overview_html()?;
        let count = extract::count_in_fragment(&html, OVERVIEW_LABEL, "guest");
        debug!("Overview guest label parsed to {:?}", count);
        Ok(count)
    }

    /// Whether the page mentions an amenity by name anywhere in its text.
    pub fn has_amenity(&self, name: &str) -> CheckResult<bool> {
        let script = format!(
            "document.body.innerText.toLowerCase().includes({})",
            serde_json::to_string(&name.to_lowercase()).unwrap_or_else(|_| "''".to_string())
        );
        Ok(browser::eval(self.tab, &script)?.as_bool().unwrap_or(false))
    }
}
