//! Browser session ownership and the driver-facing helpers.
//!
//! One [`Session`] is created before any scenario runs and torn down exactly
//! once when the suite finishes; every page object borrows it instead of
//! reaching for a shared global. Detail inspections run in an isolated tab
//! behind [`TabGuard`], which returns focus to the root tab no matter how the
//! inspection ends.

use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use headless_chrome::{Browser, Element, LaunchOptions, Tab};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{CheckError, CheckResult};
use crate::wait::Poller;

/// Suite-level knobs, read from the environment with sensible defaults.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Landing page of the target site.
    pub base_url: String,
    /// Run Chrome without a visible window.
    pub headless: bool,
    /// Upper bound on result cards inspected per scenario.
    pub max_cards: usize,
    /// Upper bound on per-listing detail-tab visits per scenario.
    pub max_details: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.airbnb.com/".to_string(),
            headless: true,
            max_cards: 18,
            max_details: 5,
        }
    }
}

impl SessionConfig {
    /// `STAY_CHECK_BASE_URL`, `STAY_CHECK_HEADFUL`, `STAY_CHECK_MAX_CARDS`
    /// and `STAY_CHECK_MAX_DETAILS` override the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("STAY_CHECK_BASE_URL") {
            config.base_url = url;
        }
        if std::env::var("STAY_CHECK_HEADFUL").is_ok() {
            config.headless = false;
        }
        if let Some(n) = env_usize("STAY_CHECK_MAX_CARDS") {
            config.max_cards = n;
        }
        if let Some(n) = env_usize("STAY_CHECK_MAX_DETAILS") {
            config.max_details = n;
        }
        config
    }
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Exclusive owner of the browser process for one suite run.
pub struct Session {
    browser: Browser,
    root: Arc<Tab>,
    poller: Poller,
}

impl Session {
    /// Launch Chrome and open the root tab all scenarios share.
    pub fn launch(config: &SessionConfig) -> CheckResult<Self> {
        info!("Launching {} Chrome...", if config.headless { "headless" } else { "headful" });

        let options = LaunchOptions::default_builder()
            .headless(config.headless)
            .window_size(Some((1400, 1000)))
            .idle_browser_timeout(Duration::from_secs(300))
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;
        let root = browser.new_tab().context("Failed to open the root tab")?;

        Ok(Self {
            browser,
            root,
            poller: Poller::default(),
        })
    }

    pub fn root(&self) -> &Arc<Tab> {
        &self.root
    }

    pub fn poller(&self) -> Poller {
        self.poller
    }

    /// Number of browsing contexts that still answer a trivial script.
    ///
    /// Closed targets stop answering, so this counts live contexts without
    /// depending on how the driver prunes its tab list.
    pub fn tab_count(&self) -> usize {
        self.browser
            .get_tabs()
            .lock()
            .map(|tabs| {
                tabs.iter()
                    .filter(|tab| tab.evaluate("1", false).is_ok())
                    .count()
            })
            .unwrap_or(0)
    }

    /// Open an isolated tab on `url` and wait for its document body.
    ///
    /// The returned guard closes the tab and hands focus back to the root tab
    /// when dropped, on success, absence, error and panic paths alike.
    pub fn isolated_tab(&self, url: &str) -> CheckResult<TabGuard<'_>> {
        debug!("Opening isolated tab for {}", url);
        let tab = self.browser.new_tab().context("Failed to open a tab")?;
        let guard = TabGuard { session: self, tab };

        guard.tab.navigate_to(url).context("Navigation failed")?;
        guard
            .tab
            .wait_until_navigated()
            .context("Navigation never settled")?;
        self.poller
            .poll_for("document body to load", || exists(&guard.tab, "body"))?;

        Ok(guard)
    }
}

/// Scoped ownership of one isolated browsing context.
pub struct TabGuard<'s> {
    session: &'s Session,
    tab: Arc<Tab>,
}

impl TabGuard<'_> {
    pub fn tab(&self) -> &Arc<Tab> {
        &self.tab
    }
}

impl Deref for TabGuard<'_> {
    type Target = Arc<Tab>;

    fn deref(&self) -> &Arc<Tab> {
        &self.tab
    }
}

impl Drop for TabGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.tab.close(true) {
            warn!("Failed to close isolated tab: {err:#}");
        }
        if let Err(err) = self.session.root.activate() {
            warn!("Failed to refocus the root tab: {err:#}");
        }
    }
}

/// Evaluate a JS expression and return its JSON value, `Null` when the
/// expression produced none.
pub fn eval(tab: &Tab, expression: &str) -> CheckResult<Value> {
    let object = tab.evaluate(expression, false)?;
    Ok(object.value.unwrap_or(Value::Null))
}

fn js_string(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| "''".to_string())
}

/// Whether at least one element matches `selector`.
///
/// Probed through the page's own `querySelector` rather than a CDP DOM query,
/// which can race freshly rendered nodes.
pub fn exists(tab: &Tab, selector: &str) -> CheckResult<bool> {
    let script = format!("document.querySelector({}) !== null", js_string(selector));
    Ok(eval(tab, &script)?.as_bool().unwrap_or(false))
}

/// Whether the first match for `selector` is rendered with a non-empty box.
pub fn visible(tab: &Tab, selector: &str) -> CheckResult<bool> {
    let script = format!(
        r"(() => {{
            const el = document.querySelector({});
            if (el === null) return false;
            const rect = el.getBoundingClientRect();
            return rect.width > 0 && rect.height > 0;
        }})()",
        js_string(selector)
    );
    Ok(eval(tab, &script)?.as_bool().unwrap_or(false))
}

/// Whether the first match is rendered, not disabled, and not marked busy.
pub fn interactable(tab: &Tab, selector: &str) -> CheckResult<bool> {
    let script = format!(
        r"(() => {{
            const el = document.querySelector({});
            if (el === null) return false;
            const rect = el.getBoundingClientRect();
            if (rect.width === 0 || rect.height === 0) return false;
            if (el.disabled) return false;
            return el.getAttribute('aria-busy') !== 'true';
        }})()",
        js_string(selector)
    );
    Ok(eval(tab, &script)?.as_bool().unwrap_or(false))
}

/// How many elements match `selector`.
pub fn count_of(tab: &Tab, selector: &str) -> CheckResult<usize> {
    let script = format!(
        "document.querySelectorAll({}).length",
        js_string(selector)
    );
    Ok(eval(tab, &script)?.as_u64().unwrap_or(0) as usize)
}

/// Look an element up, mapping "not found" to `None` instead of an error.
///
/// Only absence is swallowed; a failing driver round-trip still propagates.
pub fn find_optional<'t>(tab: &'t Tab, selector: &str) -> CheckResult<Option<Element<'t>>> {
    if !exists(tab, selector)? {
        return Ok(None);
    }
    Ok(Some(tab.find_element(selector)?))
}

/// Trimmed inner text of the first match, `None` when nothing matches.
pub fn inner_text(tab: &Tab, selector: &str) -> CheckResult<Option<String>> {
    let script = format!(
        r"(() => {{
            const el = document.querySelector({});
            return el === null ? null : el.innerText.trim();
        }})()",
        js_string(selector)
    );
    match eval(tab, &script)? {
        Value::String(text) => Ok(Some(text)),
        _ => Ok(None),
    }
}

/// Outer HTML of the `index`-th match, `None` when the page holds fewer
/// matches than that.
pub fn outer_html_at(tab: &Tab, selector: &str, index: usize) -> CheckResult<Option<String>> {
    let script = format!(
        r"(() => {{
            const el = document.querySelectorAll({})[{}];
            return el === undefined ? null : el.outerHTML;
        }})()",
        js_string(selector),
        index
    );
    match eval(tab, &script)? {
        Value::String(html) => Ok(Some(html)),
        _ => Ok(None),
    }
}

/// Click the first `tag` element under `scope_selector` whose trimmed text
/// matches `needle` (case-insensitive; exact or substring). Returns whether
/// anything was clicked.
pub fn click_by_text(
    tab: &Tab,
    scope_selector: &str,
    tag: &str,
    needle: &str,
    exact: bool,
) -> CheckResult<bool> {
    let script = format!(
        r"(() => {{
            const scope = document.querySelector({scope});
            if (scope === null) return false;
            const needle = {needle}.toLowerCase();
            for (const el of scope.querySelectorAll({tag})) {{
                const text = (el.innerText || '').trim().toLowerCase();
                if ({exact} ? text === needle : text.includes(needle)) {{
                    el.click();
                    return true;
                }}
            }}
            return false;
        }})()",
        scope = js_string(scope_selector),
        needle = js_string(needle),
        tag = js_string(tag),
        exact = exact,
    );
    Ok(eval(tab, &script)?.as_bool().unwrap_or(false))
}

/// Attribute value of the first match, `None` for a missing element or
/// attribute.
pub fn attribute_of(tab: &Tab, selector: &str, attribute: &str) -> CheckResult<Option<String>> {
    let script = format!(
        r"(() => {{
            const el = document.querySelector({});
            return el === null ? null : el.getAttribute({});
        }})()",
        js_string(selector),
        js_string(attribute)
    );
    match eval(tab, &script)? {
        Value::String(value) => Ok(Some(value)),
        _ => Ok(None),
    }
}

/// Map a wait timeout into the "region never appeared" failure.
pub fn as_region(err: CheckError, region: &str) -> CheckError {
    match err {
        CheckError::TimeoutExceeded { .. } => CheckError::RegionNotFound {
            region: region.to_string(),
        },
        other => other,
    }
}
