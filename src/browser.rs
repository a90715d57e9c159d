//! Browser driver for the login page.
//!
//! [`LoginDriver`] owns a Chrome session on a persistent profile directory
//! and walks the page through the email-entry and code-entry steps. Element
//! discovery is resilient to markup drift: every step tries the ordered
//! locator list from [`crate::selectors`] first-match-wins, with a short
//! per-candidate timeout, instead of trusting a single selector.
//!
//! Field filling goes through DOM evaluation and dispatches synthetic
//! `input`/`change` events so script-driven forms register the edit.
//!
//! Dropping the driver closes the browser.

use crate::config::{Config, TimeoutConfig};
use crate::error::{Error, Result};
use crate::selectors;
use headless_chrome::{Browser, LaunchOptionsBuilder, Tab};
use std::ffi::OsString;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Browser driver for one login attempt.
pub struct LoginDriver {
    // Held for its lifetime: dropping the Browser closes Chrome.
    _browser: Browser,
    tab: Arc<Tab>,
    timeouts: TimeoutConfig,
}

impl LoginDriver {
    /// Launches Chrome on the configured profile directory and opens a tab.
    ///
    /// Honors `CHROME_PATH` for non-standard Chrome installs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Browser`] if Chrome cannot be launched.
    #[instrument(name = "LoginDriver::launch", skip_all, fields(headless = config.headless))]
    pub fn launch(config: &Config) -> Result<Self> {
        let mut extra_args: Vec<OsString> = Vec::new();
        extra_args.push(OsString::from("--no-first-run"));
        extra_args.push(OsString::from("--disable-dev-shm-usage"));

        if config.devtools {
            extra_args.push(OsString::from("--auto-open-devtools-for-tabs"));
        }

        let mut builder = LaunchOptionsBuilder::default();
        builder
            .headless(config.headless)
            .window_size(Some((1440, 900)))
            .user_data_dir(Some(config.profile_dir.clone()))
            // This is an interactive session; the default idle timeout
            // would kill the browser under the user's hands.
            .idle_browser_timeout(Duration::from_secs(24 * 60 * 60))
            .args(extra_args.iter().map(|a| a.as_ref()).collect());

        if let Ok(chrome_path) = std::env::var("CHROME_PATH") {
            builder.path(Some(std::path::PathBuf::from(chrome_path)));
        }

        let launch_options = builder.build().map_err(browser_err)?;
        let browser = Browser::new(launch_options).map_err(browser_err)?;
        let tab = browser.new_tab().map_err(browser_err)?;

        Ok(Self {
            _browser: browser,
            tab,
            timeouts: config.timeouts.clone(),
        })
    }

    /// Navigates to `url` and waits for the page to settle.
    ///
    /// "Settled" means the rendered document stopped growing between two
    /// samples - script-heavy login pages keep drawing well after the load
    /// event fires.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Browser`] if navigation itself fails; a page that
    /// never settles is logged and tolerated.
    #[instrument(name = "LoginDriver::navigate", skip(self))]
    pub async fn navigate(&self, url: &str) -> Result<()> {
        info!("Navigating to login page");

        self.tab.navigate_to(url).map_err(browser_err)?;
        self.tab.wait_until_navigated().map_err(browser_err)?;

        let deadline = Instant::now() + self.timeouts.navigate;
        let mut last_len = 0usize;

        loop {
            let html = self.tab.get_content().map_err(browser_err)?;
            if !html.is_empty() && html.len() == last_len {
                break;
            }
            last_len = html.len();

            if Instant::now() > deadline {
                warn!("Page did not reach quiescence before the navigation timeout");
                break;
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }

        // Give late scripts one more beat before we start probing
        tokio::time::sleep(Duration::from_secs(1)).await;

        debug!(content_len = last_len, "Page settled");
        Ok(())
    }

    /// Fills and submits the account email.
    ///
    /// Returns `Ok(false)` - a deliberate no-op - when no email field can
    /// be located **and** the current page is not a sign-in page: the
    /// persistent profile is still authenticated and there is nothing to
    /// do. On an actual sign-in page, exhausting the locator list is an
    /// error.
    ///
    /// # Errors
    ///
    /// [`Error::ElementNotFound`] when the page is a sign-in page but no
    /// locator strategy matched; [`Error::Browser`] on evaluation failures.
    #[instrument(name = "LoginDriver::submit_email", skip_all)]
    pub fn submit_email(&self, address: &str) -> Result<bool> {
        let Some(selector) = self.find_first(selectors::EMAIL_INPUTS) else {
            let url = self.tab.get_url();
            if !is_signin_url(&url) {
                info!(%url, "No email field and not a sign-in page; already authenticated");
                return Ok(false);
            }
            return Err(Error::ElementNotFound {
                step: "email input",
                tried: selectors::EMAIL_INPUTS.len(),
            });
        };

        debug!(selector, "Email field located");
        self.fill(selector, address)?;
        self.submit(selectors::EMAIL_SUBMITS)?;

        info!("Email submitted");
        Ok(true)
    }

    /// Fills and submits the verification code.
    ///
    /// # Errors
    ///
    /// [`Error::ElementNotFound`] when every code-field locator misses; the
    /// page's discoverable input elements are logged first so the locator
    /// list can be fixed without re-running.
    #[instrument(name = "LoginDriver::submit_code", skip_all)]
    pub fn submit_code(&self, code: &str) -> Result<()> {
        let Some(selector) = self.find_first(selectors::CODE_INPUTS) else {
            self.log_visible_inputs();
            return Err(Error::ElementNotFound {
                step: "code input",
                tried: selectors::CODE_INPUTS.len(),
            });
        };

        debug!(selector, "Code field located");
        self.fill(selector, code)?;
        self.submit(selectors::CODE_SUBMITS)?;

        info!("Code submitted");
        Ok(())
    }

    /// Waits for a signal that the login stuck.
    ///
    /// Races the success-marker locators against the configured bound, then
    /// falls back to the URL heuristic (the sign-in path is gone after a
    /// short grace wait). Absence of any signal is a warning, not a
    /// failure: the login may well have succeeded without one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Browser`] only if the page cannot be interrogated.
    #[instrument(name = "LoginDriver::await_success", skip(self))]
    pub async fn await_success(&self) -> Result<()> {
        let deadline = Instant::now() + self.timeouts.success;

        while Instant::now() < deadline {
            for &selector in selectors::SUCCESS_MARKERS {
                if self.element_exists(selector) {
                    info!(selector, "Login confirmed");
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }

        tokio::time::sleep(Duration::from_secs(2)).await;
        let url = self.tab.get_url();
        if !is_signin_url(&url) {
            info!(%url, "Login confirmed by leaving the sign-in page");
            return Ok(());
        }

        warn!(%url, "No recognizable success signal; proceeding anyway");
        Ok(())
    }

    /// The tab's current URL.
    #[must_use]
    pub fn current_url(&self) -> String {
        self.tab.get_url()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Private methods
    // ─────────────────────────────────────────────────────────────────────────

    /// Tries each locator in order with the per-candidate timeout; first
    /// match wins.
    fn find_first(&self, candidates: &[&'static str]) -> Option<&'static str> {
        for &selector in candidates {
            if self
                .tab
                .wait_for_element_with_custom_timeout(selector, self.timeouts.locator)
                .is_ok()
            {
                return Some(selector);
            }
            debug!(selector, "Locator missed");
        }
        None
    }

    /// Sets a field's value and dispatches the events a framework-bound
    /// form listens for.
    fn fill(&self, selector: &str, value: &str) -> Result<()> {
        self.tab
            .evaluate(
                &format!(
                    r#"
                    const elem = document.querySelector("{selector}");
                    if (elem) {{
                        elem.focus();
                        elem.value = "{value}";
                        elem.dispatchEvent(new Event('input', {{ bubbles: true }}));
                        elem.dispatchEvent(new Event('change', {{ bubbles: true }}));
                    }} else {{
                        throw new Error("Element not found: {selector}");
                    }}
                    "#
                ),
                false,
            )
            .map_err(browser_err)?;

        Ok(())
    }

    /// Clicks the first present submit control, or falls back to a
    /// keyboard submit on the focused field.
    fn submit(&self, candidates: &[&'static str]) -> Result<()> {
        for &selector in candidates {
            if self.element_exists(selector) {
                debug!(selector, "Clicking submit control");
                return self.click(selector);
            }
        }

        debug!("No submit control matched; sending Enter");
        self.tab.press_key("Enter").map_err(browser_err)?;
        Ok(())
    }

    /// Clicks an element through the DOM.
    fn click(&self, selector: &str) -> Result<()> {
        self.tab
            .evaluate(
                &format!(
                    r#"
                    const elem = document.querySelector("{selector}");
                    if (elem) {{
                        elem.click();
                    }} else {{
                        throw new Error("Element not found: {selector}");
                    }}
                    "#
                ),
                false,
            )
            .map_err(browser_err)?;

        Ok(())
    }

    /// Checks whether an element exists on the page right now.
    fn element_exists(&self, selector: &str) -> bool {
        self.tab
            .evaluate(
                &format!(r#"document.querySelector("{selector}") !== null"#),
                false,
            )
            .map(|result| result.value.and_then(|v| v.as_bool()).unwrap_or(false))
            .unwrap_or(false)
    }

    /// Dumps the page's input elements to the log, for fixing the locator
    /// lists after a miss.
    fn log_visible_inputs(&self) {
        const DUMP: &str = r#"JSON.stringify(Array.from(document.querySelectorAll('input'))
            .map(i => ({type: i.type, name: i.name, id: i.id, placeholder: i.placeholder})))"#;

        match self.tab.evaluate(DUMP, false) {
            Ok(result) => {
                let inputs = result
                    .value
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_default();
                warn!(%inputs, "Code field not found; discoverable inputs listed");
            }
            Err(e) => warn!(error = %e, "Could not enumerate page inputs"),
        }
    }
}

impl std::fmt::Debug for LoginDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginDriver")
            .field("url", &self.tab.get_url())
            .finish_non_exhaustive()
    }
}

/// Whether a URL's path marks it as a login/signin page.
///
/// Looks at path segments only, so `signin.example.com/home` does not
/// count.
#[must_use]
pub fn is_signin_url(url: &str) -> bool {
    let path = Url::parse(url)
        .map(|u| u.path().to_lowercase())
        .unwrap_or_else(|_| url.to_lowercase());

    selectors::SIGNIN_PATH_MARKERS
        .iter()
        .any(|marker| path.contains(marker))
}

fn browser_err(e: impl std::fmt::Display) -> Error {
    Error::Browser {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signin_paths_detected() {
        assert!(is_signin_url("https://app.example.com/login"));
        assert!(is_signin_url("https://app.example.com/signin?redirect=/inbox"));
        assert!(is_signin_url("https://app.example.com/account/sign-in"));
        assert!(is_signin_url("https://app.example.com/LOGIN"));
    }

    #[test]
    fn test_non_signin_paths_not_detected() {
        assert!(!is_signin_url("https://app.example.com/inbox"));
        assert!(!is_signin_url("https://app.example.com/"));
        // Host part alone must not trigger the heuristic
        assert!(!is_signin_url("https://signin.example.com/home"));
    }
}
