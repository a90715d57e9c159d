//! Configuration for a login run.
//!
//! Use [`ConfigBuilder`] to create a configuration with sensible defaults:
//!
//! ```
//! use magic_login::Config;
//!
//! let config = Config::builder()
//!     .email("user@gmail.com")
//!     .app_password("app-password")
//!     .login_url("https://app.example.com/signin")
//!     .from_email("codes@example.com")
//!     .build()
//!     .expect("valid config");
//! ```

use crate::error::{Error, Result};
use email_address::EmailAddress;
use secrecy::{ExposeSecret, SecretString};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Default Chrome profile directory, kept next to the working directory so
/// the session survives across runs.
pub const DEFAULT_PROFILE_DIR: &str = ".magic-login-profile";

/// Configuration for one login attempt.
///
/// Create using [`Config::builder()`].
///
/// The `app_password` field is stored as a [`SecretString`] to prevent
/// accidental logging of the credential. The email addresses are stored as
/// validated [`EmailAddress`] values.
#[derive(Clone)]
pub struct Config {
    /// Account email, exactly as it should be typed into the login form.
    email: EmailAddress,
    /// App-scoped mailbox password (protected from accidental logging).
    app_password: SecretString,
    /// The login page to drive.
    pub login_url: Url,
    /// Expected sender of the verification code.
    pub from_email: EmailAddress,
    /// IMAP server hostname (derived from the email domain if not set).
    pub imap_host: Option<String>,
    /// IMAP server port (default: 993 for IMAPS).
    pub imap_port: u16,
    /// Run the browser without a visible window.
    pub headless: bool,
    /// Open devtools alongside the page.
    pub devtools: bool,
    /// Persistent browser profile directory.
    pub profile_dir: PathBuf,
    /// Timeout configuration.
    pub timeouts: TimeoutConfig,
    /// Polling configuration for the code wait.
    pub polling: PollingConfig,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("email", &self.email.as_str())
            .field("app_password", &"[REDACTED]")
            .field("login_url", &self.login_url.as_str())
            .field("from_email", &self.from_email.as_str())
            .field("imap_host", &self.imap_host)
            .field("imap_port", &self.imap_port)
            .field("headless", &self.headless)
            .field("devtools", &self.devtools)
            .field("profile_dir", &self.profile_dir)
            .field("timeouts", &self.timeouts)
            .field("polling", &self.polling)
            .finish()
    }
}

impl Config {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Returns the account email as typed into the login form, alias tag
    /// and all.
    #[must_use]
    pub fn email(&self) -> &str {
        self.email.as_str()
    }

    /// Returns the mailbox account identifier used for IMAP login.
    ///
    /// See [`base_account`].
    #[must_use]
    pub fn mailbox_account(&self) -> String {
        base_account(self.email.as_str())
    }

    /// Returns the app password for IMAP authentication.
    ///
    /// The secret is intentionally not a public field to prevent accidental
    /// logging.
    #[must_use]
    pub fn app_password(&self) -> &str {
        self.app_password.expose_secret()
    }

    /// Returns the effective IMAP host, either explicitly configured or
    /// derived from the mailbox domain.
    #[must_use]
    pub fn effective_imap_host(&self) -> String {
        if let Some(host) = &self.imap_host {
            host.clone()
        } else {
            default_imap_host(&self.mailbox_account())
        }
    }

    /// Returns the full IMAP server address as "host:port".
    #[must_use]
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.effective_imap_host(), self.imap_port)
    }
}

/// Strips a `+tag` alias segment from the local part of an address.
///
/// Mail providers deliver `user+tag@gmail.com` to the `user@gmail.com`
/// mailbox; the IMAP server (and the credential store) only know the base
/// account. The tagged address is still what goes into the login form.
#[must_use]
pub fn base_account(email: &str) -> String {
    match (email.find('+'), email.find('@')) {
        (Some(plus), Some(at)) if plus < at => {
            format!("{}{}", &email[..plus], &email[at..])
        }
        _ => email.to_string(),
    }
}

/// Derives the IMAP host for a mailbox account.
///
/// The tool targets the standard provider endpoint; anything unusual goes
/// through the explicit `imap_host` override.
fn default_imap_host(email: &str) -> String {
    let domain = email.split('@').nth(1).unwrap_or(email).to_lowercase();
    match domain.as_str() {
        "gmail.com" | "googlemail.com" => "imap.gmail.com".to_string(),
        _ => format!("imap.{domain}"),
    }
}

/// Timeout configuration for individual operations.
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Timeout for establishing the TCP/TLS connection.
    pub connect: Duration,
    /// Timeout for IMAP authentication.
    pub auth: Duration,
    /// Timeout for selecting the mailbox.
    pub select: Duration,
    /// Timeout for one unread-message search.
    pub search: Duration,
    /// Timeout for fetching message content.
    pub fetch: Duration,
    /// Timeout for flagging the winning message read.
    pub store: Duration,
    /// Timeout for the IMAP logout.
    pub logout: Duration,
    /// Timeout for page navigation and render quiescence.
    pub navigate: Duration,
    /// Per-locator-strategy timeout during element discovery.
    pub locator: Duration,
    /// Total time to watch for a post-login success indicator.
    pub success: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(30),
            auth: Duration::from_secs(30),
            select: Duration::from_secs(10),
            search: Duration::from_secs(10),
            fetch: Duration::from_secs(30),
            store: Duration::from_secs(10),
            logout: Duration::from_secs(5),
            navigate: Duration::from_secs(45),
            locator: Duration::from_secs(2),
            success: Duration::from_secs(20),
        }
    }
}

/// Polling configuration for the code wait.
#[derive(Debug, Clone)]
pub struct PollingConfig {
    /// Interval between mailbox poll cycles.
    pub interval: Duration,
    /// Maximum wall-clock time to wait for the code.
    pub max_wait: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_wait: Duration::from_secs(180),
        }
    }
}

/// Validates an email address format.
fn validate_email(email: &str) -> Result<EmailAddress> {
    EmailAddress::parse_with_options(email, email_address::Options::default()).map_err(|_| {
        Error::InvalidEmailFormat {
            email: email.to_string(),
        }
    })
}

/// Builder for [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    email: Option<String>,
    app_password: Option<String>,
    login_url: Option<String>,
    from_email: Option<String>,
    imap_host: Option<String>,
    imap_port: Option<u16>,
    headless: Option<bool>,
    devtools: Option<bool>,
    profile_dir: Option<PathBuf>,
    timeouts: Option<TimeoutConfig>,
    polling: Option<PollingConfig>,
}

impl ConfigBuilder {
    /// Sets the account email (required).
    #[must_use]
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Sets the app-scoped mailbox password (required).
    #[must_use]
    pub fn app_password(mut self, password: impl Into<String>) -> Self {
        self.app_password = Some(password.into());
        self
    }

    /// Sets the login page URL (required).
    #[must_use]
    pub fn login_url(mut self, url: impl Into<String>) -> Self {
        self.login_url = Some(url.into());
        self
    }

    /// Sets the expected sender of the verification code (required).
    #[must_use]
    pub fn from_email(mut self, from: impl Into<String>) -> Self {
        self.from_email = Some(from.into());
        self
    }

    /// Sets the IMAP server hostname explicitly.
    ///
    /// If not set, the host is derived from the mailbox domain.
    #[must_use]
    pub fn imap_host(mut self, host: impl Into<String>) -> Self {
        self.imap_host = Some(host.into());
        self
    }

    /// Sets the IMAP server port. Default is 993.
    #[must_use]
    pub fn imap_port(mut self, port: u16) -> Self {
        self.imap_port = Some(port);
        self
    }

    /// Runs the browser headless. Default is false: this is an interactive
    /// session and the window is the point.
    #[must_use]
    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = Some(headless);
        self
    }

    /// Opens devtools alongside the page. Default is false.
    #[must_use]
    pub fn devtools(mut self, devtools: bool) -> Self {
        self.devtools = Some(devtools);
        self
    }

    /// Sets the persistent browser profile directory.
    #[must_use]
    pub fn profile_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.profile_dir = Some(dir.into());
        self
    }

    /// Sets timeout configuration.
    #[must_use]
    pub fn timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = Some(timeouts);
        self
    }

    /// Sets polling configuration.
    #[must_use]
    pub fn polling(mut self, polling: PollingConfig) -> Self {
        self.polling = Some(polling);
        self
    }

    /// Sets the polling interval for the code wait.
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.polling
            .get_or_insert_with(PollingConfig::default)
            .interval = interval;
        self
    }

    /// Sets the maximum wall-clock wait for the code.
    #[must_use]
    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.polling
            .get_or_insert_with(PollingConfig::default)
            .max_wait = max_wait;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if required fields are missing or invalid.
    pub fn build(self) -> Result<Config> {
        let email_raw = self.email.ok_or_else(|| Error::MissingConfig {
            name: "EMAIL".into(),
        })?;
        let email = validate_email(&email_raw)?;

        let app_password = self.app_password.ok_or_else(|| Error::MissingConfig {
            name: "APP_PASSWORD".into(),
        })?;

        let login_url_raw = self.login_url.ok_or_else(|| Error::MissingConfig {
            name: "LOGIN_URL".into(),
        })?;
        let login_url = Url::parse(&login_url_raw).map_err(|source| Error::InvalidLoginUrl {
            url: login_url_raw,
            source,
        })?;

        let from_raw = self.from_email.ok_or_else(|| Error::MissingConfig {
            name: "FROM_EMAIL".into(),
        })?;
        let from_email = validate_email(&from_raw)?;

        Ok(Config {
            email,
            app_password: SecretString::from(app_password),
            login_url,
            from_email,
            imap_host: self.imap_host,
            imap_port: self.imap_port.unwrap_or(993),
            headless: self.headless.unwrap_or(false),
            devtools: self.devtools.unwrap_or(false),
            profile_dir: self
                .profile_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PROFILE_DIR)),
            timeouts: self.timeouts.unwrap_or_default(),
            polling: self.polling.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> ConfigBuilder {
        Config::builder()
            .email("user@gmail.com")
            .app_password("secret")
            .login_url("https://app.example.com/signin")
            .from_email("codes@example.com")
    }

    #[test]
    fn test_builder_minimal() {
        let config = minimal().build().unwrap();

        assert_eq!(config.email(), "user@gmail.com");
        assert_eq!(config.app_password(), "secret");
        assert_eq!(config.imap_port, 993);
        assert!(!config.headless);
        assert!(!config.devtools);
        assert_eq!(config.polling.interval, Duration::from_secs(2));
    }

    #[test]
    fn test_builder_missing_required_fields() {
        let result = Config::builder().app_password("x").build();
        assert!(matches!(result, Err(Error::MissingConfig { .. })));

        let result = Config::builder().email("user@gmail.com").build();
        assert!(matches!(result, Err(Error::MissingConfig { .. })));
    }

    #[test]
    fn test_builder_invalid_email() {
        let result = minimal().email("not-an-email").build();
        assert!(matches!(result, Err(Error::InvalidEmailFormat { .. })));
    }

    #[test]
    fn test_builder_invalid_login_url() {
        let result = minimal().login_url("not a url").build();
        assert!(matches!(result, Err(Error::InvalidLoginUrl { .. })));
    }

    #[test]
    fn test_alias_tag_stripped_for_mailbox_only() {
        let config = minimal().email("user+expensify@gmail.com").build().unwrap();

        // IMAP logs into the base account...
        assert_eq!(config.mailbox_account(), "user@gmail.com");
        // ...while the login form still gets the tagged address.
        assert_eq!(config.email(), "user+expensify@gmail.com");
    }

    #[test]
    fn test_address_without_tag_unchanged() {
        let config = minimal().build().unwrap();
        assert_eq!(config.mailbox_account(), "user@gmail.com");
    }

    #[test]
    fn test_imap_host_derivation() {
        let config = minimal().build().unwrap();
        assert_eq!(config.effective_imap_host(), "imap.gmail.com");
        assert_eq!(config.server_address(), "imap.gmail.com:993");

        let config = minimal().email("user@fastmail.com").build().unwrap();
        assert_eq!(config.effective_imap_host(), "imap.fastmail.com");
    }

    #[test]
    fn test_explicit_imap_host_wins() {
        let config = minimal().imap_host("mail.internal.example").build().unwrap();
        assert_eq!(config.effective_imap_host(), "mail.internal.example");
    }

    #[test]
    fn test_alias_tag_does_not_confuse_host_derivation() {
        let config = minimal().email("user+tag@gmail.com").build().unwrap();
        assert_eq!(config.effective_imap_host(), "imap.gmail.com");
    }

    #[test]
    fn test_password_not_in_debug() {
        let config = minimal().app_password("super-secret-password").build().unwrap();

        let debug_str = format!("{config:?}");
        assert!(!debug_str.contains("super-secret-password"));
        assert!(debug_str.contains("[REDACTED]"));
    }

    #[test]
    fn test_poll_overrides() {
        let config = minimal()
            .poll_interval(Duration::from_secs(5))
            .max_wait(Duration::from_secs(60))
            .build()
            .unwrap();

        assert_eq!(config.polling.interval, Duration::from_secs(5));
        assert_eq!(config.polling.max_wait, Duration::from_secs(60));
    }
}
