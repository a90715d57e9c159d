//! Error types for the magic-login crate.
//!
//! All errors implement [`std::error::Error`] and provide context about what went wrong.
//! Errors are grouped into kinds - see [`Error::kind`] - so the caller can tell a
//! mailbox-access failure apart from a plain timeout and print the right remediation.

use std::time::Duration;
use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during a login attempt.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    // ─────────────────────────────────────────────────────────────────────────
    // Configuration / validation errors
    // ─────────────────────────────────────────────────────────────────────────
    /// A required setting is absent.
    #[error("missing required setting: {name}")]
    MissingConfig {
        /// Name of the missing setting (environment variable or builder field).
        name: String,
    },

    /// Invalid configuration provided.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration error.
        message: String,
    },

    /// Invalid email address format.
    #[error("invalid email format: {email}")]
    InvalidEmailFormat {
        /// The invalid email address.
        email: String,
    },

    /// The login page URL could not be parsed.
    #[error("invalid login URL: {url}")]
    InvalidLoginUrl {
        /// The unparseable URL.
        url: String,
        /// The underlying parse error.
        #[source]
        source: url::ParseError,
    },

    /// Invalid DNS name for TLS.
    #[error("invalid DNS name for host '{host}'")]
    InvalidDnsName {
        /// The invalid hostname.
        host: String,
        /// The underlying DNS name error.
        #[source]
        source: rustls::client::InvalidDnsNameError,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Credential errors
    // ─────────────────────────────────────────────────────────────────────────
    /// Every credential source came up empty.
    #[error("no app password available: not in the environment, the keychain, or the prompt")]
    CredentialUnavailable,

    // ─────────────────────────────────────────────────────────────────────────
    // Mailbox access errors
    // ─────────────────────────────────────────────────────────────────────────
    /// The provider rejected the login because it wants an app-scoped password.
    #[error("the mail provider requires an app-specific password for {email}")]
    AppPasswordRequired {
        /// The account that was rejected.
        email: String,
    },

    /// IMAP authentication failed.
    #[error("mailbox authentication failed for {email}")]
    AuthenticationFailed {
        /// The account that failed to authenticate.
        email: String,
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Network / connection errors
    // ─────────────────────────────────────────────────────────────────────────
    /// Failed to establish TCP connection.
    #[error("failed to connect to {target}")]
    TcpConnect {
        /// The target address that failed.
        target: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to establish TLS connection.
    #[error("failed to establish TLS connection to {target}")]
    TlsConnect {
        /// The target address that failed.
        target: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Timeout errors
    // ─────────────────────────────────────────────────────────────────────────
    /// Connection timeout.
    #[error("connection timeout to {target} after {timeout:?}")]
    ConnectTimeout {
        /// The target address.
        target: String,
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// Authentication timeout.
    #[error("authentication timeout for {email} after {timeout:?}")]
    AuthTimeout {
        /// The email address used for authentication.
        email: String,
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// Mailbox selection timeout.
    #[error("mailbox selection timeout for '{mailbox}' after {timeout:?}")]
    SelectTimeout {
        /// The mailbox name.
        mailbox: String,
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// Search timeout.
    #[error("mailbox search timeout after {timeout:?}")]
    SearchTimeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// Message fetch timeout.
    #[error("message fetch timeout for UIDs {uid_set} after {timeout:?}")]
    FetchTimeout {
        /// The UID set being fetched.
        uid_set: String,
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// Flag store timeout.
    #[error("mark-read timeout for UID {uid} after {timeout:?}")]
    StoreTimeout {
        /// The UID being flagged.
        uid: u32,
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// No qualifying code arrived before the deadline.
    ///
    /// This is the terminal outcome of a full polling run and is distinct
    /// from the per-operation timeouts above: the mailbox stayed reachable,
    /// the code simply never showed up.
    #[error("no verification code from {from} within {timeout:?}")]
    WaitTimeout {
        /// The sender address that was being watched.
        from: String,
        /// The total wait bound that elapsed.
        timeout: Duration,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // IMAP protocol errors
    // ─────────────────────────────────────────────────────────────────────────
    /// Failed to select mailbox.
    #[error("failed to select mailbox '{mailbox}'")]
    SelectMailbox {
        /// The mailbox name.
        mailbox: String,
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    /// IMAP search failed.
    #[error("IMAP search failed")]
    ImapSearch {
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    /// IMAP fetch failed.
    #[error("IMAP fetch failed for UIDs {uid_set}")]
    ImapFetch {
        /// The UID set that failed.
        uid_set: String,
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    /// Failed to read a message from the fetch stream.
    #[error("failed to fetch message from stream")]
    FetchMessage {
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    /// Failed to flag the winning message as read.
    #[error("failed to mark UID {uid} as read")]
    MarkSeen {
        /// The UID that could not be flagged.
        uid: u32,
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    /// IMAP logout failed.
    #[error("IMAP logout failed")]
    ImapLogout {
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Browser errors
    // ─────────────────────────────────────────────────────────────────────────
    /// Every locator strategy for a required page element was exhausted.
    #[error("no {step} element found on the page after {tried} locator strategies")]
    ElementNotFound {
        /// Which step needed the element ("email input", "code input").
        step: &'static str,
        /// How many locator strategies were tried.
        tried: usize,
    },

    /// Browser automation failure (launch, navigation, script evaluation).
    #[error("browser error: {message}")]
    Browser {
        /// Description from the automation client.
        message: String,
    },
}

impl Error {
    /// Returns the error kind for logging and remediation routing.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MissingConfig { .. }
            | Error::InvalidConfig { .. }
            | Error::InvalidEmailFormat { .. }
            | Error::InvalidLoginUrl { .. }
            | Error::InvalidDnsName { .. } => ErrorKind::Configuration,

            Error::CredentialUnavailable => ErrorKind::Credential,

            Error::AppPasswordRequired { .. } | Error::AuthenticationFailed { .. } => {
                ErrorKind::MailAccess
            }

            Error::TcpConnect { .. } | Error::TlsConnect { .. } => ErrorKind::Network,

            Error::ConnectTimeout { .. }
            | Error::AuthTimeout { .. }
            | Error::SelectTimeout { .. }
            | Error::SearchTimeout { .. }
            | Error::FetchTimeout { .. }
            | Error::StoreTimeout { .. }
            | Error::WaitTimeout { .. } => ErrorKind::Timeout,

            Error::SelectMailbox { .. }
            | Error::ImapSearch { .. }
            | Error::ImapFetch { .. }
            | Error::FetchMessage { .. }
            | Error::MarkSeen { .. }
            | Error::ImapLogout { .. } => ErrorKind::Protocol,

            Error::ElementNotFound { .. } | Error::Browser { .. } => ErrorKind::Browser,
        }
    }

    /// Returns a remediation hint for errors where the fix is known.
    #[must_use]
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            Error::AppPasswordRequired { .. } => Some(
                "enable 2-step verification, create an app password at \
                 https://myaccount.google.com/apppasswords, and set APP_PASSWORD",
            ),
            Error::AuthenticationFailed { .. } => Some(
                "check EMAIL and the app password; for Google accounts make sure \
                 IMAP access is enabled in the mail settings",
            ),
            Error::CredentialUnavailable => {
                Some("set APP_PASSWORD, store the secret in the OS keychain, or run interactively")
            }
            Error::WaitTimeout { .. } => {
                Some("request a new code from the login page and run again")
            }
            _ => None,
        }
    }
}

/// Error kinds for logging and remediation routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Configuration or validation errors.
    Configuration,
    /// Credential acquisition errors.
    Credential,
    /// Mailbox access denied (authentication and authorization).
    MailAccess,
    /// Network connectivity errors.
    Network,
    /// Timeout errors, including the overall code wait.
    Timeout,
    /// IMAP protocol errors.
    Protocol,
    /// Browser automation errors.
    Browser,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Configuration => write!(f, "configuration"),
            ErrorKind::Credential => write!(f, "credential"),
            ErrorKind::MailAccess => write!(f, "mail_access"),
            ErrorKind::Network => write!(f, "network"),
            ErrorKind::Timeout => write!(f, "timeout"),
            ErrorKind::Protocol => write!(f, "protocol"),
            ErrorKind::Browser => write!(f, "browser"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        let err = Error::MissingConfig {
            name: "EMAIL".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err = Error::AppPasswordRequired {
            email: "user@gmail.com".into(),
        };
        assert_eq!(err.kind(), ErrorKind::MailAccess);

        let err = Error::WaitTimeout {
            from: "codes@example.com".into(),
            timeout: Duration::from_secs(120),
        };
        assert_eq!(err.kind(), ErrorKind::Timeout);

        let err = Error::ElementNotFound {
            step: "code input",
            tried: 5,
        };
        assert_eq!(err.kind(), ErrorKind::Browser);
    }

    #[test]
    fn test_wait_timeout_distinct_from_access_errors() {
        let timeout = Error::WaitTimeout {
            from: "codes@example.com".into(),
            timeout: Duration::from_secs(120),
        };
        let access = Error::AppPasswordRequired {
            email: "user@gmail.com".into(),
        };
        assert_ne!(timeout.kind(), access.kind());
    }

    #[test]
    fn test_mail_access_errors_carry_remediation() {
        let err = Error::AppPasswordRequired {
            email: "user@gmail.com".into(),
        };
        assert!(err.remediation().unwrap().contains("app password"));

        let err = Error::TcpConnect {
            target: "imap.gmail.com:993".into(),
            source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
        };
        assert!(err.remediation().is_none());
    }
}
