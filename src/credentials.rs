//! App-password acquisition.
//!
//! The secret can live in several places; resolution walks an ordered
//! provider chain and short-circuits on the first hit:
//!
//! 1. the `APP_PASSWORD` environment variable,
//! 2. the OS credential store (when enabled; desktop platforms only),
//! 3. an interactive masked prompt.
//!
//! A resolved secret that does not look like an app password produces a
//! warning, not an error - some providers hand out differently-shaped
//! secrets and the server is the final judge.

use crate::error::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use std::io::Write;
use tracing::{debug, warn};

/// Service name under which the secret is filed in the OS credential store.
pub const KEYCHAIN_SERVICE: &str = "magic-login";

/// Environment variable consulted first.
pub const APP_PASSWORD_VAR: &str = "APP_PASSWORD";

/// One source in the credential resolution chain.
pub struct Provider<'a> {
    name: &'static str,
    fetch: Box<dyn Fn() -> Option<SecretString> + 'a>,
}

impl<'a> Provider<'a> {
    /// Creates a named provider from a fetch function.
    pub fn new(name: &'static str, fetch: impl Fn() -> Option<SecretString> + 'a) -> Self {
        Self {
            name,
            fetch: Box::new(fetch),
        }
    }

    /// The provider's name, used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl std::fmt::Debug for Provider<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Walks the providers in order and returns the first secret found, along
/// with the name of the provider that produced it.
///
/// Later providers are not consulted once one succeeds - the prompt must
/// never fire when the environment already has the secret.
#[must_use]
pub fn resolve_chain<'a>(providers: &[Provider<'a>]) -> Option<(&'static str, SecretString)> {
    for provider in providers {
        if let Some(secret) = (provider.fetch)() {
            debug!(source = provider.name, "Credential resolved");
            return Some((provider.name, secret));
        }
        debug!(source = provider.name, "Credential source empty");
    }
    None
}

/// Resolves the app password for `account` through the standard chain.
///
/// # Errors
///
/// Returns [`Error::CredentialUnavailable`] when every source (environment,
/// keychain, prompt) comes up empty.
pub fn resolve_app_password(account: &str, use_keychain: bool) -> Result<SecretString> {
    let mut providers: Vec<Provider<'_>> = vec![Provider::new("environment", || {
        std::env::var(APP_PASSWORD_VAR)
            .ok()
            .filter(|s| !s.is_empty())
            .map(SecretString::from)
    })];

    if use_keychain {
        providers.push(Provider::new("keychain", move || keychain_lookup(account)));
    }

    providers.push(Provider::new("prompt", move || prompt_for_password(account)));

    let (source, secret) =
        resolve_chain(&providers).ok_or(Error::CredentialUnavailable)?;

    if let Some(reason) = format_warning(secret.expose_secret()) {
        warn!(
            source,
            reason = %reason,
            "Secret does not look like an app password; continuing with it as given"
        );
    }

    Ok(secret)
}

/// Checks the secret against the expected app-password shape.
///
/// Google app passwords are sixteen lowercase letters, usually displayed in
/// four groups of four; spaces are ignored. Returns a description of the
/// mismatch, or `None` when the shape is as expected.
#[must_use]
pub fn format_warning(secret: &str) -> Option<String> {
    let compact: String = secret.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.len() == 16 && compact.chars().all(|c| c.is_ascii_lowercase()) {
        None
    } else {
        Some(format!(
            "expected 16 letters, got {} significant characters",
            compact.len()
        ))
    }
}

#[cfg(any(target_os = "macos", target_os = "windows", target_os = "linux"))]
fn keychain_lookup(account: &str) -> Option<SecretString> {
    let entry = match keyring::Entry::new(KEYCHAIN_SERVICE, account) {
        Ok(entry) => entry,
        Err(e) => {
            warn!(error = %e, "Credential store unavailable");
            return None;
        }
    };

    match entry.get_password() {
        Ok(password) => Some(SecretString::from(password)),
        Err(keyring::Error::NoEntry) => {
            debug!(account, service = KEYCHAIN_SERVICE, "No keychain entry");
            None
        }
        Err(e) => {
            warn!(error = %e, "Keychain lookup failed");
            None
        }
    }
}

#[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
fn keychain_lookup(_account: &str) -> Option<SecretString> {
    None
}

/// Masked interactive prompt. Empty input counts as "no answer" so the
/// chain can fail cleanly in non-interactive runs.
fn prompt_for_password(account: &str) -> Option<SecretString> {
    eprint!("App password for {account}: ");
    std::io::stderr().flush().ok()?;

    rpassword::read_password()
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(SecretString::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_chain_returns_first_hit() {
        let providers = [
            Provider::new("first", || None),
            Provider::new("second", || Some(SecretString::from("from-second".to_string()))),
            Provider::new("third", || Some(SecretString::from("from-third".to_string()))),
        ];

        let (source, secret) = resolve_chain(&providers).unwrap();
        assert_eq!(source, "second");
        assert_eq!(secret.expose_secret(), "from-second");
    }

    #[test]
    fn test_chain_short_circuits() {
        let third_called = Cell::new(false);
        let providers = [
            Provider::new("first", || Some(SecretString::from("hit".to_string()))),
            Provider::new("second", || {
                third_called.set(true);
                None
            }),
        ];

        let (source, _) = resolve_chain(&providers).unwrap();
        assert_eq!(source, "first");
        assert!(!third_called.get());
    }

    #[test]
    fn test_chain_empty_when_all_miss() {
        let providers = [Provider::new("first", || None), Provider::new("second", || None)];
        assert!(resolve_chain(&providers).is_none());
    }

    #[test]
    fn test_format_warning_accepts_app_password_shape() {
        assert!(format_warning("abcdefghijklmnop").is_none());
        // Spaces between groups are how providers display them
        assert!(format_warning("abcd efgh ijkl mnop").is_none());
    }

    #[test]
    fn test_format_warning_flags_other_shapes() {
        assert!(format_warning("hunter2").is_some());
        assert!(format_warning("ABCDEFGHIJKLMNOP").is_some());
        assert!(format_warning("abcd1234efgh5678").is_some());
    }
}
