//! Integration tests for magic-login.
//!
//! The mailbox tests require a real IMAP account and are disabled by
//! default. To run them:
//!
//! ```bash
//! # Set environment variables (or put them in .env)
//! export MAGIC_LOGIN_TEST_EMAIL="your@gmail.com"
//! export MAGIC_LOGIN_TEST_APP_PASSWORD="your-app-password"
//!
//! # Run with the integration-tests feature
//! cargo test --features integration-tests -- --ignored
//! ```

use magic_login::{Config, Error, MailboxPoller};
use std::env;
use std::time::Duration;

// ─────────────────────────────────────────────────────────────────────────────
// Test Configuration Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn get_test_credentials() -> Option<(String, String)> {
    dotenvy::dotenv().ok();
    let email = env::var("MAGIC_LOGIN_TEST_EMAIL").ok()?;
    let password = env::var("MAGIC_LOGIN_TEST_APP_PASSWORD").ok()?;
    Some((email, password))
}

fn get_test_config() -> Option<Config> {
    let (email, password) = get_test_credentials()?;

    Config::builder()
        .email(email)
        .app_password(password)
        .login_url("https://app.example.com/signin")
        .from_email("codes@example.com")
        .build()
        .ok()
}

fn get_test_config_with_short_wait() -> Option<Config> {
    let (email, password) = get_test_credentials()?;

    Config::builder()
        .email(email)
        .app_password(password)
        .login_url("https://app.example.com/signin")
        .from_email("codes@example.com")
        .max_wait(Duration::from_secs(5))
        .poll_interval(Duration::from_secs(1))
        .build()
        .ok()
}

// ─────────────────────────────────────────────────────────────────────────────
// Connection Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
#[ignore = "requires real IMAP account"]
async fn test_connect_and_logout() {
    let config = get_test_config().expect("Test config from environment variables");

    let mut poller = MailboxPoller::connect(config)
        .await
        .expect("Failed to connect");

    assert!(!poller.account().is_empty());

    poller.logout().await.expect("Failed to logout");
}

#[tokio::test]
#[ignore = "requires real IMAP account"]
async fn test_guard_auto_logout() {
    let config = get_test_config().expect("Test config from environment variables");

    let poller = MailboxPoller::connect(config)
        .await
        .expect("Failed to connect");

    // Guard logs out on drop; exercise the explicit path too
    let guard = poller.into_guard();
    guard.logout().await.expect("Failed to logout");
}

// ─────────────────────────────────────────────────────────────────────────────
// Code Wait Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
#[ignore = "requires real IMAP account"]
async fn test_wait_for_code_times_out_cleanly() {
    let config = get_test_config_with_short_wait().expect("Test config from environment variables");

    let mut poller = MailboxPoller::connect(config)
        .await
        .expect("Failed to connect");

    // Nobody sends codes from this address; the wait must end in a
    // WaitTimeout, not hang and not flag anything read.
    let result = poller
        .wait_for_code(
            "nobody-sends-from-here@example.invalid",
            Duration::from_secs(5),
            None,
        )
        .await;

    assert!(matches!(result, Err(Error::WaitTimeout { .. })));

    poller.logout().await.expect("Failed to logout");
}

#[tokio::test]
#[ignore = "requires real IMAP account and a manually sent code mail"]
async fn test_wait_for_code_picks_up_live_mail() {
    let config = get_test_config().expect("Test config from environment variables");
    let (email, _) = get_test_credentials().unwrap();

    let mut poller = MailboxPoller::connect(config)
        .await
        .expect("Failed to connect");

    // Send yourself a mail titled "magic code: 123456" while this runs.
    let result = poller
        .wait_for_code(&email, Duration::from_secs(60), None)
        .await;

    match result {
        Ok(code) => {
            assert!(code.code.chars().all(|c| c.is_ascii_digit()));
            println!("Picked up code {} from UID {}", code.code, code.uid);
        }
        Err(e) => {
            println!("No code arrived (expected if nothing was sent): {e}");
        }
    }

    poller.logout().await.expect("Failed to logout");
}

// ─────────────────────────────────────────────────────────────────────────────
// Error Handling Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
#[ignore = "requires intentionally wrong credentials"]
async fn test_invalid_credentials_surface_access_error() {
    let config = Config::builder()
        .email("test@gmail.com")
        .app_password("wrong-password")
        .login_url("https://app.example.com/signin")
        .from_email("codes@example.com")
        .build()
        .expect("valid config structure");

    let result = MailboxPoller::connect(config).await;

    assert!(result.is_err());
    let err = result.unwrap_err();
    println!("Connection error ({}): {}", err.kind(), err);
    if let Some(hint) = err.remediation() {
        println!("hint: {hint}");
    }
}

#[tokio::test]
async fn test_invalid_email_format() {
    let result = Config::builder()
        .email("not-an-email")
        .app_password("password")
        .login_url("https://app.example.com/signin")
        .from_email("codes@example.com")
        .build();

    assert!(result.is_err());
}

#[tokio::test]
async fn test_missing_required_fields() {
    // Missing email
    let result = Config::builder()
        .app_password("password")
        .login_url("https://app.example.com/signin")
        .from_email("codes@example.com")
        .build();
    assert!(matches!(result, Err(Error::MissingConfig { .. })));

    // Missing login URL
    let result = Config::builder()
        .email("test@example.com")
        .app_password("password")
        .from_email("codes@example.com")
        .build();
    assert!(matches!(result, Err(Error::MissingConfig { .. })));
}
