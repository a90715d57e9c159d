//! Orchestrator: one sequential login run.
//!
//! Reads configuration from the environment (with `.env` support), resolves
//! the app password through the credential chain, then walks the flow:
//! navigate → submit email → wait for the code → submit code → confirm.
//! On success the process parks until Ctrl-C so the session stays usable;
//! teardown (mailbox logout, browser close) is RAII on every path.

use chrono::Utc;
use magic_login::{config, credentials, Config, LoginDriver, MailboxPoller, Result};
use secrecy::ExposeSecret;
use std::process::ExitCode;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(kind = %e.kind(), error = %e, "Login attempt failed");
            if let Some(hint) = e.remediation() {
                error!("hint: {hint}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = load_config()?;
    info!(
        email = config.email(),
        login_url = %config.login_url,
        "Starting login attempt"
    );

    let driver = LoginDriver::launch(&config)?;
    driver.navigate(config.login_url.as_str()).await?;

    // Captured before the email goes out: anything received earlier belongs
    // to a previous attempt and must not win.
    let attempt_started = Utc::now();

    if driver.submit_email(config.email())? {
        let poller = MailboxPoller::connect(config.clone()).await?;
        let mut guard = poller.into_guard();

        let outcome = guard
            .wait_for_code(
                config.from_email.as_str(),
                config.polling.max_wait,
                Some(attempt_started),
            )
            .await;

        // Close the mailbox before touching the browser again, whatever
        // the wait produced.
        if let Err(e) = guard.logout().await {
            warn!(error = %e, "Mailbox logout failed");
        }

        let code = outcome?;
        info!(uid = code.uid, "Verification code received");

        driver.submit_code(&code.code)?;
        driver.await_success().await?;
    } else {
        info!("Existing session found, skipping login");
    }

    info!("Session ready; press Ctrl-C to close the browser and exit");
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not listen for Ctrl-C; exiting now");
    }

    // Dropping the driver closes the browser and releases the profile.
    drop(driver);
    Ok(())
}

/// Builds the run configuration from the environment.
///
/// Required: `EMAIL`, `LOGIN_URL`, `FROM_EMAIL`. The app password comes
/// from the credential chain (`APP_PASSWORD` → keychain → prompt);
/// `USE_KEYCHAIN=false` skips the store.
fn load_config() -> Result<Config> {
    let email = require_var("EMAIL")?;
    let login_url = require_var("LOGIN_URL")?;
    let from_email = require_var("FROM_EMAIL")?;

    let use_keychain = env_flag("USE_KEYCHAIN", true);
    // Resolve against the mailbox account so the keychain entry matches
    // whichever alias tag the login address carries.
    let account = config::base_account(&email);
    let app_password = credentials::resolve_app_password(&account, use_keychain)?;

    let mut builder = Config::builder()
        .email(email)
        .app_password(app_password.expose_secret().to_string())
        .login_url(login_url)
        .from_email(from_email)
        .headless(env_flag("HEADLESS", false))
        .devtools(env_flag("DEVTOOLS", false));

    if let Ok(host) = std::env::var("IMAP_HOST") {
        builder = builder.imap_host(host);
    }
    if let Ok(dir) = std::env::var("PROFILE_DIR") {
        builder = builder.profile_dir(dir);
    }

    builder.build()
}

fn require_var(name: &str) -> Result<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| magic_login::Error::MissingConfig { name: name.into() })
}

fn env_flag(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}
