//! Demo: wait for a verification code without driving a browser.
//!
//! Connects to the mailbox and waits for the next unread mail from the
//! given sender that carries a magic code, then prints it.
//!
//! # Usage
//!
//! ```bash
//! export EMAIL="your@gmail.com"
//! export APP_PASSWORD="your-app-password"
//! export FROM_EMAIL="concierge@expensify.com"
//! cargo run --example wait_for_code
//! ```
//!
//! For Gmail you need an [App Password](https://support.google.com/accounts/answer/185833).

use magic_login::{Config, MailboxPoller};
use std::env;
use std::time::Duration;

#[tokio::main]
async fn main() -> magic_login::Result<()> {
    dotenvy::dotenv().ok();

    let email = env::var("EMAIL").expect("EMAIL environment variable required");
    let password = env::var("APP_PASSWORD").expect("APP_PASSWORD environment variable required");
    let from = env::var("FROM_EMAIL").expect("FROM_EMAIL environment variable required");

    let config = Config::builder()
        .email(&email)
        .app_password(password)
        // Unused here: the demo skips the browser half
        .login_url("https://app.example.com/signin")
        .from_email(&from)
        .build()?;

    println!("Connecting to the mailbox for {email}...");

    let poller = MailboxPoller::connect(config).await?;
    let mut guard = poller.into_guard();

    println!("Connected. Waiting up to 3 minutes for a code from {from}...");
    println!("(Trigger a code mail now, or press Ctrl-C to cancel)");

    let code = guard
        .wait_for_code(&from, Duration::from_secs(180), None)
        .await?;

    println!("Got code {} (UID {}, received {})", code.code, code.uid, code.received_at);

    guard.logout().await?;

    Ok(())
}
