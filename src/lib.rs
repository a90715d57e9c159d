//! # magic-login
//!
//! Automates an email magic-code sign-in: drives a browser to the login
//! page, submits the account email, polls the mailbox over IMAP until the
//! one-time code arrives, extracts it, and types it back into the page.
//!
//! Two components do the work:
//!
//! - [`MailboxPoller`] - owns the IMAP connection and decides, from a
//!   stream of mailbox state, which message is *the* code for the current
//!   attempt (staleness rejection, latest-wins disambiguation, and a
//!   mark-read side effect on exactly the winning message).
//! - [`LoginDriver`] - owns the browser and fills the forms, resilient to
//!   markup drift through the ordered locator lists in [`selectors`].
//!
//! The `magic-login` binary wires the two together; the library surface is
//! usable on its own for the mailbox half.
//!
//! ## Quick Start
//!
//! ```no_run
//! use magic_login::{Config, MailboxPoller};
//! use std::time::Duration;
//!
//! # async fn example() -> magic_login::Result<()> {
//! let config = Config::builder()
//!     .email("user+expensify@gmail.com")
//!     .app_password("app-password")
//!     .login_url("https://app.example.com/signin")
//!     .from_email("codes@example.com")
//!     .build()?;
//!
//! // IMAP logs in as user@gmail.com; the +tag stays on the form address.
//! let poller = MailboxPoller::connect(config).await?;
//! let mut guard = poller.into_guard();
//!
//! let code = guard
//!     .wait_for_code("codes@example.com", Duration::from_secs(120), None)
//!     .await?;
//! println!("Got code: {}", code.code);
//!
//! guard.logout().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All errors implement `std::error::Error`. [`Error::kind`] separates
//! mailbox-access failures from plain timeouts, and [`Error::remediation`]
//! carries the fix where one is known:
//!
//! ```
//! use magic_login::Error;
//!
//! fn report(error: &Error) {
//!     eprintln!("{} error: {}", error.kind(), error);
//!     if let Some(hint) = error.remediation() {
//!         eprintln!("  hint: {hint}");
//!     }
//! }
//! ```
//!
//! ## Observability
//!
//! The crate uses `tracing` for instrumentation. Major operations emit
//! spans with structured fields:
//!
//! - `MailboxPoller::connect` / `wait_for_code` / `logout`
//! - `LoginDriver::navigate` / `submit_email` / `submit_code` / `await_success`
//! - `session::authenticate`, `connection::establish_tls`

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Public modules
pub mod browser;
pub mod config;
pub mod credentials;
pub mod error;
pub mod extract;
pub mod poller;
pub mod retry;
pub mod selectors;

// Internal modules
mod connection;
mod parser;
mod session;

// Re-exports for ergonomic API
pub use browser::LoginDriver;
pub use config::{Config, ConfigBuilder, PollingConfig, TimeoutConfig};
pub use email_address::EmailAddress;
pub use error::{Error, ErrorKind, Result};
pub use poller::{ExtractedCode, MailboxPoller, MailboxPollerGuard};
