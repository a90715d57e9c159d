//! Internal IMAP session management.
//!
//! This module wraps async-imap operations with proper error handling. All
//! fetches use `BODY.PEEK[]` so inspecting a message never sets `\Seen`;
//! the only flag mutation is the explicit [`mark_seen`] on the winning
//! candidate.

use crate::connection::TlsStream;
use crate::error::{Error, Result};
use async_imap::Session;
use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::{debug, instrument};

/// Type alias for the IMAP session over TLS.
pub(crate) type ImapSession = Session<TlsStream>;

/// Authentication configuration for IMAP.
pub(crate) struct AuthConfig<'a> {
    pub account: &'a str,
    pub password: &'a str,
}

/// Authenticates to the IMAP server and returns a session.
///
/// Distinguishes the provider's "use an app password" rejection from a
/// plain bad-credential failure, so the caller can print the right
/// remediation.
#[instrument(
    name = "session::authenticate",
    skip_all,
    fields(account = %config.account)
)]
pub(crate) async fn authenticate(
    tls_stream: TlsStream,
    config: &AuthConfig<'_>,
) -> Result<ImapSession> {
    let client = async_imap::Client::new(tls_stream);

    debug!("Authenticating to IMAP server");

    client
        .login(config.account, config.password)
        .await
        .map_err(|e| classify_login_error(config.account, e.0))
}

/// Maps a login rejection onto the access-error taxonomy.
///
/// Gmail answers plain-password logins on app-password-only accounts with a
/// NO response naming "application-specific password"; that phrasing is the
/// only signal the protocol gives us.
fn classify_login_error(account: &str, source: async_imap::error::Error) -> Error {
    let text = source.to_string().to_lowercase();
    if text.contains("application-specific password") || text.contains("app password") {
        Error::AppPasswordRequired {
            email: account.to_string(),
        }
    } else {
        Error::AuthenticationFailed {
            email: account.to_string(),
            source,
        }
    }
}

/// Selects a mailbox (typically "INBOX").
#[instrument(name = "session::select", skip(session), fields(mailbox = %mailbox))]
pub(crate) async fn select_mailbox(session: &mut ImapSession, mailbox: &str) -> Result<()> {
    debug!("Selecting mailbox");

    session
        .select(mailbox)
        .await
        .map_err(|source| Error::SelectMailbox {
            mailbox: mailbox.to_string(),
            source,
        })?;

    Ok(())
}

/// Searches for unread messages from a sender whose subject contains the
/// given label. Returns UIDs in ascending order, so downstream fetch order
/// is deterministic.
#[instrument(
    name = "session::search_unread",
    skip(session),
    fields(from = %from, subject = %subject_label)
)]
pub(crate) async fn search_unread(
    session: &mut ImapSession,
    from: &str,
    subject_label: &str,
) -> Result<Vec<u32>> {
    // NOOP to ensure we see messages delivered since the last round-trip
    session
        .noop()
        .await
        .map_err(|source| Error::ImapSearch { source })?;

    let query = format!("UNSEEN FROM \"{from}\" SUBJECT \"{subject_label}\"");

    let uids = session
        .uid_search(&query)
        .await
        .map_err(|source| Error::ImapSearch { source })?;

    let mut uids: Vec<u32> = uids.into_iter().collect();
    uids.sort_unstable();

    debug!(uid_count = uids.len(), "Search complete");

    Ok(uids)
}

/// Fetches messages for a UID set, without touching the `\Seen` flag.
///
/// Returns a boxed stream of fetch results carrying UID, INTERNALDATE, and
/// the full body.
pub(crate) async fn fetch_candidates<'a>(
    session: &'a mut ImapSession,
    uid_set: &str,
) -> Result<BoxStream<'a, std::result::Result<async_imap::types::Fetch, async_imap::error::Error>>>
{
    debug!(uid_set = %uid_set, "Fetching candidate messages");

    let stream = session
        .uid_fetch(uid_set, "(UID INTERNALDATE BODY.PEEK[])")
        .await
        .map_err(|source| Error::ImapFetch {
            uid_set: uid_set.to_string(),
            source,
        })?;

    Ok(stream.boxed())
}

/// Flags one message as read.
///
/// `+FLAGS.SILENT` is idempotent: re-flagging an already-read message is a
/// no-op on the server.
#[instrument(name = "session::mark_seen", skip(session), fields(uid))]
pub(crate) async fn mark_seen(session: &mut ImapSession, uid: u32) -> Result<()> {
    let mut responses = session
        .uid_store(uid.to_string(), "+FLAGS.SILENT (\\Seen)")
        .await
        .map_err(|source| Error::MarkSeen { uid, source })?;

    while let Some(response) = responses.next().await {
        response.map_err(|source| Error::MarkSeen { uid, source })?;
    }

    debug!(uid, "Marked read");

    Ok(())
}

/// Logs out from the IMAP session.
#[instrument(name = "session::logout", skip(session))]
pub(crate) async fn logout(session: &mut ImapSession) -> Result<()> {
    debug!("Logging out");

    session
        .logout()
        .await
        .map_err(|source| Error::ImapLogout { source })?;

    Ok(())
}
