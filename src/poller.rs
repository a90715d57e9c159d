//! Mailbox poller: watches the inbox until the verification code arrives.
//!
//! The [`MailboxPoller`] is the mailbox half of the login flow. It connects
//! once, then polls at a fixed interval for unread messages from the code
//! sender, and resolves to the single [`ExtractedCode`] intended for the
//! current attempt.
//!
//! # Selection
//!
//! A poll cycle can surface several candidate messages (codes re-requested
//! in quick succession, stale unread codes from an abandoned attempt). The
//! cycle resolves them as follows:
//!
//! - candidates received strictly before the attempt's `since` bound are
//!   discarded as stale;
//! - candidates that yield no code under the [`crate::extract`] rules are
//!   ignored for this cycle (the code mail may simply not have arrived);
//! - among the rest, the latest received timestamp wins; equal timestamps
//!   resolve to the latest position in the ascending-UID fetch order.
//!
//! Only the winning message is flagged read, and only after it has won -
//! fetches peek, so a cycle that resolves nothing mutates nothing.
//!
//! # Example
//!
//! ```no_run
//! use magic_login::{Config, MailboxPoller};
//! use std::time::Duration;
//!
//! # async fn example() -> magic_login::Result<()> {
//! # let config = Config::builder()
//! #     .email("user@gmail.com")
//! #     .app_password("x")
//! #     .login_url("https://app.example.com/signin")
//! #     .from_email("codes@example.com")
//! #     .build()?;
//! let poller = MailboxPoller::connect(config).await?;
//! let mut guard = poller.into_guard();
//!
//! let code = guard
//!     .wait_for_code("codes@example.com", Duration::from_secs(120), None)
//!     .await?;
//! println!("code: {}", code.code);
//!
//! guard.logout().await?;
//! # Ok(())
//! # }
//! ```

use crate::config::Config;
use crate::error::{Error, Result};
use crate::extract;
use crate::parser::{self, Candidate};
use crate::retry::{PollDecision, PollSchedule};
use crate::session::{self, AuthConfig, ImapSession};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

/// The numeric code recovered from the winning message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedCode {
    /// The digit string to type into the login form.
    pub code: String,
    /// UID of the message the code came from.
    pub uid: u32,
    /// When the winning message was received.
    pub received_at: DateTime<Utc>,
}

/// Async mailbox poller for verification codes.
///
/// Create using [`MailboxPoller::connect`]; call
/// [`wait_for_code`](Self::wait_for_code), then
/// [`logout`](Self::logout) - or wrap in a guard with
/// [`into_guard`](Self::into_guard) so logout happens on every exit path.
pub struct MailboxPoller {
    session: Box<ImapSession>,
    config: Config,
}

impl MailboxPoller {
    /// Connects to the IMAP server and prepares for polling.
    ///
    /// Establishes the TLS connection, authenticates with the mailbox
    /// account (alias tag stripped), and selects the INBOX. The connection
    /// is reused across all poll cycles of the attempt.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection, authentication, or mailbox
    /// selection fails or times out. An [`Error::AppPasswordRequired`] or
    /// [`Error::AuthenticationFailed`] pinpoints credential problems.
    #[instrument(
        name = "MailboxPoller::connect",
        skip_all,
        fields(
            account = %config.mailbox_account(),
            imap_host = %config.effective_imap_host()
        )
    )]
    pub async fn connect(config: Config) -> Result<Self> {
        let session = Self::initialize_session(&config).await?;

        debug!("Poller connected and ready");

        Ok(Self {
            session: Box::new(session),
            config,
        })
    }

    /// Waits until a qualifying verification code arrives, or the wait
    /// bound elapses.
    ///
    /// * `from` - sender address the code mail must come from.
    /// * `max_wait` - total wall-clock bound; on expiry the call fails with
    ///   [`Error::WaitTimeout`], never having flagged anything read.
    /// * `since` - optional lower bound on message receive time. Messages
    ///   received strictly before it are ignored, which protects the
    ///   attempt from stale unread codes left over from a previous run.
    ///
    /// At most one code is returned per invocation: the most recently
    /// received qualifying message of the resolving cycle. That message -
    /// and only that message - is flagged read before the call returns.
    ///
    /// # Errors
    ///
    /// [`Error::WaitTimeout`] when nothing qualifying arrived in time;
    /// otherwise the underlying search/fetch/store error.
    #[instrument(
        name = "MailboxPoller::wait_for_code",
        skip(self),
        fields(from = %from, max_wait_secs = max_wait.as_secs())
    )]
    pub async fn wait_for_code(
        &mut self,
        from: &str,
        max_wait: Duration,
        since: Option<DateTime<Utc>>,
    ) -> Result<ExtractedCode> {
        let schedule = PollSchedule::new(self.config.polling.interval, max_wait);
        let started = Instant::now();

        loop {
            if let Some(found) = self.poll_cycle(from, since).await? {
                debug!(uid = found.uid, "Code acquired");
                return Ok(found);
            }

            match schedule.decide(started.elapsed()) {
                PollDecision::RetryAfter(delay) => tokio::time::sleep(delay).await,
                PollDecision::GiveUp => {
                    return Err(Error::WaitTimeout {
                        from: from.to_string(),
                        timeout: max_wait,
                    })
                }
            }
        }
    }

    /// Logs out from the IMAP server.
    ///
    /// # Errors
    ///
    /// Returns an error if the logout command fails.
    #[instrument(name = "MailboxPoller::logout", skip(self))]
    pub async fn logout(&mut self) -> Result<()> {
        session::logout(&mut self.session).await
    }

    /// Converts this poller into a guard that logs out on drop.
    ///
    /// The mailbox session must be released on every exit path of a login
    /// attempt - success, failure, or timeout - and the guard makes that
    /// hold through early `?` returns.
    #[must_use]
    pub fn into_guard(self) -> MailboxPollerGuard {
        MailboxPollerGuard { inner: Some(self) }
    }

    /// Returns the mailbox account this poller is logged in as.
    #[must_use]
    pub fn account(&self) -> String {
        self.config.mailbox_account()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Private methods
    // ─────────────────────────────────────────────────────────────────────────

    /// Connects, authenticates, and selects INBOX, each under its own timeout.
    async fn initialize_session(config: &Config) -> Result<ImapSession> {
        let imap_host = config.effective_imap_host();
        let target_addr = config.server_address();
        let account = config.mailbox_account();
        let timeouts = &config.timeouts;

        let tls_stream = tokio::time::timeout(
            timeouts.connect,
            crate::connection::establish_tls_connection(&imap_host, &target_addr),
        )
        .await
        .map_err(|_| Error::ConnectTimeout {
            target: target_addr.clone(),
            timeout: timeouts.connect,
        })??;

        debug!("TLS connection established");

        let auth_config = AuthConfig {
            account: &account,
            password: config.app_password(),
        };

        let mut session = tokio::time::timeout(
            timeouts.auth,
            session::authenticate(tls_stream, &auth_config),
        )
        .await
        .map_err(|_| Error::AuthTimeout {
            email: account.clone(),
            timeout: timeouts.auth,
        })??;

        debug!("Authenticated");

        tokio::time::timeout(
            timeouts.select,
            session::select_mailbox(&mut session, "INBOX"),
        )
        .await
        .map_err(|_| Error::SelectTimeout {
            mailbox: "INBOX".to_string(),
            timeout: timeouts.select,
        })??;

        debug!("Selected INBOX");

        Ok(session)
    }

    /// Runs one poll cycle: search, fetch, select, flag.
    ///
    /// Returns `Ok(None)` when the code has not arrived yet (no matches, or
    /// matches that yielded no code), which the wait loop treats as "keep
    /// polling".
    #[instrument(name = "MailboxPoller::poll_cycle", skip(self, since))]
    async fn poll_cycle(
        &mut self,
        from: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Option<ExtractedCode>> {
        let timeouts = self.config.timeouts.clone();

        let uids = tokio::time::timeout(
            timeouts.search,
            session::search_unread(&mut self.session, from, extract::CODE_LABEL),
        )
        .await
        .map_err(|_| Error::SearchTimeout {
            timeout: timeouts.search,
        })??;

        if uids.is_empty() {
            return Ok(None);
        }

        let uid_set = uids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");

        debug!(uid_set = %uid_set, "Unread matches found, fetching");

        let candidates = {
            let mut stream = tokio::time::timeout(
                timeouts.fetch,
                session::fetch_candidates(&mut self.session, &uid_set),
            )
            .await
            .map_err(|_| Error::FetchTimeout {
                uid_set: uid_set.clone(),
                timeout: timeouts.fetch,
            })??;

            let mut candidates = Vec::new();
            while let Some(message_result) = stream.next().await {
                let message = message_result.map_err(|source| Error::FetchMessage { source })?;
                if let Some(candidate) = parser::candidate_from_fetch(&message) {
                    candidates.push(candidate);
                }
            }
            candidates
        };

        let Some((index, code)) = select_winner(&candidates, since) else {
            debug!(
                candidates = candidates.len(),
                "No qualifying candidate this cycle"
            );
            return Ok(None);
        };

        let winner = &candidates[index];

        tokio::time::timeout(
            timeouts.store,
            session::mark_seen(&mut self.session, winner.uid),
        )
        .await
        .map_err(|_| Error::StoreTimeout {
            uid: winner.uid,
            timeout: timeouts.store,
        })??;

        Ok(Some(ExtractedCode {
            code,
            uid: winner.uid,
            received_at: winner.received_at,
        }))
    }
}

impl std::fmt::Debug for MailboxPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailboxPoller")
            .field("account", &self.config.mailbox_account())
            .field("imap_host", &self.config.effective_imap_host())
            .finish_non_exhaustive()
    }
}

/// Picks the winning candidate: latest receive time among those that are
/// not stale and yielded a code; equal timestamps resolve to the latest
/// fetch position, so the outcome is deterministic for a given fetch order.
fn select_winner(
    candidates: &[Candidate],
    since: Option<DateTime<Utc>>,
) -> Option<(usize, String)> {
    candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| since.map_or(true, |bound| c.received_at >= bound))
        .filter_map(|(i, c)| extract::extract_code(&c.subject, &c.body).map(|code| (i, code)))
        .max_by_key(|&(i, _)| (candidates[i].received_at, i))
}

/// RAII guard for [`MailboxPoller`] that logs out on drop.
///
/// Created by [`MailboxPoller::into_guard`].
pub struct MailboxPollerGuard {
    inner: Option<MailboxPoller>,
}

impl MailboxPollerGuard {
    /// Waits for a verification code. See [`MailboxPoller::wait_for_code`].
    ///
    /// # Panics
    ///
    /// Panics if the guard has already been consumed by [`logout`](Self::logout).
    ///
    /// # Errors
    ///
    /// Returns an error if the wait times out or a mailbox operation fails.
    pub async fn wait_for_code(
        &mut self,
        from: &str,
        max_wait: Duration,
        since: Option<DateTime<Utc>>,
    ) -> Result<ExtractedCode> {
        self.inner
            .as_mut()
            .expect("guard already consumed")
            .wait_for_code(from, max_wait, since)
            .await
    }

    /// Explicitly logs out and consumes the guard.
    ///
    /// If not called, the guard will attempt to log out on drop.
    ///
    /// # Errors
    ///
    /// Returns an error if the logout command fails.
    pub async fn logout(mut self) -> Result<()> {
        if let Some(mut poller) = self.inner.take() {
            poller.logout().await
        } else {
            Ok(())
        }
    }
}

impl Drop for MailboxPollerGuard {
    fn drop(&mut self) {
        if let Some(mut poller) = self.inner.take() {
            let logout_timeout = poller.config.timeouts.logout;

            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        match tokio::time::timeout(logout_timeout, poller.logout()).await {
                            Ok(Ok(())) => debug!("Mailbox session logged out"),
                            Ok(Err(e)) => warn!(error = %e, "Mailbox logout failed"),
                            Err(_) => warn!(
                                timeout_secs = logout_timeout.as_secs(),
                                "Mailbox logout timed out"
                            ),
                        }
                    });
                }
                Err(_) => {
                    warn!(
                        "MailboxPollerGuard dropped outside of a tokio runtime; the \
                         connection closes without a clean IMAP logout. Call \
                         .logout().await explicitly where possible."
                    );
                }
            }
        }
    }
}

impl std::fmt::Debug for MailboxPollerGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailboxPollerGuard")
            .field("inner", &self.inner)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn candidate(uid: u32, received_at: DateTime<Utc>, subject: &str, body: &str) -> Candidate {
        Candidate {
            uid,
            received_at,
            subject: subject.to_string(),
            body: body.to_string(),
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_750_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_latest_timestamp_wins() {
        let candidates = vec![
            candidate(10, at(0), "magic code: 111111", ""),
            candidate(11, at(30), "magic code: 333333", ""),
            candidate(12, at(10), "magic code: 222222", ""),
        ];

        let (index, code) = select_winner(&candidates, None).unwrap();
        assert_eq!(code, "333333");
        assert_eq!(candidates[index].uid, 11);
    }

    #[test]
    fn test_since_excludes_stale_candidates() {
        let since = at(0);
        let candidates = vec![
            candidate(10, at(-5), "magic code: 111111", ""),
            candidate(11, at(5), "magic code: 222222", ""),
        ];

        let (_, code) = select_winner(&candidates, Some(since)).unwrap();
        assert_eq!(code, "222222");
    }

    #[test]
    fn test_stale_candidate_excluded_even_when_alone() {
        let candidates = vec![candidate(10, at(-5), "magic code: 111111", "")];
        assert!(select_winner(&candidates, Some(at(0))).is_none());
    }

    #[test]
    fn test_candidate_exactly_at_since_is_accepted() {
        let candidates = vec![candidate(10, at(0), "magic code: 111111", "")];
        let (_, code) = select_winner(&candidates, Some(at(0))).unwrap();
        assert_eq!(code, "111111");
    }

    #[test]
    fn test_codeless_candidates_do_not_win() {
        let candidates = vec![
            candidate(10, at(50), "Welcome aboard", "no digits"),
            candidate(11, at(1), "magic code: 222222", ""),
        ];

        // The newer message has no code; the older one still wins.
        let (_, code) = select_winner(&candidates, None).unwrap();
        assert_eq!(code, "222222");
    }

    #[test]
    fn test_no_candidates_no_winner() {
        assert!(select_winner(&[], None).is_none());

        let candidates = vec![candidate(10, at(0), "Welcome aboard", "nothing")];
        assert!(select_winner(&candidates, None).is_none());
    }

    #[test]
    fn test_equal_timestamps_resolve_to_latest_fetch_position() {
        let candidates = vec![
            candidate(10, at(0), "magic code: 111111", ""),
            candidate(11, at(0), "magic code: 222222", ""),
        ];

        let (index, code) = select_winner(&candidates, None).unwrap();
        assert_eq!(index, 1);
        assert_eq!(code, "222222");
    }

    #[test]
    fn test_body_fallback_participates_in_selection() {
        let candidates = vec![
            candidate(10, at(0), "magic code: 111111", ""),
            candidate(11, at(20), "Finish signing in", "use 482913 to continue"),
        ];

        let (_, code) = select_winner(&candidates, None).unwrap();
        assert_eq!(code, "482913");
    }

    #[test]
    fn test_at_most_one_winner() {
        let candidates = vec![
            candidate(10, at(0), "magic code: 111111", ""),
            candidate(11, at(1), "magic code: 222222", ""),
            candidate(12, at(2), "magic code: 333333", ""),
        ];

        // select_winner returns a single index by construction; make sure
        // repeated evaluation is stable too.
        let first = select_winner(&candidates, None).unwrap();
        let second = select_winner(&candidates, None).unwrap();
        assert_eq!(first, second);
    }
}
