//! Internal module for turning fetched messages into poll-cycle candidates.

use chrono::{DateTime, TimeZone, Utc};
use mailparse::{parse_mail, MailHeaderMap};
use tracing::{debug, warn};

/// One mailbox message inspected during a poll cycle.
///
/// Materialized from a fetch result and discarded when the cycle resolves.
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    /// Mailbox UID of the message.
    pub uid: u32,
    /// Server receive time (INTERNALDATE, Date header as fallback).
    pub received_at: DateTime<Utc>,
    /// Decoded subject line.
    pub subject: String,
    /// Extracted text content (text/plain preferred, text/html fallback).
    pub body: String,
}

/// Builds a [`Candidate`] from an IMAP fetch result.
///
/// Designed to be resilient: malformed messages are logged and skipped
/// (`None`) rather than failing the poll cycle - a broken message in the
/// inbox must not block the one carrying the code.
pub(crate) fn candidate_from_fetch(message: &async_imap::types::Fetch) -> Option<Candidate> {
    let Some(uid) = message.uid else {
        warn!("Fetch result without UID, skipping message");
        return None;
    };

    let Some(raw) = message.body() else {
        debug!(uid, "Message has no body");
        return None;
    };

    let parsed = match parse_mail(raw) {
        Ok(p) => p,
        Err(e) => {
            warn!(uid, error = %e, "Failed to parse email, skipping message");
            return None;
        }
    };

    let subject = parsed
        .headers
        .get_first_value("Subject")
        .unwrap_or_default();

    let Some(received_at) = message
        .internal_date()
        .map(|d| d.with_timezone(&Utc))
        .or_else(|| header_date(&parsed))
    else {
        // Without a timestamp the message cannot participate in
        // latest-wins selection or staleness filtering.
        warn!(uid, "Message has no recoverable timestamp, skipping");
        return None;
    };

    let body = match extract_body_text(&parsed) {
        Ok(t) => t,
        Err(e) => {
            warn!(uid, error = %e, "Failed to extract body, continuing with subject only");
            String::new()
        }
    };

    Some(Candidate {
        uid,
        received_at,
        subject,
        body,
    })
}

/// Parses the Date header into a UTC timestamp.
fn header_date(parsed: &mailparse::ParsedMail<'_>) -> Option<DateTime<Utc>> {
    let raw = parsed.headers.get_first_value("Date")?;
    let epoch = mailparse::dateparse(&raw).ok()?;
    Utc.timestamp_opt(epoch, 0).single()
}

/// Extracts text content from a parsed email, handling multipart messages.
fn extract_body_text(
    parsed: &mailparse::ParsedMail<'_>,
) -> Result<String, mailparse::MailParseError> {
    if !parsed.subparts.is_empty() {
        // Prefer text/plain, fall back to text/html
        for wanted in ["text/plain", "text/html"] {
            for part in &parsed.subparts {
                if part.ctype.mimetype.to_lowercase() == wanted {
                    if let Ok(body) = part.get_body() {
                        return Ok(body);
                    }
                }
            }
        }

        if let Some(first_part) = parsed.subparts.first() {
            return extract_body_text(first_part);
        }
    }

    parsed.get_body()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_body_text_simple() {
        let raw =
            b"From: codes@example.com\r\nTo: user@gmail.com\r\n\r\nYour magic code is 123456.";
        let parsed = parse_mail(raw).unwrap();
        let text = extract_body_text(&parsed).unwrap();
        assert!(text.contains("123456"));
    }

    #[test]
    fn test_extract_body_text_prefers_plain_over_html() {
        let raw = b"From: codes@example.com\r\n\
            Content-Type: multipart/alternative; boundary=\"b\"\r\n\r\n\
            --b\r\nContent-Type: text/html\r\n\r\n<p>html 999999</p>\r\n\
            --b\r\nContent-Type: text/plain\r\n\r\nplain 123456\r\n\
            --b--\r\n";
        let parsed = parse_mail(raw).unwrap();
        let text = extract_body_text(&parsed).unwrap();
        assert!(text.contains("plain 123456"));
    }

    #[test]
    fn test_header_date_parsing() {
        let raw = b"From: codes@example.com\r\n\
            Date: Tue, 1 Jul 2025 10:52:37 +0200\r\n\r\nbody";
        let parsed = parse_mail(raw).unwrap();
        let date = header_date(&parsed).unwrap();
        assert_eq!(date.timezone(), Utc);
    }

    #[test]
    fn test_header_date_missing() {
        let raw = b"From: codes@example.com\r\n\r\nbody";
        let parsed = parse_mail(raw).unwrap();
        assert!(header_date(&parsed).is_none());
    }
}
