//! Verification-code extraction rules.
//!
//! Two rules, evaluated in order:
//!
//! 1. **Subject label** - a digit run immediately following the fixed
//!    [`CODE_LABEL`] substring in the subject line. This is how the target
//!    service titles its mails (`"Expensify magic code: 147826"`), and it
//!    is unambiguous, so it always wins.
//! 2. **Body fallback** - the first standalone run of exactly six digits
//!    anywhere in the plain-text or HTML body. Catches templates that put
//!    the code only in the message body.
//!
//! ```
//! use magic_login::extract::extract_code;
//!
//! let code = extract_code("Expensify magic code: 147826", "");
//! assert_eq!(code.as_deref(), Some("147826"));
//! ```

use once_cell::sync::Lazy;
use regex::Regex;

/// The label substring that precedes the code in the subject line.
///
/// Also used as the `SUBJECT` term of the mailbox search, so only mails
/// carrying this label are ever fetched.
pub const CODE_LABEL: &str = "magic code";

/// Digit run immediately after the subject label, any separator between.
static SUBJECT_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)magic code[\s:=\-]*(\d+)").expect("valid regex"));

/// Standalone six-digit run. `\b` keeps it from matching inside a longer
/// digit sequence (order numbers, timestamps).
static BODY_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{6})\b").expect("valid regex"));

/// Extracts the verification code from a message, subject rule first.
///
/// Returns `None` when neither rule matches; the poller treats that as
/// "not the code mail" and keeps waiting.
#[must_use]
pub fn extract_code(subject: &str, body: &str) -> Option<String> {
    from_subject(subject).or_else(|| from_body(body))
}

fn from_subject(subject: &str) -> Option<String> {
    SUBJECT_CODE
        .captures(subject)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn from_body(body: &str) -> Option<String> {
    BODY_CODE
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_label_extraction() {
        assert_eq!(
            extract_code("Expensify magic code: 147826", "").as_deref(),
            Some("147826")
        );
    }

    #[test]
    fn test_subject_label_case_insensitive() {
        assert_eq!(
            extract_code("Your Magic Code - 002481", "").as_deref(),
            Some("002481")
        );
    }

    #[test]
    fn test_body_fallback() {
        let body = "Hi,\n\nUse 482913 to finish signing in.\n";
        assert_eq!(
            extract_code("Finish signing in", body).as_deref(),
            Some("482913")
        );
    }

    #[test]
    fn test_subject_takes_precedence_over_body() {
        // Both rules would match; the subject rule must win.
        let code = extract_code("magic code: 147826", "fallback would find 482913 here");
        assert_eq!(code.as_deref(), Some("147826"));
    }

    #[test]
    fn test_body_fallback_requires_exactly_six_digits() {
        assert_eq!(extract_code("hello", "code 12345 end"), None);
        assert_eq!(extract_code("hello", "ref 1234567 end"), None);
        // Six digits embedded in a longer run do not count as standalone
        assert_eq!(extract_code("hello", "order 20250114826 end"), None);
    }

    #[test]
    fn test_body_fallback_in_html() {
        let body = r#"<td style="font-size:24px">482913</td>"#;
        assert_eq!(extract_code("hello", body).as_deref(), Some("482913"));
    }

    #[test]
    fn test_no_match_anywhere() {
        assert_eq!(extract_code("Welcome aboard", "no digits here"), None);
    }

    #[test]
    fn test_label_without_adjacent_digits_falls_through() {
        // Label present but no numeric run after it: body rule applies.
        let code = extract_code("magic code inside", "your code is 654321.");
        assert_eq!(code.as_deref(), Some("654321"));
    }
}
