//! DOM locator strategies, as data.
//!
//! Each list is ordered by how likely the selector is to hit on the current
//! markup; the driver evaluates them first-match-wins with a short
//! per-candidate timeout. Markup drift is handled by editing these lists,
//! not the driver code.

/// Email input field, most specific first.
pub const EMAIL_INPUTS: &[&str] = &[
    "input[name='email']",
    "input[type='email']",
    "input[autocomplete='username']",
    "input[id*='email' i]",
    "input[placeholder*='email' i]",
];

/// Submit controls for the email step.
pub const EMAIL_SUBMITS: &[&str] = &[
    "button[type='submit']",
    "form button:not([type='button'])",
    "input[type='submit']",
];

/// One-time-code input field.
pub const CODE_INPUTS: &[&str] = &[
    "input[name='validateCode']",
    "input[autocomplete='one-time-code']",
    "input[inputmode='numeric']",
    "input[name*='code' i]",
    "input[id*='code' i]",
    "input[placeholder*='code' i]",
];

/// Submit controls for the code step.
pub const CODE_SUBMITS: &[&str] = &[
    "button[type='submit']",
    "form button:not([type='button'])",
    "input[type='submit']",
];

/// Indicators that the session is authenticated.
pub const SUCCESS_MARKERS: &[&str] = &[
    "a[href*='logout']",
    "a[href*='signout']",
    "[aria-label*='profile' i]",
    "[class*='avatar' i]",
    "nav[role='navigation']",
];

/// Path substrings that mark a login/signin page.
pub const SIGNIN_PATH_MARKERS: &[&str] = &["login", "signin", "sign-in"];
