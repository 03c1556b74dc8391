//! `m:ss` time codec used by the trim fields.
//!
//! Parsing is strict: one or more minute digits, a colon, and one or two
//! second digits in `0..=59`. Anything else is rejected with `None` rather
//! than an error, since an unparsable field is an ordinary user input state.

use once_cell::sync::Lazy;
use regex_lite::Regex;

static TIME_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^(\d+):(\d{1,2})$").ok());

/// Canonical rendering of zero and of any value that cannot be formatted.
pub const ZERO_TIME: &str = "0:00";

/// Parses `m:ss` (surrounding whitespace ignored) into whole seconds.
///
/// Returns `None` for empty input, a missing or extra colon, non-digits,
/// or seconds of 60 and above. Minutes are unbounded.
pub fn parse_time(text: &str) -> Option<u64> {
    let re = TIME_PATTERN.as_ref()?;
    let caps = re.captures(text.trim())?;

    let minutes: u64 = caps.get(1)?.as_str().parse().ok()?;
    let seconds: u64 = caps.get(2)?.as_str().parse().ok()?;

    if seconds >= 60 {
        return None;
    }

    minutes.checked_mul(60)?.checked_add(seconds)
}

/// Formats seconds as `m:ss`.
///
/// NaN, infinities and negative values render as [`ZERO_TIME`]. Fractional
/// seconds are truncated.
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return ZERO_TIME.to_string();
    }

    let whole = seconds.floor() as u64;
    format!("{}:{:02}", whole / 60, whole % 60)
}
