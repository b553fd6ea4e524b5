//! Relative deadline tokens.
//!
//! A task's `deadline` is free text. When it looks like `48h` it is a relative
//! token: "48 hours from when it was set". The absolute instant is kept in
//! `deadline_timestamp` (epoch milliseconds) so the countdown does not reset on
//! unrelated edits.

use once_cell::sync::Lazy;
use regex::Regex;

pub const HOUR_MS: i64 = 60 * 60 * 1000;
pub const DAY_MS: i64 = 24 * HOUR_MS;

static RELATIVE_HOURS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(\d{1,6})\s*h\s*$").expect("valid relative hours regex"));

/// Parses `"48h"` / `" 12 H "` into a number of hours.
pub fn parse_relative_hours(deadline: &str) -> Option<i64> {
    RELATIVE_HOURS
        .captures(deadline)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<i64>().ok())
}

/// Resolves a relative token against `from_ms`. Non-token text yields `None`.
pub fn resolve_deadline(deadline: &str, from_ms: i64) -> Option<i64> {
    parse_relative_hours(deadline).map(|hours| from_ms + hours * HOUR_MS)
}

fn normalized(deadline: Option<&str>) -> Option<&str> {
    deadline.map(str::trim).filter(|d| !d.is_empty())
}

/// Decides the `deadline_timestamp` stored by a full-field update.
///
/// Precedence:
/// 1. deadline text unchanged and a timestamp exists: keep it verbatim;
/// 2. deadline text changed: recompute from the new text;
/// 3. unchanged text but no timestamp yet: compute from the text.
///
/// Text that is not a relative token resolves to no timestamp.
pub fn next_deadline_timestamp(
    previous_deadline: Option<&str>,
    previous_timestamp: Option<i64>,
    new_deadline: Option<&str>,
    now_ms: i64,
) -> Option<i64> {
    let previous_deadline = normalized(previous_deadline);
    let new_deadline = normalized(new_deadline);

    if previous_deadline == new_deadline && previous_timestamp.is_some() {
        return previous_timestamp;
    }

    new_deadline.and_then(|deadline| resolve_deadline(deadline, now_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_760_000_000_000;

    #[test]
    fn parses_relative_hour_tokens() {
        assert_eq!(parse_relative_hours("48h"), Some(48));
        assert_eq!(parse_relative_hours(" 12 H "), Some(12));
        assert_eq!(parse_relative_hours("48"), None);
        assert_eq!(parse_relative_hours("next friday"), None);
        assert_eq!(resolve_deadline("2h", NOW), Some(NOW + 2 * HOUR_MS));
    }

    #[test]
    fn unchanged_deadline_preserves_timestamp() {
        let set_earlier = NOW - 10 * HOUR_MS + 48 * HOUR_MS;
        assert_eq!(
            next_deadline_timestamp(Some("48h"), Some(set_earlier), Some("48h"), NOW),
            Some(set_earlier)
        );
        // whitespace-only differences are not a change
        assert_eq!(
            next_deadline_timestamp(Some("48h"), Some(set_earlier), Some(" 48h "), NOW),
            Some(set_earlier)
        );
    }

    #[test]
    fn changed_deadline_recomputes() {
        assert_eq!(
            next_deadline_timestamp(Some("48h"), Some(1), Some("24h"), NOW),
            Some(NOW + 24 * HOUR_MS)
        );
        assert_eq!(
            next_deadline_timestamp(Some("48h"), Some(1), Some("end of month"), NOW),
            None
        );
        assert_eq!(next_deadline_timestamp(Some("48h"), Some(1), None, NOW), None);
    }

    #[test]
    fn missing_timestamp_is_computed() {
        assert_eq!(
            next_deadline_timestamp(Some("72h"), None, Some("72h"), NOW),
            Some(NOW + 72 * HOUR_MS)
        );
        assert_eq!(
            next_deadline_timestamp(None, None, Some("6h"), NOW),
            Some(NOW + 6 * HOUR_MS)
        );
    }
}
