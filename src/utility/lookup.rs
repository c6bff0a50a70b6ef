//! Deterministic categories that resolve to a single upstream tool call
//! rather than inline text: timezone lookups, holiday checks, feed fetches,
//! and URL status probes. Each strips a temporal tail off a place name
//! (`"Rexburg today"` → `"Rexburg"`) before building tool arguments; if only
//! the temporal marker remains, the category does not match.

use std::sync::OnceLock;

const TEMPORAL_TAILS: &[&str] = &["today", "right now", "currently", "this morning", "this week", "now"];

/// Strips a trailing temporal marker off `input`. Returns `None` if nothing
/// but the marker (and whitespace) would remain.
fn strip_temporal_tail(input: &str) -> Option<String> {
    let trimmed = input.trim();
    for tail in TEMPORAL_TAILS {
        if let Some(stripped) = trimmed.to_ascii_lowercase().strip_suffix(tail) {
            let remaining = trimmed[..stripped.len()].trim();
            if remaining.is_empty() {
                return None;
            }
            return Some(remaining.to_string());
        }
    }
    Some(trimmed.to_string())
}

static TIMEZONE_PATTERN: OnceLock<regex::Regex> = OnceLock::new();

fn timezone_pattern() -> &'static regex::Regex {
    TIMEZONE_PATTERN.get_or_init(|| {
        regex::Regex::new(r"(?i)^\s*what(?:'s| is) the time in\s+(.+?)\s*\??\s*$").expect("static pattern is valid")
    })
}

/// `"what's the time in Rexburg"` / `"what is the time in Rexburg today"` →
/// a `resolve_timezone` tool call keyed on the place name with any temporal
/// tail stripped off first.
pub fn match_timezone(message: &str) -> Option<(String, String)> {
    let caps = timezone_pattern().captures(message)?;
    let place = strip_temporal_tail(caps.get(1)?.as_str())?;
    let args = serde_json::json!({ "place": place }).to_string();
    Some(("resolve_timezone".to_string(), args))
}

static HOLIDAY_PATTERN: OnceLock<regex::Regex> = OnceLock::new();

fn holiday_pattern() -> &'static regex::Regex {
    HOLIDAY_PATTERN.get_or_init(|| regex::Regex::new(r"(?i)^\s*is (?:today|it) a holiday\s*\??\s*$").expect("static pattern is valid"))
}

/// `"is today a holiday?"` → `holidays_is_today` with no arguments.
pub fn match_holiday(message: &str) -> Option<(String, String)> {
    holiday_pattern().is_match(message).then(|| ("holidays_is_today".to_string(), "{}".to_string()))
}

static FEED_PATTERN: OnceLock<regex::Regex> = OnceLock::new();

fn feed_pattern() -> &'static regex::Regex {
    FEED_PATTERN.get_or_init(|| regex::Regex::new(r"(?i)^\s*what'?s new on (.+?)\s*\??\s*$").expect("static pattern is valid"))
}

/// `"what's new on my rss feed"` → `feed_fetch` keyed on the feed name.
pub fn match_feed(message: &str) -> Option<(String, String)> {
    let caps = feed_pattern().captures(message)?;
    let feed = caps.get(1)?.as_str().trim();
    let args = serde_json::json!({ "feed": feed }).to_string();
    Some(("feed_fetch".to_string(), args))
}

static STATUS_PATTERN: OnceLock<regex::Regex> = OnceLock::new();

fn status_pattern() -> &'static regex::Regex {
    STATUS_PATTERN
        .get_or_init(|| regex::Regex::new(r"(?i)^\s*is\s+(\S+\.\S+)\s+(?:up|down)\s*\??\s*$").expect("static pattern is valid"))
}

/// `"is example.com down?"` → `status_check_url` keyed on the URL/host.
pub fn match_status(message: &str) -> Option<(String, String)> {
    let caps = status_pattern().captures(message)?;
    let url = caps.get(1)?.as_str();
    let args = serde_json::json!({ "url": url }).to_string();
    Some(("status_check_url".to_string(), args))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_temporal_tail() {
        assert_eq!(strip_temporal_tail("Rexburg today").as_deref(), Some("Rexburg"));
    }

    #[test]
    fn bare_temporal_marker_has_no_match() {
        assert!(strip_temporal_tail("today").is_none());
    }

    #[test]
    fn matches_timezone_with_temporal_tail() {
        let (tool, args) = match_timezone("what's the time in Rexburg today").unwrap();
        assert_eq!(tool, "resolve_timezone");
        assert!(args.contains("Rexburg"));
    }

    #[test]
    fn matches_holiday_check() {
        let (tool, _) = match_holiday("is today a holiday?").unwrap();
        assert_eq!(tool, "holidays_is_today");
    }

    #[test]
    fn matches_feed_fetch() {
        let (tool, args) = match_feed("what's new on hacker news").unwrap();
        assert_eq!(tool, "feed_fetch");
        assert!(args.contains("hacker news"));
    }

    #[test]
    fn matches_status_probe() {
        let (tool, args) = match_status("is example.com down?").unwrap();
        assert_eq!(tool, "status_check_url");
        assert!(args.contains("example.com"));
    }

    #[test]
    fn non_matching_text_returns_none() {
        assert!(match_timezone("tell me a joke").is_none());
    }
}
