//! The Deterministic Utility Engine: a pure, ordered matcher that answers
//! a narrow corpus of questions without ever calling the LLM or a tool —
//! or, for a handful of categories, resolves to exactly one upstream tool
//! call instead of inline text.
//!
//! Match order is load-bearing and documented here rather than re-derived
//! from file layout: unit conversion, unit-conversion follow-up, arithmetic,
//! named constants, letter counts, timezone lookup, holiday check, feed
//! fetch, status probe. A new category is appended after the existing ones,
//! never inserted earlier in the list.

pub mod arithmetic;
pub mod constants;
pub mod letter_count;
pub mod lookup;
pub mod units;

pub use units::{LastInlineAnswer, Unit};

/// What the engine matched: either text the caller can return as-is, or a
/// single tool call the caller must dispatch through the Audited Tool
/// Client and then format.
#[derive(Debug, Clone, PartialEq)]
pub enum DeterministicMatch {
    Inline { category: &'static str, answer_text: String },
    Tool { category: &'static str, tool_name: String, tool_args_json: String },
}

/// Runs every category in order and returns the first match. `last_answer`
/// is the caller's record of the previous turn's inline conversion result,
/// consulted only by the follow-up category — never by calling a tool.
pub fn match_message(message: &str, last_answer: Option<LastInlineAnswer>) -> Option<DeterministicMatch> {
    if let Some((value, from, to)) = units::match_conversion(message) {
        let converted = units::convert(value, from, to)?;
        return Some(DeterministicMatch::Inline {
            category: "unit_conversion",
            answer_text: units::format_converted(converted, to),
        });
    }

    if let Some(last) = last_answer {
        if let Some(target) = units::match_followup(message) {
            if let Some(converted) = units::convert(last.value, last.unit, target) {
                return Some(DeterministicMatch::Inline {
                    category: "unit_conversion_followup",
                    answer_text: units::format_converted(converted, target),
                });
            }
        }
    }

    if let Some(answer_text) = arithmetic::match_arithmetic(message) {
        return Some(DeterministicMatch::Inline { category: "arithmetic", answer_text });
    }

    if let Some(answer_text) = constants::match_constant(message) {
        return Some(DeterministicMatch::Inline { category: "named_constant", answer_text });
    }

    if let Some(answer_text) = letter_count::match_letter_count(message) {
        return Some(DeterministicMatch::Inline { category: "letter_count", answer_text });
    }

    if let Some((tool_name, tool_args_json)) = lookup::match_timezone(message) {
        return Some(DeterministicMatch::Tool { category: "timezone", tool_name, tool_args_json });
    }

    if let Some((tool_name, tool_args_json)) = lookup::match_holiday(message) {
        return Some(DeterministicMatch::Tool { category: "holiday", tool_name, tool_args_json });
    }

    if let Some((tool_name, tool_args_json)) = lookup::match_feed(message) {
        return Some(DeterministicMatch::Tool { category: "feed", tool_name, tool_args_json });
    }

    if let Some((tool_name, tool_args_json)) = lookup::match_status(message) {
        return Some(DeterministicMatch::Tool { category: "status_probe", tool_name, tool_args_json });
    }

    None
}

/// The last inline answer's value/unit, extracted from a match for the
/// caller to remember for the next turn's follow-up resolution. Only unit
/// conversions produce one.
pub fn last_inline_answer_from(message: &str) -> Option<LastInlineAnswer> {
    let (value, from, to) = units::match_conversion(message)?;
    let converted = units::convert(value, from, to)?;
    Some(LastInlineAnswer { value: converted, unit: to })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_confidence_conversion_wins_over_everything_else() {
        let result = match_message("350F in C", None);
        assert!(matches!(result, Some(DeterministicMatch::Inline { category: "unit_conversion", .. })));
    }

    #[test]
    fn arithmetic_matches_when_no_conversion_present() {
        let result = match_message("what's 6x7?", None);
        match result {
            Some(DeterministicMatch::Inline { category, answer_text }) => {
                assert_eq!(category, "arithmetic");
                assert_eq!(answer_text, "6 * 7 = **42**");
            }
            other => panic!("expected arithmetic match, got {other:?}"),
        }
    }

    #[test]
    fn followup_resolves_against_last_answer_without_a_tool_call() {
        let first = match_message("5 mi to km", None).unwrap();
        let last_answer = last_inline_answer_from("5 mi to km").unwrap();
        assert!(matches!(first, DeterministicMatch::Inline { .. }));

        let followup = match_message("what is that in feet?", Some(last_answer)).unwrap();
        match followup {
            DeterministicMatch::Inline { category, answer_text } => {
                assert_eq!(category, "unit_conversion_followup");
                assert!(answer_text.ends_with("ft"));
            }
            other => panic!("expected inline follow-up, got {other:?}"),
        }
    }

    #[test]
    fn tool_categories_return_a_tool_match() {
        let result = match_message("is today a holiday?", None);
        assert!(matches!(result, Some(DeterministicMatch::Tool { category: "holiday", .. })));
    }

    #[test]
    fn unrelated_text_has_no_match() {
        assert!(match_message("tell me about your day", None).is_none());
    }
}
