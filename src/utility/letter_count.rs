//! Letter counts: `"how many r's are in strawberry"`, `"count the letter e in excellence"`.

use std::sync::OnceLock;

static PATTERN: OnceLock<regex::Regex> = OnceLock::new();

fn pattern() -> &'static regex::Regex {
    PATTERN.get_or_init(|| {
        regex::Regex::new(
            r"(?i)how many\s+([a-z])(?:'s)?s?\s+(?:are\s+)?in\s+(\w+)|count the letter\s+([a-z])\s+in\s+(\w+)",
        )
        .expect("static pattern is valid")
    })
}

/// Matches a letter-count request and returns the rendered inline answer,
/// e.g. `"'r' appears 3 times in \"strawberry\""`.
pub fn match_letter_count(message: &str) -> Option<String> {
    let caps = pattern().captures(message)?;
    let (letter, word) = if let Some(l) = caps.get(1) {
        (l.as_str(), caps.get(2)?.as_str())
    } else {
        (caps.get(3)?.as_str(), caps.get(4)?.as_str())
    };
    let letter = letter.to_ascii_lowercase();
    let count = word.to_ascii_lowercase().chars().filter(|c| c.to_string() == letter).count();
    Some(format!("'{letter}' appears {count} times in \"{word}\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_r_in_strawberry() {
        assert_eq!(
            match_letter_count("how many r's are in strawberry").as_deref(),
            Some("'r' appears 3 times in \"strawberry\"")
        );
    }

    #[test]
    fn counts_via_count_the_letter_phrasing() {
        assert_eq!(
            match_letter_count("count the letter e in excellence").as_deref(),
            Some("'e' appears 3 times in \"excellence\"")
        );
    }

    #[test]
    fn non_matching_text_returns_none() {
        assert!(match_letter_count("what time is it").is_none());
    }
}
