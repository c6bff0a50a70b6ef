//! Named constants: `"what is pi"`, `"speed of light"`, and the like.

struct Constant {
    names: &'static [&'static str],
    render: fn() -> String,
}

const CONSTANTS: &[Constant] = &[
    Constant { names: &["pi"], render: || "pi is approximately **3.14159**".to_string() },
    Constant { names: &["e", "euler's number"], render: || "e is approximately **2.71828**".to_string() },
    Constant {
        names: &["speed of light", "c"],
        render: || "the speed of light in a vacuum is **299,792,458 m/s**".to_string(),
    },
    Constant {
        names: &["golden ratio", "phi"],
        render: || "the golden ratio is approximately **1.61803**".to_string(),
    },
    Constant {
        names: &["avogadro's number", "avogadro number"],
        render: || "Avogadro's number is approximately **6.02214076×10^23 mol⁻¹**".to_string(),
    },
];

/// Matches a bare request for a named constant. Deliberately narrow — this
/// only fires on "what is X" / "value of X" shaped questions, not on every
/// message that happens to contain the letter "e".
pub fn match_constant(message: &str) -> Option<String> {
    let normalized = message.trim().trim_end_matches('?').to_ascii_lowercase();
    let stripped = normalized
        .strip_prefix("what is ")
        .or_else(|| normalized.strip_prefix("what's "))
        .or_else(|| normalized.strip_prefix("value of "))
        .unwrap_or(&normalized)
        .trim();

    for constant in CONSTANTS {
        if constant.names.iter().any(|name| *name == stripped) {
            return Some((constant.render)());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_pi() {
        assert_eq!(match_constant("what is pi?").as_deref(), Some("pi is approximately **3.14159**"));
    }

    #[test]
    fn matches_speed_of_light_without_prefix() {
        assert!(match_constant("speed of light").is_some());
    }

    #[test]
    fn does_not_match_unrelated_text() {
        assert!(match_constant("what is the weather like").is_none());
    }
}
