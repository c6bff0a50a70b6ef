//! Temperature and distance conversion, and the follow-up unit the
//! deterministic engine remembers across a single inline answer.

use once_cell_like::OnceRegex;

/// A unit the engine can convert between. Grouped so a follow-up ("what is
/// that in feet?") only resolves within the same family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Celsius,
    Fahrenheit,
    Kelvin,
    Kilometers,
    Miles,
    Feet,
}

impl Unit {
    fn family(self) -> Family {
        match self {
            Unit::Celsius | Unit::Fahrenheit | Unit::Kelvin => Family::Temperature,
            Unit::Kilometers | Unit::Miles | Unit::Feet => Family::Distance,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Unit::Celsius => "C",
            Unit::Fahrenheit => "F",
            Unit::Kelvin => "K",
            Unit::Kilometers => "km",
            Unit::Miles => "mi",
            Unit::Feet => "ft",
        }
    }

    fn parse(token: &str) -> Option<Unit> {
        match token.to_ascii_lowercase().as_str() {
            "c" | "celsius" | "centigrade" => Some(Unit::Celsius),
            "f" | "fahrenheit" => Some(Unit::Fahrenheit),
            "k" | "kelvin" => Some(Unit::Kelvin),
            "km" | "kilometers" | "kilometres" | "kilometer" | "kilometre" => Some(Unit::Kilometers),
            "mi" | "mile" | "miles" => Some(Unit::Miles),
            "ft" | "foot" | "feet" => Some(Unit::Feet),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Temperature,
    Distance,
}

/// The value and unit behind the engine's most recent inline answer, kept
/// by the caller (the Orchestrator, per spec.md §9's single-writer rule)
/// and passed back in on the next turn for follow-up resolution.
#[derive(Debug, Clone, Copy)]
pub struct LastInlineAnswer {
    pub value: f64,
    pub unit: Unit,
}

/// Converts `value` from `from` to `to`. Returns `None` for cross-family
/// conversions (e.g. Celsius → miles).
pub fn convert(value: f64, from: Unit, to: Unit) -> Option<f64> {
    if from.family() != to.family() {
        return None;
    }
    if from == to {
        return Some(value);
    }
    let result = match from.family() {
        Family::Temperature => {
            let celsius = match from {
                Unit::Celsius => value,
                Unit::Fahrenheit => (value - 32.0) * 5.0 / 9.0,
                Unit::Kelvin => value - 273.15,
                _ => unreachable!(),
            };
            match to {
                Unit::Celsius => celsius,
                Unit::Fahrenheit => celsius * 9.0 / 5.0 + 32.0,
                Unit::Kelvin => celsius + 273.15,
                _ => unreachable!(),
            }
        }
        Family::Distance => {
            let km = match from {
                Unit::Kilometers => value,
                Unit::Miles => value * 1.609344,
                Unit::Feet => value / 3280.8399,
                _ => unreachable!(),
            };
            match to {
                Unit::Kilometers => km,
                Unit::Miles => km / 1.609344,
                Unit::Feet => km * 3280.8399,
                _ => unreachable!(),
            }
        }
    };
    Some(result)
}

/// Formats a converted value per spec.md §4.2's precision rules:
/// temperature conversions get one decimal place, mile↔km gets two, and a
/// Kelvin result always carries a decimal even when it is a whole number.
pub fn format_converted(value: f64, unit: Unit) -> String {
    let decimals = match unit {
        Unit::Kelvin => 1,
        Unit::Celsius | Unit::Fahrenheit => 1,
        Unit::Kilometers | Unit::Miles => 2,
        Unit::Feet => 1,
    };
    format!("{:.*}{}", decimals, value, unit.symbol())
}

static CONVERSION_PATTERN: OnceRegex = OnceRegex::new(r"(?i)^\s*(-?\d+(?:\.\d+)?)\s*°?\s*([a-zA-Z]+)\s+(?:in|to)\s+°?\s*([a-zA-Z]+)\s*\??\s*$");

/// Matches `"350F in C"`, `"100 celsius to fahrenheit"`, `"5 mi to km"`.
pub fn match_conversion(message: &str) -> Option<(f64, Unit, Unit)> {
    let caps = CONVERSION_PATTERN.get().captures(message)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    let from = Unit::parse(caps.get(2)?.as_str())?;
    let to = Unit::parse(caps.get(3)?.as_str())?;
    if from.family() != to.family() {
        return None;
    }
    Some((value, from, to))
}

static FOLLOWUP_PATTERN: OnceRegex = OnceRegex::new(r"(?i)^\s*(?:what(?:'s| is)?|how (?:much|many)|convert)?\s*(?:is\s+)?(?:that|this)\s+in\s+°?\s*([a-zA-Z]+)\s*\??\s*$");

/// Matches `"what is that in feet?"` — resolved against the last inline
/// answer, never by calling a tool.
pub fn match_followup(message: &str) -> Option<Unit> {
    let caps = FOLLOWUP_PATTERN.get().captures(message)?;
    Unit::parse(caps.get(1)?.as_str())
}

mod once_cell_like {
    use std::sync::OnceLock;

    /// A tiny lazily-compiled regex holder, avoiding a dependency on
    /// `once_cell`/`lazy_static` for a handful of module-level patterns.
    pub struct OnceRegex {
        pattern: &'static str,
        cell: OnceLock<regex::Regex>,
    }

    impl OnceRegex {
        pub const fn new(pattern: &'static str) -> Self {
            Self { pattern, cell: OnceLock::new() }
        }

        pub fn get(&self) -> &regex::Regex {
            self.cell.get_or_init(|| regex::Regex::new(self.pattern).expect("static pattern is valid"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fahrenheit_to_celsius_one_decimal() {
        let c = convert(350.0, Unit::Fahrenheit, Unit::Celsius).unwrap();
        assert_eq!(format_converted(c, Unit::Celsius), "176.7C");
    }

    #[test]
    fn miles_to_km_two_decimals() {
        let km = convert(5.0, Unit::Miles, Unit::Kilometers).unwrap();
        assert_eq!(format_converted(km, Unit::Kilometers), "8.05km");
    }

    #[test]
    fn kelvin_always_carries_a_decimal() {
        let k = convert(26.85, Unit::Celsius, Unit::Kelvin).unwrap();
        assert_eq!(format_converted(k, Unit::Kelvin), "300.0K");
    }

    #[test]
    fn cross_family_conversion_is_rejected() {
        assert!(convert(10.0, Unit::Celsius, Unit::Miles).is_none());
    }

    #[test]
    fn matches_350f_in_c() {
        let (value, from, to) = match_conversion("350F in C").unwrap();
        assert_eq!(value, 350.0);
        assert_eq!(from, Unit::Fahrenheit);
        assert_eq!(to, Unit::Celsius);
    }

    #[test]
    fn matches_followup_in_feet() {
        assert_eq!(match_followup("what is that in feet?"), Some(Unit::Feet));
    }

    #[test]
    fn non_conversion_text_does_not_match() {
        assert!(match_conversion("how's the weather today").is_none());
    }
}
