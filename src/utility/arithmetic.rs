//! Simple arithmetic expressions: `"6x7"`, `"what's 6*7?"`, `"12 / 4"`.

use std::sync::OnceLock;

static PATTERN: OnceLock<regex::Regex> = OnceLock::new();

fn pattern() -> &'static regex::Regex {
    PATTERN.get_or_init(|| {
        regex::Regex::new(r"(?i)(-?\d+(?:\.\d+)?)\s*([+\-*x×/])\s*(-?\d+(?:\.\d+)?)").expect("static pattern is valid")
    })
}

/// Matches the first arithmetic expression found in `message` and returns
/// the rendered inline answer, e.g. `"6 * 7 = **42**"`. `x`/`×` are
/// normalized to `*` in the rendered answer.
pub fn match_arithmetic(message: &str) -> Option<String> {
    let caps = pattern().captures(message)?;
    let lhs: f64 = caps.get(1)?.as_str().parse().ok()?;
    let op = caps.get(2)?.as_str();
    let rhs: f64 = caps.get(3)?.as_str().parse().ok()?;

    let (symbol, result) = match op {
        "+" => ("+", lhs + rhs),
        "-" => ("-", lhs - rhs),
        "*" | "x" | "X" | "×" => ("*", lhs * rhs),
        "/" => {
            if rhs == 0.0 {
                return None;
            }
            ("/", lhs / rhs)
        }
        _ => return None,
    };

    Some(format!("{} {symbol} {} = **{}**", format_operand(lhs), format_operand(rhs), format_operand(result)))
}

fn format_operand(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}
