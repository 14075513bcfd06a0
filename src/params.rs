//! Extraction of a percentage and/or a dollar amount from a command.

use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};
use serde::Serialize;

fn case_insensitive(pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .expect("parameter pattern compiles")
}

static PERCENT_SIGN: LazyLock<Regex> = LazyLock::new(|| case_insensitive(r"(\d+(?:\.\d+)?)\s*%"));
static PERCENT_WORD: LazyLock<Regex> =
    LazyLock::new(|| case_insensitive(r"(\d+(?:\.\d+)?)\s*percent"));
static BY_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| case_insensitive(r"\bby\s+(\$?)(\d+(?:,\d{3})*(?:\.\d+)?)(\s*dollars?\b)?"));
static DOLLAR_SIGN: LazyLock<Regex> =
    LazyLock::new(|| case_insensitive(r"\$(\d+(?:,\d{3})*(?:\.\d{2})?)"));
static DOLLAR_WORD: LazyLock<Regex> =
    LazyLock::new(|| case_insensitive(r"(\d+(?:,\d{3})*(?:\.\d{2})?)\s*dollars?"));

/// The numeric adjustment a command asks for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Adjustment {
    pub percentage: Option<f64>,
    pub amount: Option<f64>,
}

impl Adjustment {
    pub fn is_empty(&self) -> bool {
        self.percentage.is_none() && self.amount.is_none()
    }
}

pub fn extract(command: &str) -> Adjustment {
    Adjustment {
        percentage: extract_percentage(command),
        amount: extract_amount(command),
    }
}

/// `<n>%`, then `<n> percent`, then `by <n>`. A `by` clause naming a
/// dollar value (`by $500`, `by 500 dollars`) is not a percentage.
pub fn extract_percentage(command: &str) -> Option<f64> {
    for pattern in [&*PERCENT_SIGN, &*PERCENT_WORD] {
        if let Some(value) = first_number(pattern, command, 1) {
            return Some(value);
        }
    }
    BY_NUMBER.captures_iter(command).find_map(|caps| {
        let dollar_prefix = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
        if dollar_prefix || caps.get(3).is_some() {
            return None;
        }
        caps.get(2)?.as_str().replace(',', "").parse().ok()
    })
}

/// `$<n>` with optional thousands separators and cents, then `<n> dollars`.
pub fn extract_amount(command: &str) -> Option<f64> {
    [&*DOLLAR_SIGN, &*DOLLAR_WORD]
        .into_iter()
        .find_map(|pattern| first_number(pattern, command, 1))
}

fn first_number(pattern: &Regex, text: &str, group: usize) -> Option<f64> {
    let caps = pattern.captures(text)?;
    caps.get(group)?.as_str().replace(',', "").parse().ok()
}
