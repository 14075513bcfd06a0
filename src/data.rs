use std::fmt;

use serde::{Serialize, Serializer};

/// A single spreadsheet cell after type inference.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Number(f64),
    Text(String),
}

impl Cell {
    /// Parses a raw field. Blank fields are empty, anything `f64` accepts
    /// (after trimming) is a number, everything else stays text verbatim.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Cell::Empty;
        }
        match parse_number(trimmed) {
            Some(value) => Cell::Number(value),
            None => Cell::Text(raw.to_string()),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(value) => Some(*value),
            _ => None,
        }
    }

    /// Numeric view used when coercing arbitrary columns, mirroring how a
    /// text cell that looks like a number is still summed.
    pub fn coerce_number(&self) -> Option<f64> {
        match self {
            Cell::Number(value) => Some(*value),
            Cell::Text(text) => parse_number(text.trim()),
            Cell::Empty => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    pub fn as_display(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Number(value) => format_number(*value),
            Cell::Text(text) => text.clone(),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Cell::Empty => serializer.serialize_none(),
            Cell::Number(value) => serializer.serialize_f64(*value),
            Cell::Text(text) => serializer.serialize_str(text),
        }
    }
}

fn parse_number(value: &str) -> Option<f64> {
    let parsed = value.parse::<f64>().ok()?;
    // "NaN" and "inf" parse as f64 but are labels in a spreadsheet.
    parsed.is_finite().then_some(parsed)
}

/// Renders whole numbers without a fractional part and trims float noise
/// such as `11500.000000000002` down to ten decimals.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        return format!("{value:.0}");
    }
    let rounded = format!("{value:.10}");
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() || trimmed == "-" || trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Formats a value as `$1,234.56`.
pub fn format_currency(value: f64) -> String {
    format!("${}", format_grouped(value))
}

/// Formats a value with thousands separators and two decimals.
pub fn format_grouped(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (idx, ch) in whole.chars().enumerate() {
        if idx > 0 && (whole.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{sign}{grouped}.{cents}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_distinguishes_numbers_text_and_blanks() {
        assert_eq!(Cell::parse("  "), Cell::Empty);
        assert_eq!(Cell::parse("42"), Cell::Number(42.0));
        assert_eq!(Cell::parse(" 3.5 "), Cell::Number(3.5));
        assert_eq!(Cell::parse("Alice"), Cell::Text("Alice".to_string()));
        assert_eq!(Cell::parse("NaN"), Cell::Text("NaN".to_string()));
    }

    #[test]
    fn coerce_number_reads_numeric_text() {
        assert_eq!(Cell::Text(" 12 ".to_string()).coerce_number(), Some(12.0));
        assert_eq!(Cell::Text("n/a".to_string()).coerce_number(), None);
        assert_eq!(Cell::Empty.coerce_number(), None);
    }

    #[test]
    fn format_number_drops_float_noise() {
        assert_eq!(format_number(11500.000000000002), "11500");
        assert_eq!(format_number(1.1), "1.1");
        assert_eq!(format_number(-0.25), "-0.25");
        assert_eq!(format_number(7.0), "7");
    }

    #[test]
    fn format_currency_groups_thousands() {
        assert_eq!(format_currency(1234567.891), "$1,234,567.89");
        assert_eq!(format_currency(12.5), "$12.50");
        assert_eq!(format_currency(-1000.0), "$-1,000.00");
        assert_eq!(format_grouped(999.999), "1,000.00");
    }
}
