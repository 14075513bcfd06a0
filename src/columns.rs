//! Column resolution: exact, then case-insensitive, then fuzzy.
//!
//! The fuzzy score is a 0-100 weighted ratio. Both strings are lower-cased
//! with punctuation collapsed to spaces, then compared with normalized
//! Levenshtein similarity. When one string is much longer than the other
//! the best aligned substring counts too, so an abbreviation such as `rev`
//! still scores high against `Revenue`.

use itertools::Itertools;
use log::debug;
use serde::Serialize;

use crate::{
    dataset::Dataset,
    error::{Result, SheetError},
};

pub const DEFAULT_FUZZY_THRESHOLD: f64 = 70.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    CaseInsensitive,
    Fuzzy { score: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnMatch {
    pub column: String,
    #[serde(rename = "match")]
    pub kind: MatchKind,
}

pub fn resolve_column(dataset: &Dataset, query: &str, threshold: f64) -> Result<ColumnMatch> {
    let headers = dataset.header_names();
    resolve_in(&headers, query, threshold)
}

/// Resolves `query` against an ordered list of column names.
pub fn resolve_in(columns: &[String], query: &str, threshold: f64) -> Result<ColumnMatch> {
    if let Some(column) = columns.iter().find(|c| c.as_str() == query) {
        return Ok(ColumnMatch {
            column: column.clone(),
            kind: MatchKind::Exact,
        });
    }

    let lowered = query.to_lowercase();
    if let Some(column) = columns.iter().find(|c| c.to_lowercase() == lowered) {
        return Ok(ColumnMatch {
            column: column.clone(),
            kind: MatchKind::CaseInsensitive,
        });
    }

    // Strictly-greater comparison keeps the earliest column on ties.
    let mut best: Option<(&String, f64)> = None;
    for column in columns {
        let score = similarity(query, column);
        if best.is_none_or(|(_, current)| score > current) {
            best = Some((column, score));
        }
    }

    match best {
        Some((column, score)) if score >= threshold => {
            debug!("Column '{query}' matched '{column}' with similarity {score:.0}");
            Ok(ColumnMatch {
                column: column.clone(),
                kind: MatchKind::Fuzzy { score },
            })
        }
        _ => Err(SheetError::column_not_found(
            query,
            columns.iter().map(String::as_str),
        )),
    }
}

/// Weighted similarity between two strings on a 0-100 scale.
pub fn similarity(left: &str, right: &str) -> f64 {
    let a = full_process(left);
    let b = full_process(right);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let base = ratio(&a, &b);
    let (shorter, longer) = if a.chars().count() <= b.chars().count() {
        (&a, &b)
    } else {
        (&b, &a)
    };
    let length_ratio = longer.chars().count() as f64 / shorter.chars().count() as f64;

    let best = if length_ratio >= 1.5 {
        let scale = if length_ratio < 8.0 { 0.9 } else { 0.6 };
        let partial = partial_ratio(shorter, longer) * scale;
        let partial_sorted =
            partial_ratio(&sorted_tokens(shorter), &sorted_tokens(longer)) * 0.95 * scale;
        base.max(partial).max(partial_sorted)
    } else {
        let sorted = ratio(&sorted_tokens(&a), &sorted_tokens(&b)) * 0.95;
        base.max(sorted)
    };
    best.round()
}

fn full_process(value: &str) -> String {
    value
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .join(" ")
}

fn sorted_tokens(value: &str) -> String {
    value.split_whitespace().sorted().join(" ")
}

fn ratio(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b) * 100.0
}

/// Best ratio of `shorter` against every same-length window of `longer`.
fn partial_ratio(shorter: &str, longer: &str) -> f64 {
    let short_chars: Vec<char> = shorter.chars().collect();
    let long_chars: Vec<char> = longer.chars().collect();
    if short_chars.len() >= long_chars.len() {
        return ratio(shorter, longer);
    }
    long_chars
        .windows(short_chars.len())
        .map(|window| {
            let window: String = window.iter().collect();
            ratio(shorter, &window)
        })
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn abbreviation_resolves_fuzzily() {
        let columns = names(&["Revenue", "Expenses", "Profit"]);
        let matched = resolve_in(&columns, "rev", DEFAULT_FUZZY_THRESHOLD).unwrap();
        assert_eq!(matched.column, "Revenue");
        assert!(matches!(matched.kind, MatchKind::Fuzzy { score } if score >= 70.0));
    }

    #[test]
    fn exact_match_beats_equal_fuzzy_candidates() {
        let columns = names(&["salary", "Salary"]);
        let matched = resolve_in(&columns, "Salary", DEFAULT_FUZZY_THRESHOLD).unwrap();
        assert_eq!(matched.column, "Salary");
        assert_eq!(matched.kind, MatchKind::Exact);
    }

    #[test]
    fn case_insensitive_precedes_fuzzy() {
        let columns = names(&["Base_Salary_Total", "BASE_SALARY"]);
        let matched = resolve_in(&columns, "base_salary", DEFAULT_FUZZY_THRESHOLD).unwrap();
        assert_eq!(matched.column, "BASE_SALARY");
        assert_eq!(matched.kind, MatchKind::CaseInsensitive);
    }

    #[test]
    fn below_threshold_reports_available_columns() {
        let columns = names(&["Revenue", "Expenses", "Profit"]);
        let err = resolve_in(&columns, "zzz", DEFAULT_FUZZY_THRESHOLD).unwrap_err();
        match err {
            SheetError::ColumnNotFound { query, available } => {
                assert_eq!(query, "zzz");
                assert_eq!(available, columns);
            }
            other => panic!("expected ColumnNotFound, got {other:?}"),
        }
    }

    #[test]
    fn not_found_lists_at_most_ten_columns() {
        let columns: Vec<String> = (0..15).map(|i| format!("metric_{i}")).collect();
        let err = resolve_in(&columns, "qqqqqqqqqqqqqqqqqq", DEFAULT_FUZZY_THRESHOLD).unwrap_err();
        match err {
            SheetError::ColumnNotFound { available, .. } => assert_eq!(available.len(), 10),
            other => panic!("expected ColumnNotFound, got {other:?}"),
        }
    }

    #[test]
    fn ties_resolve_to_first_column() {
        let columns = names(&["Q1 Sales", "Q2 Sales"]);
        let matched = resolve_in(&columns, "sales", DEFAULT_FUZZY_THRESHOLD).unwrap();
        assert_eq!(matched.column, "Q1 Sales");
    }

    #[test]
    fn similarity_ignores_punctuation_and_token_order() {
        assert_eq!(similarity("base salary", "Base_Salary"), 100.0);
        assert!(similarity("salary base", "base salary") >= 90.0);
        assert_eq!(similarity("", "anything"), 0.0);
    }
}
