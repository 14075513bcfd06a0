//! Applying a natural-language numeric adjustment to a dataset.
//!
//! Target columns come from an explicit `column <name>` clause, or from the
//! keyword buckets a command mentions, or from money-like column names. An
//! unquoted clause that names no column falls through to the buckets.
//! Totals that were the row-wise sum of salary, bonus, and benefit columns
//! before the update are kept consistent afterwards.

use std::{
    collections::{BTreeMap, HashSet},
    sync::LazyLock,
};

use log::{debug, info};
use regex::{Regex, RegexBuilder};
use serde::Serialize;

use crate::{
    columns,
    data::Cell,
    dataset::{Dataset, name_contains_any},
    error::{Result, SheetError},
    params::Adjustment,
};

/// Keyword buckets: a command word from a bucket targets every numeric
/// column whose name contains a word from the same bucket.
pub const COLUMN_BUCKETS: &[(&str, &[&str])] = &[
    ("salary", &["salary", "pay", "compensation", "wage"]),
    ("bonus", &["bonus", "incentive", "commission"]),
    ("revenue", &["revenue", "sales", "income"]),
    ("total", &["total", "gross", "net"]),
    ("budget", &["budget", "cost", "expense"]),
];

const MONEY_WORDS: &[&str] = &["salary", "pay", "total", "revenue", "sales", "gross"];
const COMPONENT_WORDS: &[&str] = &["salary", "bonus", "benefit"];
const FALLBACK_LIMIT: usize = 3;
const TOTAL_TOLERANCE: f64 = 1e-6;
/// Words that read as "column <word>" in ordinary phrasing ("the salary
/// column by 10%") and never name a column.
const CLAUSE_STOPWORDS: &[&str] = &["by", "for", "to", "in", "of", "with", "and", "from"];

static EXPLICIT_COLUMN: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r#"\bcolumn\s+(?:"([^"]+)"|'([^']+)'|([\w-]+))"#)
        .case_insensitive(true)
        .build()
        .expect("column pattern compiles")
});

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UpdateRecord {
    pub original_total: f64,
    pub new_total: f64,
    pub change: f64,
    /// `None` when the original total was zero.
    pub percentage_change: Option<f64>,
}

impl UpdateRecord {
    pub fn new(original_total: f64, new_total: f64) -> Self {
        let change = new_total - original_total;
        let percentage_change = (original_total != 0.0).then(|| change / original_total * 100.0);
        Self {
            original_total,
            new_total,
            change,
            percentage_change,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Increase,
    Decrease,
}

/// Result of applying a command to an in-memory dataset.
#[derive(Debug, Clone, Serialize)]
pub struct AppliedUpdate {
    pub target_columns: Vec<String>,
    pub adjustment: Adjustment,
    pub direction: Direction,
    pub updates: BTreeMap<String, UpdateRecord>,
    pub recomputed_totals: Vec<String>,
}

/// A `column <name>` clause. Quoted names must resolve; bare words are a hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnClause {
    pub name: String,
    pub quoted: bool,
}

/// Column named by a `column <name>` clause, if any.
pub fn explicit_column(command: &str) -> Option<ColumnClause> {
    EXPLICIT_COLUMN.captures_iter(command).find_map(|caps| {
        if let Some(m) = caps.get(1).or_else(|| caps.get(2)) {
            return Some(ColumnClause {
                name: m.as_str().trim().to_string(),
                quoted: true,
            });
        }
        let word = caps.get(3)?.as_str();
        let lowered = word.to_lowercase();
        if CLAUSE_STOPWORDS.contains(&lowered.as_str()) {
            return None;
        }
        Some(ColumnClause {
            name: word.to_string(),
            quoted: false,
        })
    })
}

pub fn identify_target_columns(
    dataset: &Dataset,
    command: &str,
    threshold: f64,
) -> Result<Vec<String>> {
    if let Some(clause) = explicit_column(command) {
        match columns::resolve_column(dataset, &clause.name, threshold) {
            Ok(matched) => {
                let numeric = dataset
                    .column(&matched.column)
                    .is_some_and(|column| column.is_numeric());
                if !numeric {
                    return Err(SheetError::NoTargetColumns {
                        command: command.to_string(),
                    });
                }
                debug!("Explicit column '{}' resolved to '{}'", clause.name, matched.column);
                return Ok(vec![matched.column]);
            }
            Err(SheetError::ColumnNotFound { .. }) if !clause.quoted => {
                debug!("'column {}' names no column; using keyword buckets", clause.name);
            }
            Err(err) => return Err(err),
        }
    }

    let lowered = command.to_lowercase();
    let numeric = dataset.numeric_columns();
    let mut selected: HashSet<&str> = HashSet::new();
    for (bucket, words) in COLUMN_BUCKETS {
        if !words.iter().any(|word| lowered.contains(word)) {
            continue;
        }
        let hits = numeric
            .iter()
            .copied()
            .filter(|name| name_contains_any(name, words))
            .collect::<Vec<_>>();
        debug!("Bucket '{bucket}' mentioned; matching columns {hits:?}");
        selected.extend(hits);
    }

    let targets: Vec<String> = if selected.is_empty() {
        let money = numeric
            .iter()
            .filter(|name| name_contains_any(name, MONEY_WORDS))
            .take(FALLBACK_LIMIT)
            .map(|name| name.to_string())
            .collect::<Vec<_>>();
        if money.is_empty() {
            numeric
                .iter()
                .take(FALLBACK_LIMIT)
                .map(|name| name.to_string())
                .collect()
        } else {
            money
        }
    } else {
        numeric
            .iter()
            .filter(|name| selected.contains(*name))
            .map(|name| name.to_string())
            .collect()
    };

    if targets.is_empty() {
        return Err(SheetError::NoTargetColumns {
            command: command.to_string(),
        });
    }
    Ok(targets)
}

/// Direction of a percentage change: up for "increase" or "raise".
pub fn percentage_direction(command: &str) -> Direction {
    direction_for(command, &["increase", "raise"])
}

/// Direction of an absolute change: up for "increase" or "add".
pub fn amount_direction(command: &str) -> Direction {
    direction_for(command, &["increase", "add"])
}

fn direction_for(command: &str, up_words: &[&str]) -> Direction {
    let lowered = command.to_lowercase();
    if up_words.iter().any(|word| lowered.contains(word)) {
        Direction::Increase
    } else {
        Direction::Decrease
    }
}

/// Applies the command's adjustment to its target columns in place.
/// Nothing is changed when the adjustment carries neither a percentage nor
/// an amount.
pub fn apply_command_update(
    dataset: &mut Dataset,
    command: &str,
    adjustment: &Adjustment,
    threshold: f64,
) -> Result<AppliedUpdate> {
    // Each value becomes `value * factor + delta`.
    let (direction, factor, delta) = match (adjustment.percentage, adjustment.amount) {
        (Some(percentage), _) => {
            let direction = percentage_direction(command);
            let factor = match direction {
                Direction::Increase => 1.0 + percentage / 100.0,
                Direction::Decrease => 1.0 - percentage / 100.0,
            };
            (direction, factor, 0.0)
        }
        (None, Some(amount)) => {
            let direction = amount_direction(command);
            let delta = match direction {
                Direction::Increase => amount,
                Direction::Decrease => -amount,
            };
            (direction, 1.0, delta)
        }
        (None, None) => {
            return Err(SheetError::MissingAdjustment {
                command: command.to_string(),
            });
        }
    };
    let targets = identify_target_columns(dataset, command, threshold)?;
    let dependents = dependent_totals(dataset, &targets);

    let mut updates = BTreeMap::new();
    for column in &targets {
        let original = column_sum(dataset, column);
        dataset.map_numbers(column, |value| value * factor + delta);
        let updated = column_sum(dataset, column);
        info!("Updated '{column}': {original} -> {updated}");
        updates.insert(column.clone(), UpdateRecord::new(original, updated));
    }

    let mut recomputed_totals = Vec::new();
    for (total, components) in dependents {
        let sums = row_sums(dataset, &components);
        dataset.set_column(&total, sums.into_iter().map(Cell::Number).collect());
        debug!("Recomputed '{total}' from {components:?}");
        recomputed_totals.push(total);
    }

    Ok(AppliedUpdate {
        target_columns: targets,
        adjustment: *adjustment,
        direction,
        updates,
        recomputed_totals,
    })
}

fn column_sum(dataset: &Dataset, name: &str) -> f64 {
    dataset.column(name).map(|c| c.sum()).unwrap_or_default()
}

/// Non-target "total" columns that currently equal the row-wise sum of the
/// salary, bonus, and benefit columns, paired with those components. Only
/// totals with at least one targeted component are returned.
pub fn dependent_totals(dataset: &Dataset, targets: &[String]) -> Vec<(String, Vec<String>)> {
    let numeric = dataset.numeric_columns();
    let components: Vec<String> = numeric
        .iter()
        .filter(|name| {
            name_contains_any(name, COMPONENT_WORDS) && !name_contains_any(name, &["total"])
        })
        .map(|name| name.to_string())
        .collect();
    if !components.iter().any(|c| targets.contains(c)) {
        return Vec::new();
    }
    let sums = row_sums(dataset, &components);

    numeric
        .iter()
        .filter(|name| name_contains_any(name, &["total"]) && !targets.iter().any(|t| t == *name))
        .filter(|name| {
            dataset.column(name).is_some_and(|column| {
                column.cells.iter().zip(&sums).all(|(cell, expected)| {
                    let actual = cell.as_number().unwrap_or_default();
                    (actual - expected).abs() <= TOTAL_TOLERANCE * expected.abs().max(1.0)
                })
            })
        })
        .map(|name| (name.to_string(), components.clone()))
        .collect()
}

fn row_sums(dataset: &Dataset, components: &[String]) -> Vec<f64> {
    let mut sums = vec![0.0; dataset.row_count()];
    for name in components {
        if let Some(column) = dataset.column(name) {
            for (sum, cell) in sums.iter_mut().zip(&column.cells) {
                *sum += cell.as_number().unwrap_or_default();
            }
        }
    }
    sums
}
