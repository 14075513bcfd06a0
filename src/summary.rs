//! Descriptive statistics, money formatting, and insight strings.

use std::{collections::BTreeMap, path::Path};

use serde::Serialize;

use crate::{
    data::{Cell, format_currency, format_grouped},
    dataset::{Column, Dataset, name_contains_any},
};

/// Column-name words that mark a column as holding money.
pub const MONEY_WORDS: &[&str] = &[
    "salary",
    "pay",
    "compensation",
    "sales",
    "revenue",
    "commission",
    "bonus",
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub total: f64,
    pub average: f64,
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    /// Sample standard deviation; absent below two values.
    pub std_dev: Option<f64>,
}

#[derive(Debug, Default)]
struct ColumnStats {
    values: Vec<f64>,
    sum: f64,
    sum_squares: f64,
    min: Option<f64>,
    max: Option<f64>,
}

impl ColumnStats {
    fn add_value(&mut self, value: f64) {
        self.sum += value;
        self.sum_squares += value * value;
        self.min = Some(self.min.map_or(value, |current| current.min(value)));
        self.max = Some(self.max.map_or(value, |current| current.max(value)));
        self.values.push(value);
    }

    fn count(&self) -> usize {
        self.values.len()
    }

    fn mean(&self) -> Option<f64> {
        (self.count() > 0).then(|| self.sum / self.count() as f64)
    }

    fn median(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        let mut sorted = self.values.clone();
        sorted.sort_by(f64::total_cmp);
        let mid = sorted.len() / 2;
        if sorted.len().is_multiple_of(2) {
            Some((sorted[mid - 1] + sorted[mid]) / 2.0)
        } else {
            Some(sorted[mid])
        }
    }

    fn std_dev(&self) -> Option<f64> {
        let count = self.count();
        if count < 2 {
            return None;
        }
        let mean = self.mean()?;
        let variance = (self.sum_squares - count as f64 * mean * mean) / (count as f64 - 1.0);
        Some(variance.max(0.0).sqrt())
    }

    fn finish(self) -> Option<ColumnSummary> {
        Some(ColumnSummary {
            total: self.sum,
            average: self.mean()?,
            count: self.count(),
            min: self.min?,
            max: self.max?,
            median: self.median()?,
            std_dev: self.std_dev(),
        })
    }
}

/// Summary of a column's numeric cells; `None` when it has none.
pub fn summarize_column(column: &Column) -> Option<ColumnSummary> {
    let mut stats = ColumnStats::default();
    for value in column.numbers() {
        stats.add_value(value);
    }
    stats.finish()
}

/// Summaries for every numeric column, keyed by column name.
pub fn summarize(dataset: &Dataset) -> BTreeMap<String, ColumnSummary> {
    dataset
        .columns()
        .iter()
        .filter(|column| column.is_numeric())
        .filter_map(|column| Some((column.name.clone(), summarize_column(column)?)))
        .collect()
}

pub fn is_money_column(name: &str) -> bool {
    name_contains_any(name, MONEY_WORDS)
}

/// `$1,234.56` for money columns, `1,234.56` otherwise.
pub fn format_amount(column: &str, value: f64) -> String {
    if is_money_column(column) {
        format_currency(value)
    } else {
        format_grouped(value)
    }
}

/// Insight lines for aggregated columns: total, per-record average, annual
/// payroll cost for salary columns, and the number of records analyzed.
pub fn insights_for<'a>(
    summaries: impl IntoIterator<Item = (&'a String, &'a ColumnSummary)>,
) -> Vec<String> {
    let mut insights = Vec::new();
    for (column, summary) in summaries {
        insights.push(format!(
            "Total {column}: {}",
            format_amount(column, summary.total)
        ));
        insights.push(format!(
            "Average {column} per record: {}",
            format_currency(summary.average)
        ));
        if name_contains_any(column, &["salary"]) {
            insights.push(format!(
                "Annual payroll cost: {}",
                format_currency(summary.total * 12.0)
            ));
        }
        if summary.count > 0 {
            insights.push(format!("Records analyzed: {}", summary.count));
        }
    }
    insights
}

/// What a loaded file looks like: shape, column kinds, a sample, and
/// statistics.
#[derive(Debug, Clone, Serialize)]
pub struct FileInfo {
    pub filename: String,
    pub size_mb: f64,
    pub rows: usize,
    pub columns: usize,
    pub column_names: Vec<String>,
    pub data_types: BTreeMap<String, &'static str>,
    pub numeric_columns: Vec<String>,
    pub text_columns: Vec<String>,
    pub sample_data: Vec<BTreeMap<String, Cell>>,
    pub summary_stats: BTreeMap<String, ColumnSummary>,
}

impl FileInfo {
    const SAMPLE_ROWS: usize = 3;

    pub fn new(path: &Path, size_bytes: u64, dataset: &Dataset) -> Self {
        let size_mb = (size_bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0;
        let data_types = dataset
            .columns()
            .iter()
            .map(|c| {
                let kind = if c.is_numeric() { "numeric" } else { "text" };
                (c.name.clone(), kind)
            })
            .collect();
        Self {
            filename: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            size_mb,
            rows: dataset.row_count(),
            columns: dataset.column_count(),
            column_names: dataset.header_names(),
            data_types,
            numeric_columns: owned(dataset.numeric_columns()),
            text_columns: owned(dataset.text_columns()),
            sample_data: (0..dataset.row_count().min(Self::SAMPLE_ROWS))
                .map(|row| typed_record(dataset, row))
                .collect(),
            summary_stats: summarize(dataset),
        }
    }
}

/// One row with typed cells keyed by header.
pub fn typed_record(dataset: &Dataset, row: usize) -> BTreeMap<String, Cell> {
    dataset
        .columns()
        .iter()
        .map(|c| (c.name.clone(), c.cells.get(row).cloned().unwrap_or_default()))
        .collect()
}

fn owned(names: Vec<&str>) -> Vec<String> {
    names.into_iter().map(str::to_string).collect()
}
