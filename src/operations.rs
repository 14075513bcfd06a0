//! Named spreadsheet operations: the structured counterparts of the
//! natural-language update path, plus single-column aggregation.

use std::fmt;

use clap::ValueEnum;
use log::{debug, info};
use serde::Serialize;

use crate::{
    data::Cell,
    dataset::Dataset,
    error::{Result, SheetError},
};

const RATINGS: &[&str] = &[
    "Excellent",
    "Good",
    "Outstanding",
    "Satisfactory",
    "Needs Improvement",
];
const DEPARTMENT_CODES: &[&str] = &["ENG001", "MKT001", "SAL001", "HR001", "FIN001"];
const DEFAULT_RAISE_PERCENT: f64 = 10.0;
const DEFAULT_BONUS_FACTOR: f64 = 1.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateOperation {
    SalaryIncrease,
    BonusUpdate,
    AddColumn,
}

impl UpdateOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateOperation::SalaryIncrease => "salary_increase",
            UpdateOperation::BonusUpdate => "bonus_update",
            UpdateOperation::AddColumn => "add_column",
        }
    }
}

impl fmt::Display for UpdateOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional inputs of an [`UpdateOperation`].
#[derive(Debug, Clone, Default)]
pub struct OperationRequest {
    pub column: Option<String>,
    pub value: Option<String>,
    pub percentage: Option<f64>,
}

/// Columns an operation changed or created.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OperationChange {
    pub modified_columns: Vec<String>,
    pub added_columns: Vec<String>,
}

pub fn apply_operation(
    dataset: &mut Dataset,
    operation: UpdateOperation,
    request: &OperationRequest,
) -> Result<OperationChange> {
    let change = match operation {
        UpdateOperation::SalaryIncrease => salary_increase(
            dataset,
            request.percentage.unwrap_or(DEFAULT_RAISE_PERCENT),
        )?,
        UpdateOperation::BonusUpdate => bonus_update(dataset, request.value.as_deref())?,
        UpdateOperation::AddColumn => add_column(
            dataset,
            request.column.as_deref().unwrap_or("New_Column"),
            request.value.as_deref(),
        ),
    };
    info!("Applied {operation}: {change:?}");
    Ok(change)
}

/// Raises the first salary (or "base") column by `percentage` and rebuilds
/// the first total column as salary + bonus + benefits.
pub fn salary_increase(dataset: &mut Dataset, percentage: f64) -> Result<OperationChange> {
    let salary = dataset
        .find_column_containing(&["salary", "base"])
        .map(str::to_string)
        .ok_or_else(|| SheetError::NoTargetColumns {
            command: UpdateOperation::SalaryIncrease.to_string(),
        })?;
    let factor = 1.0 + percentage / 100.0;
    let scaled = coerced(dataset, &salary)
        .into_iter()
        .zip(cells_of(dataset, &salary))
        .map(|(value, original)| match value {
            Some(v) => Cell::Number(v * factor),
            None => original,
        })
        .collect();
    dataset.set_column(&salary, scaled);
    let mut change = OperationChange {
        modified_columns: vec![salary.clone()],
        ..OperationChange::default()
    };

    if let Some(total) = dataset.find_column_containing(&["total"]).map(str::to_string) {
        let mut parts = vec![salary];
        parts.extend(first_containing(dataset, "bonus"));
        parts.extend(first_containing(dataset, "benefit"));
        let sums = summed(dataset, &parts);
        dataset.set_column(&total, sums);
        debug!("Recomputed '{total}' from {parts:?}");
        change.modified_columns.push(total);
    }
    Ok(change)
}

/// Writes `New_<bonus>` as `value` for every row, or as the current bonus
/// raised by 20%, then `Updated_<total>` from the new bonus, salary, and
/// benefits.
pub fn bonus_update(dataset: &mut Dataset, value: Option<&str>) -> Result<OperationChange> {
    let bonus = first_containing(dataset, "bonus").ok_or_else(|| SheetError::NoTargetColumns {
        command: UpdateOperation::BonusUpdate.to_string(),
    })?;
    let new_values: Vec<f64> = match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(raw) => {
            let fixed = match Cell::parse(raw).as_number() {
                Some(number) => number,
                None => return Err(SheetError::InvalidValue(raw.to_string())),
            };
            vec![fixed; dataset.row_count()]
        }
        None => coerced(dataset, &bonus)
            .into_iter()
            .map(|v| v.unwrap_or_default() * DEFAULT_BONUS_FACTOR)
            .collect(),
    };
    let total = first_containing(dataset, "total");
    let new_bonus = format!("New_{bonus}");
    dataset.set_column(&new_bonus, new_values.iter().copied().map(Cell::Number).collect());
    let mut change = OperationChange {
        added_columns: vec![new_bonus.clone()],
        ..OperationChange::default()
    };

    if let Some(total) = total {
        let mut parts = vec![new_bonus];
        parts.extend(first_containing(dataset, "salary"));
        parts.extend(first_containing(dataset, "benefit"));
        let updated_total = format!("Updated_{total}");
        let sums = summed(dataset, &parts);
        dataset.set_column(&updated_total, sums);
        change.added_columns.push(updated_total);
    }
    Ok(change)
}

/// Appends a column, suffixing `_New` when the name is taken. Values are
/// generated from the column name when it suggests ratings, experience,
/// money, or department codes.
pub fn add_column(dataset: &mut Dataset, name: &str, value: Option<&str>) -> OperationChange {
    let name = if dataset.has_column(name) {
        format!("{name}_New")
    } else {
        name.to_string()
    };
    let lowered = name.to_lowercase();
    let rows = dataset.row_count();
    let cells: Vec<Cell> = if lowered.contains("rating") || lowered.contains("performance") {
        (0..rows)
            .map(|i| Cell::Text(RATINGS[i % RATINGS.len()].to_string()))
            .collect()
    } else if lowered.contains("experience") || lowered.contains("years") {
        (0..rows).map(|i| Cell::Number((2 + i % 8) as f64)).collect()
    } else if lowered.contains("bonus") || lowered.contains("salary") {
        (0..rows)
            .map(|i| Cell::Number(1000.0 + i as f64 * 200.0))
            .collect()
    } else if lowered.contains("department") && lowered.contains("code") {
        (0..rows)
            .map(|i| Cell::Text(DEPARTMENT_CODES[i % DEPARTMENT_CODES.len()].to_string()))
            .collect()
    } else {
        let fill = match value.filter(|v| !v.is_empty()) {
            Some(v) => Cell::parse(v),
            None => Cell::Text(format!("Value_{name}")),
        };
        vec![fill; rows]
    };
    dataset.set_column(&name, cells);
    OperationChange {
        added_columns: vec![name],
        ..OperationChange::default()
    }
}

fn first_containing(dataset: &Dataset, needle: &str) -> Option<String> {
    dataset.find_column_containing(&[needle]).map(str::to_string)
}

fn cells_of(dataset: &Dataset, name: &str) -> Vec<Cell> {
    dataset
        .column(name)
        .map(|c| c.cells.clone())
        .unwrap_or_default()
}

fn coerced(dataset: &Dataset, name: &str) -> Vec<Option<f64>> {
    dataset
        .column(name)
        .map(|c| c.cells.iter().map(Cell::coerce_number).collect())
        .unwrap_or_default()
}

/// Row-wise sum of `parts`. The first part must hold a number for the row
/// to have a total; the others count as zero when missing.
fn summed(dataset: &Dataset, parts: &[String]) -> Vec<Cell> {
    let Some((lead, rest)) = parts.split_first() else {
        return Vec::new();
    };
    let rest: Vec<Vec<Option<f64>>> = rest.iter().map(|p| coerced(dataset, p)).collect();
    coerced(dataset, lead)
        .into_iter()
        .enumerate()
        .map(|(row, lead)| match lead {
            Some(value) => {
                let extra: f64 = rest
                    .iter()
                    .map(|col| col.get(row).copied().flatten().unwrap_or_default())
                    .sum();
                Cell::Number(value + extra)
            }
            None => Cell::Empty,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateOp {
    Sum,
    Total,
    Avg,
    Count,
}

impl AggregateOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateOp::Sum => "sum",
            AggregateOp::Total => "total",
            AggregateOp::Avg => "avg",
            AggregateOp::Count => "count",
        }
    }
}

impl fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregates every cell of `column` that reads as a number.
pub fn aggregate(dataset: &Dataset, column: &str, op: AggregateOp) -> Result<f64> {
    let values: Vec<f64> = dataset
        .column(column)
        .map(|c| c.cells.iter().filter_map(Cell::coerce_number).collect())
        .unwrap_or_default();
    if values.is_empty() {
        return Err(SheetError::NoNumericData(column.to_string()));
    }
    let result = match op {
        AggregateOp::Sum | AggregateOp::Total => values.iter().sum(),
        AggregateOp::Avg => values.iter().sum::<f64>() / values.len() as f64,
        AggregateOp::Count => values.len() as f64,
    };
    debug!(
        "{op} over '{column}' = {result} ({} data point(s))",
        values.len()
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use encoding_rs::UTF_8;

    use super::*;
    use crate::dataset::SourceFormat;

    fn payroll() -> Dataset {
        Dataset::from_text_rows(
            vec![
                "Employee".into(),
                "Base_Salary".into(),
                "Bonus".into(),
                "Benefits".into(),
                "Total_Comp".into(),
            ],
            vec![
                vec!["Ann".into(), "1000".into(), "100".into(), "10".into(), "1110".into()],
                vec!["Bob".into(), "2000".into(), "".into(), "20".into(), "2020".into()],
            ],
            SourceFormat::Csv {
                delimiter: b',',
                encoding: UTF_8,
            },
        )
    }

    fn numbers(dataset: &Dataset, column: &str) -> Vec<f64> {
        dataset.column(column).unwrap().numbers().collect()
    }

    #[test]
    fn salary_increase_defaults_to_ten_percent_and_rebuilds_total() {
        let mut dataset = payroll();
        let change =
            apply_operation(&mut dataset, UpdateOperation::SalaryIncrease, &OperationRequest::default())
                .unwrap();
        assert_eq!(change.modified_columns, vec!["Base_Salary", "Total_Comp"]);
        let salaries = numbers(&dataset, "Base_Salary");
        assert!((salaries[0] - 1100.0).abs() < 1e-9);
        let totals = numbers(&dataset, "Total_Comp");
        assert!((totals[0] - 1210.0).abs() < 1e-9);
        assert!((totals[1] - 2220.0).abs() < 1e-9);
    }

    #[test]
    fn salary_increase_without_salary_column_fails() {
        let mut dataset = Dataset::from_text_rows(
            vec!["Region".into(), "Sales".into()],
            vec![vec!["EU".into(), "5".into()]],
            SourceFormat::Xlsx,
        );
        assert!(matches!(
            salary_increase(&mut dataset, 5.0),
            Err(SheetError::NoTargetColumns { .. })
        ));
    }

    #[test]
    fn bonus_update_adds_new_and_updated_columns() {
        let mut dataset = payroll();
        let change = bonus_update(&mut dataset, None).unwrap();
        assert_eq!(change.added_columns, vec!["New_Bonus", "Updated_Total_Comp"]);
        let bonus = numbers(&dataset, "New_Bonus");
        assert!((bonus[0] - 120.0).abs() < 1e-9);
        assert_eq!(bonus[1], 0.0);
        let totals = numbers(&dataset, "Updated_Total_Comp");
        assert!((totals[0] - 1130.0).abs() < 1e-9);
        assert_eq!(numbers(&dataset, "Bonus"), vec![100.0]);
    }

    #[test]
    fn bonus_update_rejects_non_numeric_value() {
        let mut dataset = payroll();
        assert!(matches!(
            bonus_update(&mut dataset, Some("lots")),
            Err(SheetError::InvalidValue(_))
        ));
        let change = bonus_update(&mut dataset, Some("250")).unwrap();
        assert_eq!(change.added_columns[0], "New_Bonus");
        assert_eq!(numbers(&dataset, "New_Bonus"), vec![250.0, 250.0]);
    }

    #[test]
    fn add_column_generates_values_from_name() {
        let mut dataset = payroll();
        add_column(&mut dataset, "Performance_Rating", None);
        add_column(&mut dataset, "Years", None);
        add_column(&mut dataset, "Department_Code", None);
        add_column(&mut dataset, "Notes", Some("n/a"));
        add_column(&mut dataset, "Flag", None);
        assert_eq!(dataset.record(1)["Performance_Rating"], "Good");
        assert_eq!(numbers(&dataset, "Years"), vec![2.0, 3.0]);
        assert_eq!(dataset.record(0)["Department_Code"], "ENG001");
        assert_eq!(dataset.record(0)["Notes"], "n/a");
        assert_eq!(dataset.record(1)["Flag"], "Value_Flag");
    }

    #[test]
    fn add_column_suffixes_taken_names() {
        let mut dataset = payroll();
        let change = add_column(&mut dataset, "Bonus", None);
        assert_eq!(change.added_columns, vec!["Bonus_New"]);
        assert_eq!(numbers(&dataset, "Bonus_New"), vec![1000.0, 1200.0]);
    }

    #[test]
    fn aggregate_coerces_and_counts() {
        let dataset = payroll();
        assert_eq!(aggregate(&dataset, "Base_Salary", AggregateOp::Sum).unwrap(), 3000.0);
        assert_eq!(aggregate(&dataset, "Base_Salary", AggregateOp::Avg).unwrap(), 1500.0);
        assert_eq!(aggregate(&dataset, "Bonus", AggregateOp::Count).unwrap(), 1.0);
        assert!(matches!(
            aggregate(&dataset, "Employee", AggregateOp::Total),
            Err(SheetError::NoNumericData(_))
        ));
    }
}
