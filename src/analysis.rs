//! Read-only aggregators, one per analysis intent.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    data::{Cell, format_currency},
    dataset::{Dataset, name_contains_any},
    error::{Result, SheetError},
    intent::CommandIntent,
    summary::{self, ColumnSummary, format_amount, is_money_column},
    update,
};

const NAME_WORDS: &[&str] = &["name", "employee", "rep", "person"];
const INFO_COLUMNS: &[&str] = &["Position", "Department", "Region", "Country"];
const TOP_LIMIT: usize = 5;
const DETAIL_LIMIT: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct SumResult {
    pub total: f64,
    pub count: usize,
    pub average: f64,
    pub formatted_total: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SumAnalysis {
    pub results: BTreeMap<String, SumResult>,
    pub record_details: Vec<BTreeMap<String, String>>,
    pub total_records: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopResult {
    pub top_performers: Vec<BTreeMap<String, Cell>>,
    pub highest_value: f64,
    pub top_5_total: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopAnalysis {
    pub results: BTreeMap<String, TopResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AverageResult {
    pub average: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AverageAnalysis {
    pub results: BTreeMap<String, AverageResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileSummary {
    pub total_rows: usize,
    pub total_columns: usize,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FormattedTotals {
    pub total: String,
    pub average: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadAnalysis {
    pub file_summary: FileSummary,
    pub employee_data: Vec<BTreeMap<String, String>>,
    pub totals_summary: BTreeMap<String, FormattedTotals>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnOverview {
    #[serde(flatten)]
    pub summary: ColumnSummary,
    pub formatted_total: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComprehensiveAnalysis {
    pub analysis: BTreeMap<String, ColumnOverview>,
    pub employee_breakdown: Vec<BTreeMap<String, String>>,
    pub total_records: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "operation")]
pub enum AnalysisOutcome {
    #[serde(rename = "intelligent_sum_analysis")]
    Sum(SumAnalysis),
    #[serde(rename = "top_performers_analysis")]
    Top(TopAnalysis),
    #[serde(rename = "average_analysis")]
    Average(AverageAnalysis),
    #[serde(rename = "smart_file_read_with_data")]
    Read(ReadAnalysis),
    #[serde(rename = "smart_comprehensive_analysis")]
    Comprehensive(ComprehensiveAnalysis),
}

#[derive(Debug, Clone)]
pub struct Analysis {
    pub outcome: AnalysisOutcome,
    pub insights: Vec<String>,
}

/// Runs the aggregator for a read-only intent. Update intents are handled
/// by the update engine and rejected here.
pub fn analyze(
    intent: CommandIntent,
    dataset: &Dataset,
    command: &str,
    threshold: f64,
) -> Result<Analysis> {
    match intent {
        CommandIntent::SumAnalysis => sum_analysis(dataset, command, threshold),
        CommandIntent::TopAnalysis => top_analysis(dataset, command, threshold),
        CommandIntent::AverageAnalysis => average_analysis(dataset, command, threshold),
        CommandIntent::ReadAnalysis => Ok(read_analysis(dataset)),
        CommandIntent::ComprehensiveAnalysis => Ok(comprehensive_analysis(dataset)),
        CommandIntent::SalaryUpdate | CommandIntent::BonusUpdate | CommandIntent::GeneralUpdate => {
            Err(SheetError::UnsupportedOperation(format!(
                "{intent} is not a read-only analysis"
            )))
        }
    }
}

/// Target columns for an analysis; a dataset without numeric columns simply
/// has none.
fn analysis_targets(dataset: &Dataset, command: &str, threshold: f64) -> Result<Vec<String>> {
    match update::identify_target_columns(dataset, command, threshold) {
        Err(SheetError::NoTargetColumns { .. }) => Ok(Vec::new()),
        other => other,
    }
}

fn name_column(dataset: &Dataset) -> Option<&str> {
    dataset.find_column_containing(NAME_WORDS)
}

fn info_columns(dataset: &Dataset) -> Vec<&'static str> {
    INFO_COLUMNS
        .iter()
        .copied()
        .filter(|name| dataset.has_column(name))
        .collect()
}

fn display(dataset: &Dataset, row: usize, column: &str) -> String {
    dataset
        .column(column)
        .and_then(|c| c.cells.get(row))
        .map(Cell::as_display)
        .unwrap_or_default()
}

fn summaries_for(dataset: &Dataset, targets: &[String]) -> BTreeMap<String, ColumnSummary> {
    targets
        .iter()
        .filter_map(|name| {
            let column = dataset.column(name)?;
            Some((name.clone(), summary::summarize_column(column)?))
        })
        .collect()
}

pub fn sum_analysis(dataset: &Dataset, command: &str, threshold: f64) -> Result<Analysis> {
    let targets = analysis_targets(dataset, command, threshold)?;
    let summaries = summaries_for(dataset, &targets);
    let name_column = name_column(dataset);
    let info_columns = info_columns(dataset);

    let mut results = BTreeMap::new();
    let mut record_details = Vec::new();
    for column in &targets {
        let Some(summary) = summaries.get(column) else {
            continue;
        };
        results.insert(
            column.clone(),
            SumResult {
                total: summary.total,
                count: summary.count,
                average: summary.average,
                formatted_total: format_amount(column, summary.total),
            },
        );
        for row in dataset.rows_by_largest(column, TOP_LIMIT) {
            let mut detail = BTreeMap::new();
            if let Some(name) = name_column {
                detail.insert("name".to_string(), display(dataset, row, name));
            }
            let value = dataset
                .column(column)
                .and_then(|c| c.cells[row].as_number())
                .unwrap_or_default();
            detail.insert(column.clone(), format_amount(column, value));
            for info in &info_columns {
                detail.insert(info.to_string(), display(dataset, row, info));
            }
            record_details.push(detail);
        }
    }
    record_details.truncate(DETAIL_LIMIT);

    Ok(Analysis {
        insights: summary::insights_for(&summaries),
        outcome: AnalysisOutcome::Sum(SumAnalysis {
            results,
            record_details,
            total_records: dataset.row_count(),
        }),
    })
}

pub fn top_analysis(dataset: &Dataset, command: &str, threshold: f64) -> Result<Analysis> {
    let targets = analysis_targets(dataset, command, threshold)?;
    let mut results = BTreeMap::new();
    let mut insights = Vec::new();
    for column in &targets {
        let rows = dataset.rows_by_largest(column, TOP_LIMIT);
        let Some(values) = dataset.column(column).map(|c| {
            rows.iter()
                .filter_map(|row| c.cells[*row].as_number())
                .collect::<Vec<_>>()
        }) else {
            continue;
        };
        let Some(highest) = values.first().copied() else {
            continue;
        };
        insights.push(format!(
            "Highest {column}: {}",
            format_amount(column, highest)
        ));
        results.insert(
            column.clone(),
            TopResult {
                top_performers: rows
                    .iter()
                    .map(|row| summary::typed_record(dataset, *row))
                    .collect(),
                highest_value: highest,
                top_5_total: values.iter().sum(),
            },
        );
    }
    Ok(Analysis {
        outcome: AnalysisOutcome::Top(TopAnalysis { results }),
        insights,
    })
}

pub fn average_analysis(dataset: &Dataset, command: &str, threshold: f64) -> Result<Analysis> {
    let targets = analysis_targets(dataset, command, threshold)?;
    let summaries = summaries_for(dataset, &targets);
    let mut results = BTreeMap::new();
    let mut insights = Vec::new();
    for (column, summary) in &summaries {
        insights.push(format!(
            "Average {column}: {}",
            format_amount(column, summary.average)
        ));
        results.insert(
            column.clone(),
            AverageResult {
                average: summary.average,
                median: summary.median,
                min: summary.min,
                max: summary.max,
                count: summary.count,
            },
        );
    }
    Ok(Analysis {
        outcome: AnalysisOutcome::Average(AverageAnalysis { results }),
        insights,
    })
}

/// Every record with money columns formatted, plus per-column totals.
pub fn read_analysis(dataset: &Dataset) -> Analysis {
    let money_numeric: Vec<&str> = dataset
        .numeric_columns()
        .into_iter()
        .filter(|name| is_money_column(name))
        .collect();

    let employee_data = (0..dataset.row_count())
        .map(|row| {
            dataset
                .columns()
                .iter()
                .map(|column| {
                    let value = match column.cells[row].as_number() {
                        Some(number) if money_numeric.contains(&column.name.as_str()) => {
                            format_currency(number)
                        }
                        _ => column.cells[row].as_display(),
                    };
                    (column.name.clone(), value)
                })
                .collect()
        })
        .collect();

    let summaries = summary::summarize(dataset);
    let totals_summary: BTreeMap<String, FormattedTotals> = summaries
        .iter()
        .map(|(column, summary)| {
            (
                column.clone(),
                FormattedTotals {
                    total: format_amount(column, summary.total),
                    average: format_amount(column, summary.average),
                    count: summary.count,
                },
            )
        })
        .collect();

    let mut insights = vec![
        format!("Found {} records in the file", dataset.row_count()),
        format!("Total columns: {}", dataset.column_count()),
    ];
    insights.extend(
        totals_summary
            .iter()
            .filter(|(column, _)| name_contains_any(column, &["salary", "pay", "compensation"]))
            .map(|(column, totals)| format!("Total {column}: {}", totals.total)),
    );

    Analysis {
        outcome: AnalysisOutcome::Read(ReadAnalysis {
            file_summary: FileSummary {
                total_rows: dataset.row_count(),
                total_columns: dataset.column_count(),
                columns: dataset.header_names(),
            },
            employee_data,
            totals_summary,
        }),
        insights,
    }
}

/// Every numeric column summarized, with a per-record breakdown of the
/// name, info, and money columns.
pub fn comprehensive_analysis(dataset: &Dataset) -> Analysis {
    let summaries = summary::summarize(dataset);
    let name_column = name_column(dataset);
    let info_columns = info_columns(dataset);
    let money_numeric: Vec<&str> = dataset
        .numeric_columns()
        .into_iter()
        .filter(|name| is_money_column(name))
        .collect();

    let employee_breakdown = (0..dataset.row_count())
        .map(|row| {
            let mut record = BTreeMap::new();
            if let Some(name) = name_column {
                record.insert("name".to_string(), display(dataset, row, name));
            }
            for info in &info_columns {
                record.insert(info.to_string(), display(dataset, row, info));
            }
            for column in &money_numeric {
                let value = dataset
                    .column(column)
                    .and_then(|c| c.cells[row].as_number());
                if let Some(value) = value {
                    record.insert(column.to_string(), format_currency(value));
                }
            }
            record
        })
        .collect();

    let mut insights = Vec::new();
    for (column, summary) in &summaries {
        let payroll = name_contains_any(column, &["salary", "pay", "compensation"]);
        if !payroll && !name_contains_any(column, &["sales", "revenue"]) {
            continue;
        }
        insights.push(format!(
            "Total {column}: {}",
            format_amount(column, summary.total)
        ));
        insights.push(format!(
            "Average {column}: {}",
            format_currency(summary.average)
        ));
        if payroll && name_contains_any(column, &["salary"]) {
            insights.push(format!(
                "Annual payroll cost: {}",
                format_currency(summary.total * 12.0)
            ));
        }
    }
    insights.push(format!(
        "Total employees/records analyzed: {}",
        dataset.row_count()
    ));

    let analysis = summaries
        .into_iter()
        .map(|(column, summary)| {
            let formatted_total = format_amount(&column, summary.total);
            (
                column,
                ColumnOverview {
                    summary,
                    formatted_total,
                },
            )
        })
        .collect();

    Analysis {
        outcome: AnalysisOutcome::Comprehensive(ComprehensiveAnalysis {
            analysis,
            employee_breakdown,
            total_records: dataset.row_count(),
        }),
        insights,
    }
}

#[cfg(test)]
mod tests {
    use encoding_rs::UTF_8;

    use super::*;
    use crate::columns::DEFAULT_FUZZY_THRESHOLD;
    use crate::dataset::SourceFormat;

    fn staff() -> Dataset {
        Dataset::from_text_rows(
            vec![
                "Employee_Name".into(),
                "Department".into(),
                "Base_Salary".into(),
                "Years".into(),
            ],
            vec![
                vec!["Ann".into(), "Eng".into(), "4000".into(), "3".into()],
                vec!["Bob".into(), "Ops".into(), "6000".into(), "5".into()],
                vec!["Cy".into(), "Eng".into(), "5000".into(), "1".into()],
            ],
            SourceFormat::Csv {
                delimiter: b',',
                encoding: UTF_8,
            },
        )
    }

    #[test]
    fn sum_analysis_totals_salary_with_details() {
        let analysis = analyze(
            CommandIntent::SumAnalysis,
            &staff(),
            "calculate total salary",
            DEFAULT_FUZZY_THRESHOLD,
        )
        .unwrap();
        let AnalysisOutcome::Sum(sum) = &analysis.outcome else {
            panic!("expected sum analysis");
        };
        assert_eq!(sum.results["Base_Salary"].formatted_total, "$15,000.00");
        assert_eq!(sum.record_details[0]["name"], "Bob");
        assert_eq!(sum.record_details[0]["Department"], "Ops");
        assert_eq!(sum.record_details[0]["Base_Salary"], "$6,000.00");
        assert!(analysis
            .insights
            .contains(&"Annual payroll cost: $180,000.00".to_string()));
    }

    #[test]
    fn top_analysis_orders_records() {
        let analysis = top_analysis(&staff(), "show top salary", DEFAULT_FUZZY_THRESHOLD).unwrap();
        let AnalysisOutcome::Top(top) = &analysis.outcome else {
            panic!("expected top analysis");
        };
        let result = &top.results["Base_Salary"];
        assert_eq!(result.highest_value, 6000.0);
        assert_eq!(result.top_5_total, 15000.0);
        assert_eq!(
            result.top_performers[1]["Employee_Name"],
            Cell::Text("Cy".into())
        );
    }

    #[test]
    fn average_analysis_reports_median() {
        let analysis =
            average_analysis(&staff(), "average years", DEFAULT_FUZZY_THRESHOLD).unwrap();
        let AnalysisOutcome::Average(average) = &analysis.outcome else {
            panic!("expected average analysis");
        };
        // "years" names no bucket, so the money fallback picks the salary.
        assert_eq!(average.results["Base_Salary"].median, 5000.0);
        assert_eq!(analysis.insights, vec!["Average Base_Salary: $5,000.00"]);
    }

    #[test]
    fn read_analysis_formats_money_columns_only() {
        let analysis = read_analysis(&staff());
        let AnalysisOutcome::Read(read) = &analysis.outcome else {
            panic!("expected read analysis");
        };
        assert_eq!(read.employee_data[0]["Base_Salary"], "$4,000.00");
        assert_eq!(read.employee_data[0]["Years"], "3");
        assert_eq!(read.totals_summary["Years"].total, "9.00");
        assert_eq!(
            analysis.insights,
            vec![
                "Found 3 records in the file",
                "Total columns: 4",
                "Total Base_Salary: $15,000.00",
            ]
        );
    }

    #[test]
    fn comprehensive_analysis_serializes_with_operation_tag() {
        let analysis = comprehensive_analysis(&staff());
        let json = serde_json::to_value(&analysis.outcome).unwrap();
        assert_eq!(json["operation"], "smart_comprehensive_analysis");
        assert_eq!(json["analysis"]["Base_Salary"]["total"], 15000.0);
        assert_eq!(json["employee_breakdown"][2]["name"], "Cy");
        assert_eq!(
            analysis.insights.last().map(String::as_str),
            Some("Total employees/records analyzed: 3")
        );
    }

    #[test]
    fn text_only_dataset_yields_empty_results() {
        let dataset = Dataset::from_text_rows(
            vec!["a".into(), "b".into()],
            vec![vec!["x".into(), "y".into()]],
            SourceFormat::Xlsx,
        );
        let analysis = sum_analysis(&dataset, "sum it", DEFAULT_FUZZY_THRESHOLD).unwrap();
        let AnalysisOutcome::Sum(sum) = &analysis.outcome else {
            panic!("expected sum analysis");
        };
        assert!(sum.results.is_empty());
        assert!(analysis.insights.is_empty());
    }

    #[test]
    fn update_intents_are_rejected() {
        assert!(matches!(
            analyze(
                CommandIntent::GeneralUpdate,
                &staff(),
                "increase",
                DEFAULT_FUZZY_THRESHOLD
            ),
            Err(SheetError::UnsupportedOperation(_))
        ));
    }
}
