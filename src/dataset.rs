//! In-memory tabular dataset produced by the loader and mutated by the
//! update engine.
//!
//! Columns are stored column-major and always hold the same number of cells.
//! A column is numeric when it has at least one value and every non-empty
//! cell is a number.

use std::collections::{BTreeMap, HashSet};

use encoding_rs::Encoding;

use crate::data::Cell;

/// How the dataset was read, so it can be written back the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv {
        delimiter: u8,
        encoding: &'static Encoding,
    },
    Xlsx,
    Xls,
    Ods,
}

impl SourceFormat {
    pub fn label(&self) -> String {
        match self {
            SourceFormat::Csv {
                delimiter,
                encoding,
            } => format!(
                "csv ({}, delimiter '{}')",
                encoding.name(),
                crate::printable_delimiter(*delimiter)
            ),
            SourceFormat::Xlsx => "xlsx".to_string(),
            SourceFormat::Xls => "xls".to_string(),
            SourceFormat::Ods => "ods".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    Text,
}

#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub cells: Vec<Cell>,
}

impl Column {
    pub fn kind(&self) -> ColumnKind {
        let mut seen_value = false;
        for cell in &self.cells {
            match cell {
                Cell::Empty => {}
                Cell::Number(_) => seen_value = true,
                Cell::Text(_) => return ColumnKind::Text,
            }
        }
        if seen_value {
            ColumnKind::Numeric
        } else {
            ColumnKind::Text
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.kind() == ColumnKind::Numeric
    }

    /// Non-empty numeric values in row order.
    pub fn numbers(&self) -> impl Iterator<Item = f64> + '_ {
        self.cells.iter().filter_map(Cell::as_number)
    }

    pub fn sum(&self) -> f64 {
        self.numbers().sum()
    }
}

#[derive(Debug, Clone)]
pub struct Dataset {
    columns: Vec<Column>,
    row_count: usize,
    source: SourceFormat,
}

impl Dataset {
    /// Builds a dataset from raw text rows, inferring cell types. Short rows
    /// are padded with empty cells and surplus fields are dropped.
    pub fn from_text_rows(headers: Vec<String>, rows: Vec<Vec<String>>, source: SourceFormat) -> Self {
        let cells = rows
            .into_iter()
            .map(|row| row.iter().map(|raw| Cell::parse(raw)).collect())
            .collect();
        Self::from_cells(headers, cells, source)
    }

    pub fn from_cells(headers: Vec<String>, rows: Vec<Vec<Cell>>, source: SourceFormat) -> Self {
        let headers = unique_headers(headers);
        let row_count = rows.len();
        let mut columns: Vec<Column> = headers
            .into_iter()
            .map(|name| Column {
                name,
                cells: Vec::with_capacity(row_count),
            })
            .collect();
        for row in rows {
            let mut row = row.into_iter();
            for column in &mut columns {
                column.cells.push(row.next().unwrap_or_default());
            }
        }
        Self {
            columns,
            row_count,
            source,
        }
    }

    pub fn source(&self) -> SourceFormat {
        self.source
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn headers(&self) -> impl Iterator<Item = &str> + '_ {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn header_names(&self) -> Vec<String> {
        self.headers().map(str::to_string).collect()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn numeric_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.is_numeric())
            .map(|c| c.name.as_str())
            .collect()
    }

    pub fn text_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| !c.is_numeric())
            .map(|c| c.name.as_str())
            .collect()
    }

    /// First column whose lower-cased name contains any of `needles`.
    pub fn find_column_containing(&self, needles: &[&str]) -> Option<&str> {
        self.columns
            .iter()
            .map(|c| c.name.as_str())
            .find(|name| name_contains_any(name, needles))
    }

    /// Applies `f` to every numeric cell of a column. Empty and text cells
    /// are left alone. Returns `false` when the column does not exist.
    pub fn map_numbers(&mut self, name: &str, mut f: impl FnMut(f64) -> f64) -> bool {
        let Some(column) = self.column_mut(name) else {
            return false;
        };
        for cell in &mut column.cells {
            if let Cell::Number(value) = cell {
                *value = f(*value);
            }
        }
        true
    }

    /// Replaces a column's cells, or appends a new column when `name` is
    /// not present yet. The cell vector is resized to the row count.
    pub fn set_column(&mut self, name: &str, mut cells: Vec<Cell>) {
        cells.resize(self.row_count, Cell::Empty);
        match self.column_mut(name) {
            Some(column) => column.cells = cells,
            None => self.columns.push(Column {
                name: name.to_string(),
                cells,
            }),
        }
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&Cell> {
        self.columns.get(column).and_then(|c| c.cells.get(row))
    }

    /// One row as display strings keyed by header.
    pub fn record(&self, row: usize) -> BTreeMap<String, String> {
        self.columns
            .iter()
            .map(|c| {
                let value = c.cells.get(row).map(Cell::as_display).unwrap_or_default();
                (c.name.clone(), value)
            })
            .collect()
    }

    /// Row indices ordered by a numeric column, largest first. Rows without
    /// a value are skipped; ties keep their original order.
    pub fn rows_by_largest(&self, name: &str, limit: usize) -> Vec<usize> {
        let Some(column) = self.column(name) else {
            return Vec::new();
        };
        let mut indices: Vec<(usize, f64)> = column
            .cells
            .iter()
            .enumerate()
            .filter_map(|(idx, cell)| cell.as_number().map(|v| (idx, v)))
            .collect();
        indices.sort_by(|a, b| b.1.total_cmp(&a.1));
        indices.into_iter().take(limit).map(|(idx, _)| idx).collect()
    }

    /// Text rows in column order, used by the writers.
    pub fn display_rows(&self) -> impl Iterator<Item = Vec<String>> + '_ {
        (0..self.row_count).map(move |row| {
            self.columns
                .iter()
                .map(|c| c.cells[row].as_display())
                .collect()
        })
    }
}

pub(crate) fn name_contains_any(name: &str, needles: &[&str]) -> bool {
    let lowered = name.to_lowercase();
    needles.iter().any(|needle| lowered.contains(needle))
}

fn unique_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    headers
        .into_iter()
        .enumerate()
        .map(|(idx, header)| {
            let trimmed = header.trim();
            let base = if trimmed.is_empty() {
                format!("column_{}", idx + 1)
            } else {
                trimmed.to_string()
            };
            let mut candidate = base.clone();
            let mut suffix = 1;
            while !seen.insert(candidate.clone()) {
                candidate = format!("{base}.{suffix}");
                suffix += 1;
            }
            candidate
        })
        .collect()
}
