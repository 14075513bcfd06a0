//! Tabular loader: turns a CSV/XLSX/XLS/ODS path into a [`Dataset`].
//!
//! CSV files are read once and re-parsed against every encoding and
//! delimiter candidate until one yields a multi-column table. Workbooks go
//! through `calamine`; only the first sheet is read and its first row is
//! the header row.

use std::{fs, path::Path};

use calamine::{Data, DataType, Reader, open_workbook_auto};
use log::{debug, info};

use crate::{
    data::Cell,
    dataset::{Dataset, SourceFormat},
    error::{Result, SheetError},
    io_utils,
};

pub const SUPPORTED_EXTENSIONS: &[&str] = &[".csv", ".xlsx", ".xls", ".ods"];

#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    /// Files above this many bytes are rejected; `0` disables the check.
    pub max_file_size: u64,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024,
        }
    }
}

/// Maps a path's extension to the format the loader reads it as.
pub fn detect_format(path: &Path) -> Result<FileKind> {
    match io_utils::dotted_extension(path).as_str() {
        ".csv" => Ok(FileKind::Csv),
        ".xlsx" => Ok(FileKind::Workbook(SourceFormat::Xlsx)),
        ".xls" => Ok(FileKind::Workbook(SourceFormat::Xls)),
        ".ods" => Ok(FileKind::Workbook(SourceFormat::Ods)),
        other => Err(SheetError::UnsupportedFormat {
            extension: other.to_string(),
        }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Csv,
    Workbook(SourceFormat),
}

pub fn load_dataset(path: &Path, options: &LoadOptions) -> Result<Dataset> {
    if !path.is_file() {
        return Err(SheetError::NotFound(path.to_path_buf()));
    }
    let kind = detect_format(path)?;
    let size = fs::metadata(path)?.len();
    if options.max_file_size > 0 && size > options.max_file_size {
        return Err(SheetError::FileTooLarge {
            size,
            limit: options.max_file_size,
        });
    }

    let dataset = match kind {
        FileKind::Csv => read_csv(path)?,
        FileKind::Workbook(format) => read_workbook(path, format)?,
    };
    if dataset.is_empty() {
        return Err(SheetError::EmptyDataset(path.to_path_buf()));
    }
    info!(
        "Loaded {:?} as {}: {} row(s) x {} column(s)",
        path,
        dataset.source().label(),
        dataset.row_count(),
        dataset.column_count()
    );
    Ok(dataset)
}

fn read_csv(path: &Path) -> Result<Dataset> {
    let bytes = fs::read(path)?;
    let mut attempts = Vec::new();
    for label in io_utils::ENCODING_CANDIDATES {
        let Some(encoding) = io_utils::resolve_encoding(label) else {
            continue;
        };
        let Some(text) = io_utils::decode_bytes(&bytes, encoding) else {
            debug!("{path:?} is not valid {label}");
            attempts.extend(
                io_utils::DELIMITER_CANDIDATES
                    .iter()
                    .map(|d| attempt_label(label, *d)),
            );
            continue;
        };
        for &delimiter in io_utils::DELIMITER_CANDIDATES {
            attempts.push(attempt_label(label, delimiter));
            match io_utils::parse_csv_text(&text, delimiter) {
                Ok((headers, rows)) if headers.len() > 1 => {
                    debug!(
                        "Parsed {path:?} with {label} and delimiter '{}'",
                        crate::printable_delimiter(delimiter)
                    );
                    return Ok(Dataset::from_text_rows(
                        headers,
                        rows,
                        SourceFormat::Csv {
                            delimiter,
                            encoding,
                        },
                    ));
                }
                Ok(_) => {}
                Err(err) => debug!("Parsing {path:?} with {label}: {err}"),
            }
        }
    }
    Err(SheetError::InvalidDataset {
        path: path.to_path_buf(),
        attempts,
    })
}

fn attempt_label(encoding: &str, delimiter: u8) -> String {
    format!("{encoding}/'{}'", crate::printable_delimiter(delimiter))
}

fn read_workbook(path: &Path, format: SourceFormat) -> Result<Dataset> {
    let workbook_error = |message: String| SheetError::Workbook {
        path: path.to_path_buf(),
        message,
    };
    let mut workbook = open_workbook_auto(path).map_err(|e| workbook_error(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| workbook_error("workbook has no worksheets".to_string()))?
        .map_err(|e| workbook_error(e.to_string()))?;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Err(SheetError::EmptyDataset(path.to_path_buf()));
    };
    let headers = header_row.iter().map(header_text).collect::<Vec<_>>();
    if headers.len() < 2 {
        return Err(SheetError::InvalidDataset {
            path: path.to_path_buf(),
            attempts: vec![format!("{} first sheet ({} column)", format.label(), headers.len())],
        });
    }
    let body = rows
        .map(|row| row.iter().map(workbook_cell).collect::<Vec<_>>())
        .filter(|row| row.iter().any(|cell| !cell.is_empty()))
        .collect();
    Ok(Dataset::from_cells(headers, body, format))
}

fn header_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::Float(f) => crate::data::format_number(*f),
        other => other.as_string().unwrap_or_else(|| other.to_string()),
    }
}

fn workbook_cell(cell: &Data) -> Cell {
    match cell {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::String(s) => Cell::parse(s),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::DateTime(_) => cell
            .as_datetime()
            .map(|dt| Cell::Text(dt.format("%Y-%m-%d %H:%M:%S").to_string()))
            .unwrap_or_default(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}
