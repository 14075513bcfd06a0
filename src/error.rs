//! Error taxonomy shared by the loader, resolver, and update engine.
//!
//! Library functions return [`SheetError`]; the CLI layer wraps these with
//! `anyhow` context. Permission problems while persisting are not errors:
//! they surface as [`crate::persist::WriteOutcome::WrittenToFallback`].

use std::{io, path::PathBuf};

use thiserror::Error;

pub type Result<T, E = SheetError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Unsupported file format: '{extension}' (expected csv, xlsx, xls, or ods)")]
    UnsupportedFormat { extension: String },

    #[error("Spreadsheet {} contains no data rows", .0.display())]
    EmptyDataset(PathBuf),

    #[error("Could not parse {} as a table; tried {}", .path.display(), .attempts.join(", "))]
    InvalidDataset { path: PathBuf, attempts: Vec<String> },

    #[error("File too large: {size} bytes (limit {limit})")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("Failed to read workbook {}: {message}", .path.display())]
    Workbook { path: PathBuf, message: String },

    #[error("Column '{query}' not found. Available columns: {}", .available.join(", "))]
    ColumnNotFound {
        query: String,
        available: Vec<String>,
    },

    #[error("No numeric columns matched the command '{command}'")]
    NoTargetColumns { command: String },

    #[error("No percentage or amount found in '{command}'")]
    MissingAdjustment { command: String },

    #[error("Column '{0}' contains no numeric data")]
    NoNumericData(String),

    #[error("Value '{0}' is not a number")]
    InvalidValue(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Failed to back up {}: {reason}", .path.display())]
    Backup { path: PathBuf, reason: String },

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error("Invalid configuration in {}: {message}", .path.display())]
    Config { path: PathBuf, message: String },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl SheetError {
    /// Builds a `ColumnNotFound` listing at most ten candidate columns.
    pub fn column_not_found<'a>(query: &str, columns: impl IntoIterator<Item = &'a str>) -> Self {
        SheetError::ColumnNotFound {
            query: query.to_string(),
            available: columns.into_iter().take(10).map(str::to_string).collect(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SheetError::NotFound(_))
    }
}

/// Persistence failures that could not be degraded into a fallback file.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Creating temporary file in {}: {source}", .dir.display())]
    TempFile { dir: PathBuf, source: io::Error },

    #[error("Serializing dataset to {}: {message}", .path.display())]
    Serialize { path: PathBuf, message: String },

    #[error("Replacing {}: {source}", .path.display())]
    Replace { path: PathBuf, source: io::Error },

    #[error("Writing fallback file {}: {source}", .path.display())]
    Fallback { path: PathBuf, source: io::Error },
}
