//! Spreadsheet interchange errors.

use serde::Serialize;
use thiserror::Error;

/// Fatal errors that stop an import or export.
#[derive(Debug, Error)]
pub enum SpreadsheetError {
    /// The header lacks a required column.
    #[error("Missing required column: {0}")]
    MissingColumn(&'static str),

    /// The file has no header row.
    #[error("The spreadsheet is empty")]
    Empty,

    /// Reading or writing CSV failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Flushing output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A problem with one data row. Collected instead of aborting the import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    /// 1-based data row (the header is row 0).
    pub row: usize,
    /// What is wrong.
    pub message: String,
}

impl RowError {
    pub(crate) fn new(row: usize, message: impl Into<String>) -> Self {
        Self {
            row,
            message: message.into(),
        }
    }
}

impl From<SpreadsheetError> for invora_shared::AppError {
    fn from(err: SpreadsheetError) -> Self {
        match err {
            SpreadsheetError::Io(_) => Self::Internal(err.to_string()),
            _ => Self::Validation(err.to_string()),
        }
    }
}
