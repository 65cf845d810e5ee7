//! Invoice error types.

use chrono::NaiveDate;
use thiserror::Error;

use super::types::InvoiceStatus;

/// Errors raised by invoice validation and lifecycle rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvoiceError {
    /// Required text field is blank.
    #[error("Field '{0}' is required")]
    MissingField(&'static str),

    /// Currency is not a 3-letter code.
    #[error("Invalid currency code: {0}")]
    InvalidCurrency(String),

    /// Due date precedes issue date.
    #[error("Due date {due} is before issue date {issue}")]
    DueBeforeIssue {
        /// Issue date.
        issue: NaiveDate,
        /// Due date.
        due: NaiveDate,
    },

    /// Tax amount is negative.
    #[error("Tax amount cannot be negative")]
    NegativeTax,

    /// Invoice has no line items.
    #[error("Invoice must have at least one line item")]
    NoItems,

    /// A line item is invalid.
    #[error("Line item {position}: {reason}")]
    InvalidItem {
        /// 1-based position in the submitted list.
        position: usize,
        /// What is wrong.
        reason: String,
    },

    /// Two items share a line number.
    #[error("Duplicate line number: {0}")]
    DuplicateLineNumber(i32),

    /// Some items carry line numbers and others do not.
    #[error("Either every line item has a line number or none does")]
    MixedLineNumbers,

    /// A quantity, price or computed amount exceeds what can be stored.
    #[error("The {0} is too large")]
    AmountOverflow(&'static str),

    /// Status change not allowed.
    #[error("Cannot change invoice status from {from} to {to}")]
    InvalidStatusTransition {
        /// Current status.
        from: InvoiceStatus,
        /// Requested status.
        to: InvoiceStatus,
    },
}

impl From<InvoiceError> for invora_shared::AppError {
    fn from(err: InvoiceError) -> Self {
        match err {
            InvoiceError::InvalidStatusTransition { .. } | InvoiceError::AmountOverflow(_) => {
                Self::BusinessRule(err.to_string())
            }
            _ => Self::Validation(err.to_string()),
        }
    }
}
