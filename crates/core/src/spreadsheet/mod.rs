//! Invoice import/export in a spreadsheet-friendly CSV layout.
//!
//! One row per line item; invoice-level columns repeat on every row of the
//! same invoice and are read from the first one on import.

pub mod error;
pub mod export;
pub mod import;


pub use error::{RowError, SpreadsheetError};
pub use export::export_invoices;
pub use import::{ImportBatch, import_invoices};

/// Columns of the interchange layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    /// Invoice number.
    InvoiceNumber,
    /// Vendor name.
    VendorName,
    /// Customer name.
    CustomerName,
    /// Currency code.
    Currency,
    /// Issue date.
    IssueDate,
    /// Due date.
    DueDate,
    /// Status.
    Status,
    /// Invoice tax amount.
    TaxAmount,
    /// Line number.
    LineNumber,
    /// Line description.
    Description,
    /// Line quantity.
    Quantity,
    /// Line unit price.
    UnitPrice,
    /// Line amount.
    Amount,
}

/// Columns in export order.
pub const COLUMNS: [Column; 13] = [
    Column::InvoiceNumber,
    Column::VendorName,
    Column::CustomerName,
    Column::Currency,
    Column::IssueDate,
    Column::DueDate,
    Column::Status,
    Column::TaxAmount,
    Column::LineNumber,
    Column::Description,
    Column::Quantity,
    Column::UnitPrice,
    Column::Amount,
];

impl Column {
    /// Header name.
    #[must_use]
    pub const fn header(self) -> &'static str {
        match self {
            Self::InvoiceNumber => "invoice_number",
            Self::VendorName => "vendor_name",
            Self::CustomerName => "customer_name",
            Self::Currency => "currency",
            Self::IssueDate => "issue_date",
            Self::DueDate => "due_date",
            Self::Status => "status",
            Self::TaxAmount => "tax_amount",
            Self::LineNumber => "line_number",
            Self::Description => "description",
            Self::Quantity => "quantity",
            Self::UnitPrice => "unit_price",
            Self::Amount => "amount",
        }
    }

    /// Matches a header cell, ignoring case and surrounding whitespace.
    #[must_use]
    pub fn from_header(name: &str) -> Option<Self> {
        let name = name.trim();
        COLUMNS
            .into_iter()
            .find(|c| c.header().eq_ignore_ascii_case(name))
    }

    /// Whether an import must provide this column.
    #[must_use]
    pub const fn is_required(self) -> bool {
        !matches!(
            self,
            Self::DueDate | Self::Status | Self::LineNumber | Self::Amount
        )
    }
}
