//! CSV invoice import.

use std::collections::HashMap;
use std::io::Read;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use super::error::{RowError, SpreadsheetError};
use super::{COLUMNS, Column};
use crate::invoice::{InvoiceDraft, InvoiceService, InvoiceStatus, NewInvoice, NewInvoiceItem};

/// Outcome of parsing a spreadsheet.
#[derive(Debug, Default, Serialize)]
pub struct ImportBatch {
    /// Invoices that passed validation, in first-seen order.
    pub drafts: Vec<InvoiceDraft>,
    /// Row-level problems.
    pub errors: Vec<RowError>,
}

impl ImportBatch {
    /// Returns true when every row was accepted.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Rows sharing an invoice number.
struct Group {
    first_row: usize,
    invoice: Option<NewInvoice>,
    failed: bool,
}

/// Column positions resolved from the header.
struct Layout(HashMap<Column, usize>);

impl Layout {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self, SpreadsheetError> {
        let mut positions = HashMap::new();
        for (index, name) in headers.iter().enumerate() {
            if let Some(column) = Column::from_header(name) {
                positions.entry(column).or_insert(index);
            }
        }

        for column in COLUMNS {
            if column.is_required() && !positions.contains_key(&column) {
                return Err(SpreadsheetError::MissingColumn(column.header()));
            }
        }

        Ok(Self(positions))
    }

    fn cell<'r>(&self, record: &'r csv::StringRecord, column: Column) -> Option<&'r str> {
        self.0
            .get(&column)
            .and_then(|&i| record.get(i))
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

/// Reads invoices from CSV, one row per line item.
///
/// # Errors
///
/// Returns an error only for problems that make the whole file unusable
/// (no header, missing columns). Row problems are collected in the batch.
pub fn import_invoices<R: Read>(reader: R) -> Result<ImportBatch, SpreadsheetError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    if headers.is_empty() {
        return Err(SpreadsheetError::Empty);
    }
    let layout = Layout::from_headers(&headers)?;

    let mut batch = ImportBatch::default();
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Group> = HashMap::new();

    for (index, record) in csv_reader.records().enumerate() {
        let row = index + 1;
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                batch.errors.push(RowError::new(row, e.to_string()));
                continue;
            }
        };

        let Some(number) = layout.cell(&record, Column::InvoiceNumber) else {
            batch
                .errors
                .push(RowError::new(row, "invoice_number is required"));
            continue;
        };

        let group = groups.entry(number.to_string()).or_insert_with(|| {
            order.push(number.to_string());
            Group {
                first_row: row,
                invoice: None,
                failed: false,
            }
        });

        if group.invoice.is_none() && !group.failed {
            match parse_header(&layout, &record, number) {
                Ok(invoice) => group.invoice = Some(invoice),
                Err(message) => {
                    batch.errors.push(RowError::new(row, message));
                    group.failed = true;
                }
            }
        }

        match parse_item(&layout, &record) {
            Ok(item) => {
                if let Some(invoice) = group.invoice.as_mut() {
                    invoice.items.push(item);
                }
            }
            Err(message) => {
                batch.errors.push(RowError::new(row, message));
                group.failed = true;
            }
        }
    }

    for number in order {
        let Some(group) = groups.remove(&number) else {
            continue;
        };
        if group.failed {
            continue;
        }
        if let Some(invoice) = group.invoice {
            match InvoiceService::prepare(invoice) {
                Ok(draft) => batch.drafts.push(draft),
                Err(e) => batch
                    .errors
                    .push(RowError::new(group.first_row, format!("{number}: {e}"))),
            }
        }
    }

    batch.errors.sort_by_key(|e| e.row);
    Ok(batch)
}

fn parse_header(
    layout: &Layout,
    record: &csv::StringRecord,
    number: &str,
) -> Result<NewInvoice, String> {
    let text = |column: Column| layout.cell(record, column).map(str::to_string);

    Ok(NewInvoice {
        invoice_number: number.to_string(),
        vendor_name: text(Column::VendorName).unwrap_or_default(),
        vendor_tax_id: None,
        vendor_address: None,
        customer_name: text(Column::CustomerName).unwrap_or_default(),
        customer_tax_id: None,
        customer_address: None,
        currency: text(Column::Currency).unwrap_or_default(),
        issue_date: parse_date(layout.cell(record, Column::IssueDate), "issue_date")?
            .ok_or("issue_date is required")?,
        due_date: parse_date(layout.cell(record, Column::DueDate), "due_date")?,
        status: layout
            .cell(record, Column::Status)
            .map(InvoiceStatus::from_str)
            .transpose()?,
        tax_amount: parse_decimal(layout.cell(record, Column::TaxAmount), "tax_amount")?
            .unwrap_or(Decimal::ZERO),
        notes: None,
        items: Vec::new(),
    })
}

fn parse_item(layout: &Layout, record: &csv::StringRecord) -> Result<NewInvoiceItem, String> {
    let line_number = layout
        .cell(record, Column::LineNumber)
        .map(|v| {
            v.parse::<i32>()
                .map_err(|_| format!("line_number '{v}' is not a whole number"))
        })
        .transpose()?;
    let quantity = parse_decimal(layout.cell(record, Column::Quantity), "quantity")?
        .ok_or("quantity is required")?;
    let unit_price = parse_decimal(layout.cell(record, Column::UnitPrice), "unit_price")?
        .ok_or("unit_price is required")?;

    if let Some(amount) = parse_decimal(layout.cell(record, Column::Amount), "amount")? {
        let computed =
            InvoiceService::line_amount(quantity, unit_price).map_err(|e| e.to_string())?;
        if amount != computed {
            return Err(format!(
                "amount {amount} does not match quantity x unit_price ({computed})"
            ));
        }
    }

    Ok(NewInvoiceItem {
        line_number,
        description: layout
            .cell(record, Column::Description)
            .unwrap_or_default()
            .to_string(),
        quantity,
        unit_price,
    })
}

fn parse_date(value: Option<&str>, field: &str) -> Result<Option<NaiveDate>, String> {
    value
        .map(|v| {
            NaiveDate::parse_from_str(v, "%Y-%m-%d")
                .map_err(|_| format!("{field} '{v}' is not a YYYY-MM-DD date"))
        })
        .transpose()
}

fn parse_decimal(value: Option<&str>, field: &str) -> Result<Option<Decimal>, String> {
    value
        .map(|v| {
            Decimal::from_str(v).map_err(|_| format!("{field} '{v}' is not a decimal number"))
        })
        .transpose()
}
