//! CSV invoice export.

use std::io::Write;

use super::COLUMNS;
use super::error::SpreadsheetError;
use crate::invoice::InvoiceDraft;

/// Writes invoices as CSV, one row per line item, in the import layout.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn export_invoices<W: Write>(
    writer: W,
    invoices: &[InvoiceDraft],
) -> Result<(), SpreadsheetError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(COLUMNS.iter().map(|c| c.header()))?;

    for invoice in invoices {
        let issue_date = invoice.issue_date.format("%Y-%m-%d").to_string();
        let due_date = invoice
            .due_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        let tax_amount = format!("{:.2}", invoice.totals.tax_amount);

        for item in &invoice.items {
            csv_writer.write_record([
                invoice.invoice_number.as_str(),
                invoice.vendor_name.as_str(),
                invoice.customer_name.as_str(),
                invoice.currency.as_str(),
                issue_date.as_str(),
                due_date.as_str(),
                invoice.status.as_str(),
                tax_amount.as_str(),
                item.line_number.to_string().as_str(),
                item.description.as_str(),
                item.quantity.normalize().to_string().as_str(),
                item.unit_price.normalize().to_string().as_str(),
                format!("{:.2}", item.amount).as_str(),
            ])?;
        }
    }

    csv_writer.flush()?;
    Ok(())
}
