//! Invoice validation and amount calculation.

use std::collections::HashSet;

use rust_decimal::{Decimal, RoundingStrategy};

use super::error::InvoiceError;
use super::types::{
    InvoiceDraft, InvoiceItemDraft, InvoiceStatus, InvoiceTotals, NewInvoice, NewInvoiceItem,
};

/// Decimal places kept on line amounts.
const AMOUNT_SCALE: u32 = 2;

/// Exclusive upper bound for stored quantities, prices and amounts.
/// Columns are `NUMERIC(19,4)`, leaving 15 integer digits.
pub const AMOUNT_LIMIT: i64 = 1_000_000_000_000_000;

/// Service for invoice rules.
pub struct InvoiceService;

impl InvoiceService {
    /// Validates a submitted invoice and computes its amounts.
    ///
    /// # Errors
    ///
    /// Returns the first rule the invoice violates.
    pub fn prepare(invoice: NewInvoice) -> Result<InvoiceDraft, InvoiceError> {
        let invoice_number = required(&invoice.invoice_number, "invoice_number")?;
        let vendor_name = required(&invoice.vendor_name, "vendor_name")?;
        let customer_name = required(&invoice.customer_name, "customer_name")?;
        let currency = normalize_currency(&invoice.currency)?;

        if let Some(due) = invoice.due_date {
            if due < invoice.issue_date {
                return Err(InvoiceError::DueBeforeIssue {
                    issue: invoice.issue_date,
                    due,
                });
            }
        }

        if invoice.tax_amount < Decimal::ZERO {
            return Err(InvoiceError::NegativeTax);
        }
        within_limit(invoice.tax_amount, "tax amount")?;

        let items = Self::prepare_items(&invoice.items)?;
        let totals = Self::totals(&items, invoice.tax_amount)?;

        Ok(InvoiceDraft {
            invoice_number,
            vendor_name,
            vendor_tax_id: optional(invoice.vendor_tax_id),
            vendor_address: optional(invoice.vendor_address),
            customer_name,
            customer_tax_id: optional(invoice.customer_tax_id),
            customer_address: optional(invoice.customer_address),
            currency,
            issue_date: invoice.issue_date,
            due_date: invoice.due_date,
            status: invoice.status.unwrap_or_default(),
            notes: optional(invoice.notes),
            totals,
            items,
        })
    }

    /// Computes the rounded amount of one line.
    ///
    /// # Errors
    ///
    /// Returns `AmountOverflow` when the product does not fit a stored amount.
    pub fn line_amount(quantity: Decimal, unit_price: Decimal) -> Result<Decimal, InvoiceError> {
        let amount = quantity
            .checked_mul(unit_price)
            .ok_or(InvoiceError::AmountOverflow("line amount"))?
            .round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::MidpointAwayFromZero);
        within_limit(amount, "line amount")
    }

    /// Sums line amounts and adds tax.
    ///
    /// # Errors
    ///
    /// Returns `AmountOverflow` when a sum does not fit a stored amount.
    pub fn totals(
        items: &[InvoiceItemDraft],
        tax_amount: Decimal,
    ) -> Result<InvoiceTotals, InvoiceError> {
        let subtotal = items.iter().try_fold(Decimal::ZERO, |acc, item| {
            acc.checked_add(item.amount)
                .ok_or(InvoiceError::AmountOverflow("subtotal"))
                .and_then(|sum| within_limit(sum, "subtotal"))
        })?;
        let total_amount = subtotal
            .checked_add(tax_amount)
            .ok_or(InvoiceError::AmountOverflow("total amount"))?;

        Ok(InvoiceTotals {
            subtotal,
            tax_amount,
            total_amount: within_limit(total_amount, "total amount")?,
        })
    }

    /// Checks a status change.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStatusTransition` when the lifecycle forbids the move.
    pub fn transition(
        current: InvoiceStatus,
        next: InvoiceStatus,
    ) -> Result<InvoiceStatus, InvoiceError> {
        if current.can_transition_to(next) {
            Ok(next)
        } else {
            Err(InvoiceError::InvalidStatusTransition {
                from: current,
                to: next,
            })
        }
    }

    fn prepare_items(items: &[NewInvoiceItem]) -> Result<Vec<InvoiceItemDraft>, InvoiceError> {
        if items.is_empty() {
            return Err(InvoiceError::NoItems);
        }

        let numbered = items.iter().filter(|i| i.line_number.is_some()).count();
        if numbered != 0 && numbered != items.len() {
            return Err(InvoiceError::MixedLineNumbers);
        }

        let mut seen = HashSet::with_capacity(items.len());
        let mut drafts = Vec::with_capacity(items.len());

        for (index, item) in items.iter().enumerate() {
            let position = index + 1;
            let invalid = |reason: &str| InvoiceError::InvalidItem {
                position,
                reason: reason.to_string(),
            };

            let description = item.description.trim();
            if description.is_empty() {
                return Err(invalid("description is required"));
            }
            if item.quantity <= Decimal::ZERO {
                return Err(invalid("quantity must be greater than zero"));
            }
            if item.unit_price < Decimal::ZERO {
                return Err(invalid("unit price cannot be negative"));
            }
            within_limit(item.quantity, "quantity")?;
            within_limit(item.unit_price, "unit price")?;

            let line_number = match item.line_number {
                Some(n) if n <= 0 => return Err(invalid("line number must be positive")),
                Some(n) => n,
                None => i32::try_from(position).map_err(|_| invalid("too many line items"))?,
            };
            if !seen.insert(line_number) {
                return Err(InvoiceError::DuplicateLineNumber(line_number));
            }

            drafts.push(InvoiceItemDraft {
                line_number,
                description: description.to_string(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                amount: Self::line_amount(item.quantity, item.unit_price)?,
            });
        }

        drafts.sort_by_key(|d| d.line_number);
        Ok(drafts)
    }
}

fn within_limit(value: Decimal, what: &'static str) -> Result<Decimal, InvoiceError> {
    if value.abs() < Decimal::from(AMOUNT_LIMIT) {
        Ok(value)
    } else {
        Err(InvoiceError::AmountOverflow(what))
    }
}

fn required(value: &str, field: &'static str) -> Result<String, InvoiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(InvoiceError::MissingField(field))
    } else {
        Ok(trimmed.to_string())
    }
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn normalize_currency(code: &str) -> Result<String, InvoiceError> {
    let trimmed = code.trim();
    if trimmed.len() == 3 && trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(trimmed.to_ascii_uppercase())
    } else {
        Err(InvoiceError::InvalidCurrency(code.to_string()))
    }
}
