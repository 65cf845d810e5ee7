//! Analytics data types.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::invoice::InvoiceStatus;

/// One invoice, reduced to the fields analytics needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceFact {
    /// Invoice number.
    pub invoice_number: String,
    /// Vendor name.
    pub vendor_name: String,
    /// Customer name.
    pub customer_name: String,
    /// ISO currency code.
    pub currency: String,
    /// Issue date.
    pub issue_date: NaiveDate,
    /// Due date.
    pub due_date: Option<NaiveDate>,
    /// Status.
    pub status: InvoiceStatus,
    /// Total including tax.
    pub total_amount: Decimal,
    /// Tax portion.
    pub tax_amount: Decimal,
}

/// Totals for one currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyTotals {
    /// ISO currency code.
    pub currency: String,
    /// Non-void invoices.
    pub invoice_count: u64,
    /// Sum of totals.
    pub total_amount: Decimal,
    /// Sum of tax.
    pub tax_amount: Decimal,
    /// Mean total, 2 dp.
    pub average_amount: Decimal,
    /// Sum of totals still awaiting payment.
    pub outstanding_amount: Decimal,
    /// Sum of settled totals.
    pub paid_amount: Decimal,
}

/// An amount in one currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyAmount {
    /// ISO currency code.
    pub currency: String,
    /// Amount.
    pub amount: Decimal,
}

/// Sent invoices past their due date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverdueSummary {
    /// Number of overdue invoices.
    pub count: u64,
    /// Overdue totals per currency.
    pub amounts: Vec<CurrencyAmount>,
}

/// Invoices issued in one month, per currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyTotal {
    /// `YYYY-MM`.
    pub month: String,
    /// ISO currency code.
    pub currency: String,
    /// Number of invoices.
    pub invoice_count: u64,
    /// Sum of totals.
    pub total_amount: Decimal,
}

/// Aggregate for one vendor or customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyTotal {
    /// Vendor or customer name.
    pub name: String,
    /// ISO currency code.
    pub currency: String,
    /// Number of invoices.
    pub invoice_count: u64,
    /// Sum of totals.
    pub total_amount: Decimal,
}

/// Analytics over a tenant's invoices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    /// Reference date for overdue calculation.
    pub as_of: NaiveDate,
    /// Non-void invoices.
    pub invoice_count: u64,
    /// Void invoices, excluded from every amount.
    pub void_count: u64,
    /// Count per status, every status present.
    pub status_counts: BTreeMap<InvoiceStatus, u64>,
    /// Totals per currency, ordered by currency code.
    pub currencies: Vec<CurrencyTotals>,
    /// Overdue exposure.
    pub overdue: OverdueSummary,
    /// Monthly trend, ascending by month then currency.
    pub monthly: Vec<MonthlyTotal>,
    /// Largest vendors by total, per currency.
    pub top_vendors: Vec<PartyTotal>,
    /// Largest customers by total, per currency.
    pub top_customers: Vec<PartyTotal>,
}
