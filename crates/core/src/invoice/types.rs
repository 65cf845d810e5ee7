//! Invoice domain types.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Lifecycle status of an invoice.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    /// Being prepared, not yet sent.
    #[default]
    Draft,
    /// Sent to the customer, awaiting payment.
    Sent,
    /// Settled.
    Paid,
    /// Cancelled.
    Void,
}

impl InvoiceStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [Self; 4] = [Self::Draft, Self::Sent, Self::Paid, Self::Void];

    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Paid => "paid",
            Self::Void => "void",
        }
    }

    /// Returns true if an invoice may move from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Draft, Self::Sent | Self::Void) | (Self::Sent, Self::Paid | Self::Void)
        )
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InvoiceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "sent" => Ok(Self::Sent),
            "paid" => Ok(Self::Paid),
            "void" => Ok(Self::Void),
            other => Err(format!("Unknown invoice status: {other}")),
        }
    }
}

/// Line item as submitted by a client or import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewInvoiceItem {
    /// Explicit line number. Assigned in order when omitted on every item.
    #[serde(default)]
    pub line_number: Option<i32>,
    /// Description.
    pub description: String,
    /// Quantity.
    pub quantity: Decimal,
    /// Price per unit.
    pub unit_price: Decimal,
}

/// Invoice as submitted by a client or import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewInvoice {
    /// Invoice number, unique per tenant.
    pub invoice_number: String,
    /// Vendor name.
    pub vendor_name: String,
    /// Vendor tax identifier.
    #[serde(default)]
    pub vendor_tax_id: Option<String>,
    /// Vendor address.
    #[serde(default)]
    pub vendor_address: Option<String>,
    /// Customer name.
    pub customer_name: String,
    /// Customer tax identifier.
    #[serde(default)]
    pub customer_tax_id: Option<String>,
    /// Customer address.
    #[serde(default)]
    pub customer_address: Option<String>,
    /// ISO 4217 currency code.
    pub currency: String,
    /// Issue date.
    pub issue_date: NaiveDate,
    /// Payment due date.
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    /// Initial status (draft when omitted).
    #[serde(default)]
    pub status: Option<InvoiceStatus>,
    /// Tax amount.
    #[serde(default)]
    pub tax_amount: Decimal,
    /// Free-form notes.
    #[serde(default)]
    pub notes: Option<String>,
    /// Line items.
    pub items: Vec<NewInvoiceItem>,
}

/// Validated line item with its computed amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceItemDraft {
    /// Line number (1-based, unique within the invoice).
    pub line_number: i32,
    /// Description.
    pub description: String,
    /// Quantity.
    pub quantity: Decimal,
    /// Price per unit.
    pub unit_price: Decimal,
    /// `quantity * unit_price`, rounded to cents.
    pub amount: Decimal,
}

/// Monetary totals of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceTotals {
    /// Sum of line amounts.
    pub subtotal: Decimal,
    /// Tax amount.
    pub tax_amount: Decimal,
    /// `subtotal + tax_amount`.
    pub total_amount: Decimal,
}

/// Invoice that passed validation and is ready to persist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceDraft {
    /// Invoice number.
    pub invoice_number: String,
    /// Vendor name.
    pub vendor_name: String,
    /// Vendor tax identifier.
    pub vendor_tax_id: Option<String>,
    /// Vendor address.
    pub vendor_address: Option<String>,
    /// Customer name.
    pub customer_name: String,
    /// Customer tax identifier.
    pub customer_tax_id: Option<String>,
    /// Customer address.
    pub customer_address: Option<String>,
    /// Upper-case currency code.
    pub currency: String,
    /// Issue date.
    pub issue_date: NaiveDate,
    /// Due date.
    pub due_date: Option<NaiveDate>,
    /// Status.
    pub status: InvoiceStatus,
    /// Notes.
    pub notes: Option<String>,
    /// Computed totals.
    pub totals: InvoiceTotals,
    /// Line items ordered by line number.
    pub items: Vec<InvoiceItemDraft>,
}
