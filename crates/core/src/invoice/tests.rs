//! Tests for invoice rules.

use chrono::NaiveDate;
use proptest::prelude::*;
use rstest::rstest;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::*;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn item(description: &str, quantity: Decimal, unit_price: Decimal) -> NewInvoiceItem {
    NewInvoiceItem {
        line_number: None,
        description: description.to_string(),
        quantity,
        unit_price,
    }
}

fn sample_invoice() -> NewInvoice {
    NewInvoice {
        invoice_number: " INV-001 ".to_string(),
        vendor_name: "Acme Supplies".to_string(),
        vendor_tax_id: Some("  ".to_string()),
        vendor_address: None,
        customer_name: "Globex".to_string(),
        customer_tax_id: None,
        customer_address: None,
        currency: "usd".to_string(),
        issue_date: date(2026, 3, 1),
        due_date: Some(date(2026, 3, 31)),
        status: None,
        tax_amount: dec!(10.00),
        notes: None,
        items: vec![
            item("Paper", dec!(3), dec!(4.995)),
            item("Toner", dec!(1), dec!(80)),
        ],
    }
}

#[test]
fn test_prepare_computes_amounts_and_normalizes() {
    let draft = InvoiceService::prepare(sample_invoice()).unwrap();

    assert_eq!(draft.invoice_number, "INV-001");
    assert_eq!(draft.currency, "USD");
    assert_eq!(draft.vendor_tax_id, None);
    assert_eq!(draft.status, InvoiceStatus::Draft);

    // 3 * 4.995 = 14.985 rounds half away from zero
    assert_eq!(draft.items[0].amount, dec!(14.99));
    assert_eq!(draft.items[0].line_number, 1);
    assert_eq!(draft.items[1].line_number, 2);
    assert_eq!(draft.totals.subtotal, dec!(94.99));
    assert_eq!(draft.totals.total_amount, dec!(104.99));
}

#[test]
fn test_explicit_line_numbers_sorted() {
    let mut invoice = sample_invoice();
    invoice.items[0].line_number = Some(20);
    invoice.items[1].line_number = Some(10);

    let draft = InvoiceService::prepare(invoice).unwrap();
    assert_eq!(draft.items[0].line_number, 10);
    assert_eq!(draft.items[0].description, "Toner");
}

#[test]
fn test_mixed_line_numbers_rejected() {
    let mut invoice = sample_invoice();
    invoice.items[0].line_number = Some(1);
    assert_eq!(
        InvoiceService::prepare(invoice),
        Err(InvoiceError::MixedLineNumbers)
    );
}

#[test]
fn test_duplicate_line_numbers_rejected() {
    let mut invoice = sample_invoice();
    invoice.items[0].line_number = Some(2);
    invoice.items[1].line_number = Some(2);
    assert_eq!(
        InvoiceService::prepare(invoice),
        Err(InvoiceError::DuplicateLineNumber(2))
    );
}

#[test]
fn test_due_before_issue_rejected() {
    let mut invoice = sample_invoice();
    invoice.due_date = Some(date(2026, 2, 1));
    assert!(matches!(
        InvoiceService::prepare(invoice),
        Err(InvoiceError::DueBeforeIssue { .. })
    ));
}

#[rstest]
#[case("US", false)]
#[case("US1", false)]
#[case("EURO", false)]
#[case("eur", true)]
#[case(" IDR ", true)]
fn test_currency_validation(#[case] code: &str, #[case] ok: bool) {
    let mut invoice = sample_invoice();
    invoice.currency = code.to_string();
    assert_eq!(InvoiceService::prepare(invoice).is_ok(), ok);
}

#[rstest]
#[case("", dec!(1), dec!(1), "description is required")]
#[case("Paper", dec!(0), dec!(1), "quantity must be greater than zero")]
#[case("Paper", dec!(1), dec!(-1), "unit price cannot be negative")]
fn test_invalid_items(
    #[case] description: &str,
    #[case] quantity: Decimal,
    #[case] unit_price: Decimal,
    #[case] reason: &str,
) {
    let mut invoice = sample_invoice();
    invoice.items[1] = item(description, quantity, unit_price);
    assert_eq!(
        InvoiceService::prepare(invoice),
        Err(InvoiceError::InvalidItem {
            position: 2,
            reason: reason.to_string()
        })
    );
}

#[rstest]
#[case(dec!(10000000000000000), dec!(10000000000000), "quantity")]
#[case(dec!(1), dec!(1000000000000000), "unit price")]
#[case(dec!(1000000), dec!(1000000000000), "line amount")]
#[case(dec!(9999999999999), dec!(9999999999999), "line amount")]
fn test_oversized_amounts_rejected(
    #[case] quantity: Decimal,
    #[case] unit_price: Decimal,
    #[case] what: &str,
) {
    let mut invoice = sample_invoice();
    invoice.items[0] = item("Bulk", quantity, unit_price);

    let err = InvoiceService::prepare(invoice).unwrap_err();
    assert_eq!(err.to_string(), format!("The {what} is too large"));
    assert_eq!(invora_shared::AppError::from(err).status_code(), 422);
}

#[test]
fn test_line_amount_overflow_is_an_error() {
    assert_eq!(
        InvoiceService::line_amount(dec!(10000000000000000), dec!(10000000000000)),
        Err(InvoiceError::AmountOverflow("line amount"))
    );
    assert_eq!(
        InvoiceService::line_amount(Decimal::MAX, dec!(2)),
        Err(InvoiceError::AmountOverflow("line amount"))
    );
}

#[test]
fn test_total_over_limit_rejected() {
    let mut invoice = sample_invoice();
    invoice.items = vec![
        item("A", dec!(1), dec!(600000000000000)),
        item("B", dec!(1), dec!(600000000000000)),
    ];
    assert_eq!(
        InvoiceService::prepare(invoice),
        Err(InvoiceError::AmountOverflow("subtotal"))
    );

    let mut invoice = sample_invoice();
    invoice.items = vec![item("A", dec!(1), dec!(999999999999999))];
    invoice.tax_amount = dec!(1);
    assert_eq!(
        InvoiceService::prepare(invoice),
        Err(InvoiceError::AmountOverflow("total amount"))
    );
}

#[test]
fn test_missing_fields_and_items() {
    let mut invoice = sample_invoice();
    invoice.vendor_name = "   ".to_string();
    assert_eq!(
        InvoiceService::prepare(invoice),
        Err(InvoiceError::MissingField("vendor_name"))
    );

    let mut invoice = sample_invoice();
    invoice.items.clear();
    assert_eq!(InvoiceService::prepare(invoice), Err(InvoiceError::NoItems));

    let mut invoice = sample_invoice();
    invoice.tax_amount = dec!(-0.01);
    assert_eq!(
        InvoiceService::prepare(invoice),
        Err(InvoiceError::NegativeTax)
    );
}

#[rstest]
#[case(InvoiceStatus::Draft, InvoiceStatus::Sent, true)]
#[case(InvoiceStatus::Draft, InvoiceStatus::Void, true)]
#[case(InvoiceStatus::Draft, InvoiceStatus::Paid, false)]
#[case(InvoiceStatus::Sent, InvoiceStatus::Paid, true)]
#[case(InvoiceStatus::Sent, InvoiceStatus::Draft, false)]
#[case(InvoiceStatus::Paid, InvoiceStatus::Void, false)]
#[case(InvoiceStatus::Void, InvoiceStatus::Draft, false)]
#[case(InvoiceStatus::Sent, InvoiceStatus::Sent, false)]
fn test_status_transitions(
    #[case] from: InvoiceStatus,
    #[case] to: InvoiceStatus,
    #[case] allowed: bool,
) {
    assert_eq!(InvoiceService::transition(from, to).is_ok(), allowed);
}

#[test]
fn test_status_parse_and_display() {
    for status in InvoiceStatus::ALL {
        assert_eq!(status.to_string().parse::<InvoiceStatus>(), Ok(status));
    }
    assert!("overdue".parse::<InvoiceStatus>().is_err());
}

proptest! {
    /// Totals always equal the sum of rounded lines plus tax.
    #[test]
    fn prop_total_is_subtotal_plus_tax(
        lines in prop::collection::vec((1i64..1_000i64, 0i64..1_000_000i64), 1..15),
        tax_cents in 0i64..100_000i64,
    ) {
        let mut invoice = sample_invoice();
        invoice.tax_amount = Decimal::new(tax_cents, 2);
        invoice.items = lines
            .iter()
            .map(|(q, p)| item("line", Decimal::from(*q), Decimal::new(*p, 3)))
            .collect();

        let draft = InvoiceService::prepare(invoice).unwrap();
        let expected: Decimal = draft.items.iter().map(|i| i.amount).sum();

        prop_assert_eq!(draft.totals.subtotal, expected);
        prop_assert_eq!(draft.totals.total_amount, expected + Decimal::new(tax_cents, 2));
        for line in &draft.items {
            prop_assert!(line.amount.scale() <= 2);
        }
    }
}
