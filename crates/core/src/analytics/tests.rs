//! Tests for analytics aggregation.

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::service::AnalyticsService;
use super::types::InvoiceFact;
use crate::invoice::InvoiceStatus;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn fact(
    number: &str,
    vendor: &str,
    currency: &str,
    issued: NaiveDate,
    due: Option<NaiveDate>,
    status: InvoiceStatus,
    total: Decimal,
) -> InvoiceFact {
    InvoiceFact {
        invoice_number: number.to_string(),
        vendor_name: vendor.to_string(),
        customer_name: "Globex".to_string(),
        currency: currency.to_string(),
        issue_date: issued,
        due_date: due,
        status,
        total_amount: total,
        tax_amount: total / dec!(10),
    }
}

fn sample() -> Vec<InvoiceFact> {
    vec![
        fact("1", "Acme", "USD", date(2026, 1, 5), Some(date(2026, 2, 1)), InvoiceStatus::Sent, dec!(100)),
        fact("2", "Acme", "USD", date(2026, 1, 20), None, InvoiceStatus::Paid, dec!(50)),
        fact("3", "Initech", "USD", date(2026, 2, 3), Some(date(2026, 4, 1)), InvoiceStatus::Sent, dec!(25)),
        fact("4", "Initech", "EUR", date(2026, 2, 10), None, InvoiceStatus::Draft, dec!(80)),
        fact("5", "Hooli", "USD", date(2026, 2, 11), None, InvoiceStatus::Void, dec!(1000)),
    ]
}

#[test]
fn test_void_invoices_are_counted_but_not_summed() {
    let summary = AnalyticsService::summarize(&sample(), date(2026, 3, 1));

    assert_eq!(summary.invoice_count, 4);
    assert_eq!(summary.void_count, 1);
    assert!(summary.top_vendors.iter().all(|v| v.name != "Hooli"));

    let usd = summary.currencies.iter().find(|c| c.currency == "USD").unwrap();
    assert_eq!(usd.invoice_count, 3);
    assert_eq!(usd.total_amount, dec!(175));
    assert_eq!(usd.tax_amount, dec!(17.5));
    assert_eq!(usd.average_amount, dec!(58.33));
    assert_eq!(usd.outstanding_amount, dec!(125));
    assert_eq!(usd.paid_amount, dec!(50));
}

#[test]
fn test_status_counts_are_zero_filled() {
    let summary = AnalyticsService::summarize(&[], date(2026, 3, 1));

    assert_eq!(summary.status_counts.len(), 4);
    assert!(summary.status_counts.values().all(|&c| c == 0));
    assert!(summary.currencies.is_empty());
    assert_eq!(summary.overdue.count, 0);
}

#[test]
fn test_overdue_only_counts_sent_invoices_past_due() {
    let summary = AnalyticsService::summarize(&sample(), date(2026, 3, 1));

    assert_eq!(summary.overdue.count, 1);
    assert_eq!(summary.overdue.amounts.len(), 1);
    assert_eq!(summary.overdue.amounts[0].currency, "USD");
    assert_eq!(summary.overdue.amounts[0].amount, dec!(100));

    // due today is not overdue yet
    let on_due = AnalyticsService::summarize(&sample(), date(2026, 2, 1));
    assert_eq!(on_due.overdue.count, 0);
}

#[test]
fn test_monthly_trend_is_ordered_by_month_then_currency() {
    let summary = AnalyticsService::summarize(&sample(), date(2026, 3, 1));
    let keys: Vec<(&str, &str, u64)> = summary
        .monthly
        .iter()
        .map(|m| (m.month.as_str(), m.currency.as_str(), m.invoice_count))
        .collect();

    assert_eq!(
        keys,
        vec![("2026-01", "USD", 2), ("2026-02", "EUR", 1), ("2026-02", "USD", 1)]
    );
    assert_eq!(summary.monthly[0].total_amount, dec!(150));
}

#[test]
fn test_top_vendors_limited_and_tie_broken_by_name() {
    let facts: Vec<InvoiceFact> = ["Zeta", "Alpha", "Mid", "Beta", "Gamma", "Delta"]
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let total = if i < 2 { dec!(500) } else { dec!(100) };
            fact(&i.to_string(), name, "USD", date(2026, 1, 1), None, InvoiceStatus::Paid, total)
        })
        .collect();

    let summary = AnalyticsService::summarize(&facts, date(2026, 3, 1));
    let names: Vec<&str> = summary.top_vendors.iter().map(|v| v.name.as_str()).collect();

    assert_eq!(names, vec!["Alpha", "Zeta", "Beta", "Delta", "Gamma"]);
    assert_eq!(summary.top_customers.len(), 1);
    assert_eq!(summary.top_customers[0].invoice_count, 6);
}

#[test]
fn test_summary_serializes_status_keys_and_decimal_strings() {
    let summary = AnalyticsService::summarize(&sample(), date(2026, 3, 1));
    let json = serde_json::to_value(&summary).unwrap();

    assert_eq!(json["status_counts"]["sent"], 2);
    assert_eq!(json["status_counts"]["void"], 1);
    assert_eq!(json["currencies"][0]["currency"], "EUR");
    assert_eq!(json["currencies"][0]["total_amount"], "80");
}

proptest! {
    #[test]
    fn test_currency_totals_add_up(
        amounts in proptest::collection::vec((0i64..1_000_000, 0usize..4), 0..40),
    ) {
        let facts: Vec<InvoiceFact> = amounts
            .iter()
            .enumerate()
            .map(|(i, (cents, s))| {
                fact(
                    &i.to_string(),
                    "Acme",
                    "USD",
                    date(2026, 1, 1),
                    None,
                    InvoiceStatus::ALL[*s],
                    Decimal::new(*cents, 2),
                )
            })
            .collect();

        let summary = AnalyticsService::summarize(&facts, date(2026, 3, 1));
        let counted: u64 = summary.status_counts.values().sum();
        prop_assert_eq!(counted, facts.len() as u64);
        prop_assert_eq!(summary.invoice_count + summary.void_count, facts.len() as u64);

        let expected: Decimal = facts
            .iter()
            .filter(|f| f.status != InvoiceStatus::Void)
            .map(|f| f.total_amount)
            .sum();
        let reported: Decimal = summary.currencies.iter().map(|c| c.total_amount).sum();
        prop_assert_eq!(reported, expected);

        for c in &summary.currencies {
            prop_assert!(c.outstanding_amount + c.paid_amount <= c.total_amount);
        }
    }
}
