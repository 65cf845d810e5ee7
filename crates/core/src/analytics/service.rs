//! Analytics aggregation service.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};

use super::types::{
    AnalyticsSummary, CurrencyAmount, CurrencyTotals, InvoiceFact, MonthlyTotal, OverdueSummary,
    PartyTotal,
};
use crate::invoice::InvoiceStatus;

/// Number of vendors/customers reported per currency.
pub const TOP_PARTIES: usize = 5;

/// Service for aggregating invoice facts.
pub struct AnalyticsService;

#[derive(Default)]
struct Accumulator {
    count: u64,
    total: Decimal,
    tax: Decimal,
    outstanding: Decimal,
    paid: Decimal,
}

impl AnalyticsService {
    /// Summarizes invoices. Void invoices are counted but never summed.
    #[must_use]
    pub fn summarize(facts: &[InvoiceFact], as_of: NaiveDate) -> AnalyticsSummary {
        let mut status_counts: BTreeMap<InvoiceStatus, u64> =
            InvoiceStatus::ALL.into_iter().map(|s| (s, 0)).collect();
        let mut by_currency: BTreeMap<&str, Accumulator> = BTreeMap::new();
        let mut overdue_count = 0;
        let mut overdue_amounts: BTreeMap<&str, Decimal> = BTreeMap::new();
        let mut monthly: BTreeMap<(String, &str), (u64, Decimal)> = BTreeMap::new();
        let mut vendors: BTreeMap<(&str, &str), (u64, Decimal)> = BTreeMap::new();
        let mut customers: BTreeMap<(&str, &str), (u64, Decimal)> = BTreeMap::new();

        for fact in facts {
            *status_counts.entry(fact.status).or_default() += 1;
            if fact.status == InvoiceStatus::Void {
                continue;
            }

            let currency = fact.currency.as_str();
            let acc = by_currency.entry(currency).or_default();
            acc.count += 1;
            acc.total += fact.total_amount;
            acc.tax += fact.tax_amount;
            match fact.status {
                InvoiceStatus::Sent => acc.outstanding += fact.total_amount,
                InvoiceStatus::Paid => acc.paid += fact.total_amount,
                InvoiceStatus::Draft | InvoiceStatus::Void => {}
            }

            if Self::is_overdue(fact, as_of) {
                overdue_count += 1;
                *overdue_amounts.entry(currency).or_default() += fact.total_amount;
            }

            let month = fact.issue_date.format("%Y-%m").to_string();
            Self::bump(monthly.entry((month, currency)).or_default(), fact);
            Self::bump(
                vendors.entry((currency, fact.vendor_name.as_str())).or_default(),
                fact,
            );
            Self::bump(
                customers
                    .entry((currency, fact.customer_name.as_str()))
                    .or_default(),
                fact,
            );
        }

        let invoice_count = by_currency.values().map(|a| a.count).sum();
        let void_count = status_counts
            .get(&InvoiceStatus::Void)
            .copied()
            .unwrap_or_default();

        AnalyticsSummary {
            as_of,
            invoice_count,
            void_count,
            status_counts,
            currencies: by_currency
                .into_iter()
                .map(|(currency, acc)| CurrencyTotals {
                    currency: currency.to_string(),
                    invoice_count: acc.count,
                    total_amount: acc.total,
                    tax_amount: acc.tax,
                    average_amount: Self::average(acc.total, acc.count),
                    outstanding_amount: acc.outstanding,
                    paid_amount: acc.paid,
                })
                .collect(),
            overdue: OverdueSummary {
                count: overdue_count,
                amounts: overdue_amounts
                    .into_iter()
                    .map(|(currency, amount)| CurrencyAmount {
                        currency: currency.to_string(),
                        amount,
                    })
                    .collect(),
            },
            monthly: monthly
                .into_iter()
                .map(|((month, currency), (invoice_count, total_amount))| MonthlyTotal {
                    month,
                    currency: currency.to_string(),
                    invoice_count,
                    total_amount,
                })
                .collect(),
            top_vendors: Self::top_parties(vendors),
            top_customers: Self::top_parties(customers),
        }
    }

    /// Whether a sent invoice is past its due date.
    #[must_use]
    pub fn is_overdue(fact: &InvoiceFact, as_of: NaiveDate) -> bool {
        fact.status == InvoiceStatus::Sent && fact.due_date.is_some_and(|due| due < as_of)
    }

    /// Mean rounded to 2 dp, zero for an empty set.
    #[must_use]
    pub fn average(total: Decimal, count: u64) -> Decimal {
        if count == 0 {
            return Decimal::ZERO;
        }
        (total / Decimal::from(count)).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }

    fn bump(slot: &mut (u64, Decimal), fact: &InvoiceFact) {
        slot.0 += 1;
        slot.1 += fact.total_amount;
    }

    /// Keeps the largest parties per currency; ties go to the name that sorts first.
    fn top_parties(parties: BTreeMap<(&str, &str), (u64, Decimal)>) -> Vec<PartyTotal> {
        let mut grouped: BTreeMap<&str, Vec<PartyTotal>> = BTreeMap::new();
        for ((currency, name), (invoice_count, total_amount)) in parties {
            grouped.entry(currency).or_default().push(PartyTotal {
                name: name.to_string(),
                currency: currency.to_string(),
                invoice_count,
                total_amount,
            });
        }

        grouped
            .into_values()
            .flat_map(|mut list| {
                list.sort_by(|a, b| {
                    b.total_amount
                        .cmp(&a.total_amount)
                        .then_with(|| a.name.cmp(&b.name))
                });
                list.truncate(TOP_PARTIES);
                list
            })
            .collect()
    }
}
