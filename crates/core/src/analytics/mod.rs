//! Invoice analytics.
//!
//! Pure aggregation over invoice facts loaded by the database layer:
//! per-currency totals, status counts, overdue exposure, monthly trend and
//! top counterparties.

pub mod service;
pub mod types;

#[cfg(test)]
mod tests;

pub use service::AnalyticsService;
pub use types::*;
