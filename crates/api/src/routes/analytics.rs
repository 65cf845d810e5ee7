//! Analytics routes.

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use chrono::{NaiveDate, Utc};
use invora_core::analytics::{AnalyticsService, AnalyticsSummary};
use invora_db::AnalyticsRepository;
use invora_shared::Role;
use serde::Deserialize;

use super::invoices::RangeQuery;
use crate::{AppState, error::ApiResult, middleware::TenantContext};

/// Creates the analytics routes (requires auth and tenant middleware to be applied externally).
pub fn routes() -> Router<AppState> {
    Router::new().route("/analytics/summary", get(summary))
}

/// Query parameters for the summary.
#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    /// First issue date.
    pub from: Option<NaiveDate>,
    /// Last issue date.
    pub to: Option<NaiveDate>,
    /// Reference date for overdue checks; today when omitted.
    pub as_of: Option<NaiveDate>,
}

/// GET /analytics/summary - Aggregates over the tenant's invoices.
async fn summary(
    State(state): State<AppState>,
    ctx: TenantContext,
    Query(query): Query<SummaryQuery>,
) -> ApiResult<Json<AnalyticsSummary>> {
    ctx.require(Role::User)?;

    let range = RangeQuery {
        from: query.from,
        to: query.to,
    }
    .range()?;
    let facts = AnalyticsRepository::new((*state.db).clone())
        .facts(ctx.tenant_id, range)
        .await?;

    let as_of = query.as_of.unwrap_or_else(|| Utc::now().date_naive());
    Ok(Json(AnalyticsService::summarize(&facts, as_of)))
}
