//! Invoice routes.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use chrono::{DateTime, FixedOffset, NaiveDate};
use invora_core::invoice::{InvoiceService, InvoiceStatus, NewInvoice};
use invora_core::spreadsheet::{export_invoices, import_invoices};
use invora_db::entities::{invoice_items, invoices};
use invora_db::{DateRange, InvoiceFilter, InvoiceRepository, InvoiceWithItems};
use invora_shared::types::{InvoiceId, PageRequest, PageResponse};
use invora_shared::{AppError, Role};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::{
    AppState,
    error::{ApiError, ApiResult},
    middleware::TenantContext,
};

/// Creates the invoice routes (requires auth and tenant middleware to be applied externally).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/invoices", get(list_invoices).post(create_invoice))
        .route("/invoices/import", post(import_invoices_csv))
        .route("/invoices/export", get(export_invoices_csv))
        .route("/invoices/{id}", get(get_invoice).delete(delete_invoice))
        .route("/invoices/{id}/status", patch(update_status))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for listing invoices.
#[derive(Debug, Deserialize)]
pub struct ListInvoicesQuery {
    /// Page number (1-based).
    pub page: Option<u32>,
    /// Page size.
    pub per_page: Option<u32>,
    /// Exact status.
    pub status: Option<InvoiceStatus>,
    /// Vendor name substring.
    pub vendor: Option<String>,
    /// First issue date.
    pub from: Option<NaiveDate>,
    /// Last issue date.
    pub to: Option<NaiveDate>,
}

/// Optional issue-date range.
#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    /// First issue date.
    pub from: Option<NaiveDate>,
    /// Last issue date.
    pub to: Option<NaiveDate>,
}

impl RangeQuery {
    pub(crate) fn range(&self) -> Result<DateRange, ApiError> {
        date_range(self.from, self.to)
    }
}

fn date_range(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<DateRange, ApiError> {
    if let (Some(from), Some(to)) = (from, to) {
        if from > to {
            return Err(ApiError(AppError::Validation(
                "'from' must not be after 'to'".into(),
            )));
        }
    }
    Ok(DateRange { from, to })
}

/// Status change request.
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    /// Target status.
    pub status: InvoiceStatus,
}

/// Invoice line item in responses.
#[derive(Debug, Serialize)]
pub struct InvoiceItemResponse {
    /// Item ID.
    pub id: Uuid,
    /// Line number.
    pub line_number: i32,
    /// Description.
    pub description: String,
    /// Quantity.
    pub quantity: Decimal,
    /// Unit price.
    pub unit_price: Decimal,
    /// Line amount.
    pub amount: Decimal,
}

impl From<invoice_items::Model> for InvoiceItemResponse {
    fn from(item: invoice_items::Model) -> Self {
        Self {
            id: item.id,
            line_number: item.line_number,
            description: item.description,
            quantity: item.quantity.normalize(),
            unit_price: item.unit_price.normalize(),
            amount: item.amount.round_dp(2),
        }
    }
}

/// Invoice in responses. Items are included on single-invoice responses.
#[derive(Debug, Serialize)]
pub struct InvoiceResponse {
    /// Invoice ID.
    pub id: Uuid,
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
    /// Currency code.
    pub currency: String,
    /// Issue date.
    pub issue_date: NaiveDate,
    /// Due date.
    pub due_date: Option<NaiveDate>,
    /// Status.
    pub status: InvoiceStatus,
    /// Sum of line amounts.
    pub subtotal: Decimal,
    /// Tax amount.
    pub tax_amount: Decimal,
    /// Total amount.
    pub total_amount: Decimal,
    /// Notes.
    pub notes: Option<String>,
    /// Creation time.
    pub created_at: DateTime<FixedOffset>,
    /// Last update time.
    pub updated_at: DateTime<FixedOffset>,
    /// Line items.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<InvoiceItemResponse>>,
}

impl From<invoices::Model> for InvoiceResponse {
    fn from(invoice: invoices::Model) -> Self {
        Self {
            id: invoice.id,
            invoice_number: invoice.invoice_number,
            vendor_name: invoice.vendor_name,
            vendor_tax_id: invoice.vendor_tax_id,
            vendor_address: invoice.vendor_address,
            customer_name: invoice.customer_name,
            customer_tax_id: invoice.customer_tax_id,
            customer_address: invoice.customer_address,
            currency: invoice.currency,
            issue_date: invoice.issue_date,
            due_date: invoice.due_date,
            status: invoice.status.into(),
            subtotal: invoice.subtotal.round_dp(2),
            tax_amount: invoice.tax_amount.round_dp(2),
            total_amount: invoice.total_amount.round_dp(2),
            notes: invoice.notes,
            created_at: invoice.created_at,
            updated_at: invoice.updated_at,
            items: None,
        }
    }
}

impl From<InvoiceWithItems> for InvoiceResponse {
    fn from(value: InvoiceWithItems) -> Self {
        let items = value.items.into_iter().map(Into::into).collect();
        Self {
            items: Some(items),
            ..Self::from(value.invoice)
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /invoices - Paginated, filtered invoice list.
async fn list_invoices(
    State(state): State<AppState>,
    ctx: TenantContext,
    Query(query): Query<ListInvoicesQuery>,
) -> ApiResult<Json<PageResponse<InvoiceResponse>>> {
    ctx.require(Role::User)?;

    let defaults = PageRequest::default();
    let page = PageRequest {
        page: query.page.unwrap_or(defaults.page),
        per_page: query.per_page.unwrap_or(defaults.per_page),
    };
    let filter = InvoiceFilter {
        status: query.status,
        vendor: query.vendor,
        issued: date_range(query.from, query.to)?,
    };

    let page = InvoiceRepository::new((*state.db).clone())
        .list(ctx.tenant_id, &filter, &page)
        .await?;
    Ok(Json(page.map(InvoiceResponse::from)))
}

/// POST /invoices - Validate and store an invoice.
async fn create_invoice(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(payload): Json<NewInvoice>,
) -> ApiResult<(StatusCode, Json<InvoiceResponse>)> {
    ctx.require(Role::User)?;

    let draft = InvoiceService::prepare(payload)?;
    let created = InvoiceRepository::new((*state.db).clone())
        .create(ctx.tenant_id, &draft)
        .await?;

    Ok((StatusCode::CREATED, Json(created.into())))
}

/// GET `/invoices/{id}` - Invoice with its items.
async fn get_invoice(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<InvoiceResponse>> {
    ctx.require(Role::User)?;

    let invoice = InvoiceRepository::new((*state.db).clone())
        .find_with_items(ctx.tenant_id, InvoiceId::from_uuid(id))
        .await?
        .ok_or_else(|| ApiError(AppError::NotFound(format!("Invoice {id}"))))?;
    Ok(Json(invoice.into()))
}

/// PATCH `/invoices/{id}/status` - Lifecycle transition.
async fn update_status(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> ApiResult<Json<InvoiceResponse>> {
    ctx.require(Role::User)?;

    let updated = InvoiceRepository::new((*state.db).clone())
        .update_status(ctx.tenant_id, InvoiceId::from_uuid(id), payload.status)
        .await?;
    Ok(Json(updated.into()))
}

/// DELETE `/invoices/{id}` - Remove an invoice and its items.
async fn delete_invoice(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    ctx.require(Role::Admin)?;

    InvoiceRepository::new((*state.db).clone())
        .delete(ctx.tenant_id, InvoiceId::from_uuid(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /invoices/import - CSV upload, stored all-or-nothing.
async fn import_invoices_csv(
    State(state): State<AppState>,
    ctx: TenantContext,
    body: Bytes,
) -> ApiResult<Response> {
    ctx.require(Role::Admin)?;

    let batch = import_invoices(body.as_ref())?;
    if !batch.is_clean() {
        tracing::info!(
            tenant_id = %ctx.tenant_id,
            errors = batch.errors.len(),
            "Import rejected"
        );
        return Ok((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "error": "IMPORT_REJECTED",
                "message": "The spreadsheet contains invalid rows",
                "errors": batch.errors
            })),
        )
            .into_response());
    }
    if batch.drafts.is_empty() {
        return Err(ApiError(AppError::Validation(
            "The spreadsheet contains no invoices".into(),
        )));
    }

    let created = InvoiceRepository::new((*state.db).clone())
        .create_many(ctx.tenant_id, &batch.drafts)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "created": created.len() })),
    )
        .into_response())
}

/// GET /invoices/export - CSV download.
async fn export_invoices_csv(
    State(state): State<AppState>,
    ctx: TenantContext,
    Query(query): Query<RangeQuery>,
) -> ApiResult<Response> {
    ctx.require(Role::User)?;

    let drafts = InvoiceRepository::new((*state.db).clone())
        .export_rows(ctx.tenant_id, query.range()?)
        .await?;

    let mut csv = Vec::new();
    export_invoices(&mut csv, &drafts)?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"invoices.csv\"",
            ),
        ],
        csv,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_range_rejects_inverted_bounds() {
        let jan = NaiveDate::from_ymd_opt(2026, 1, 1);
        let feb = NaiveDate::from_ymd_opt(2026, 2, 1);
        assert!(date_range(jan, feb).is_ok());
        assert!(date_range(feb, jan).is_err());
        assert_eq!(date_range(None, jan).unwrap().to, jan);
    }
}
