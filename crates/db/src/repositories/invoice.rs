//! Invoice repository.
//!
//! Every operation runs inside a tenant-scoped RLS transaction, so rows of
//! other tenants are invisible even if a filter were missing.

use chrono::NaiveDate;
use invora_core::invoice::{
    InvoiceDraft, InvoiceError, InvoiceItemDraft, InvoiceService, InvoiceStatus, InvoiceTotals,
};
use invora_shared::AppError;
use invora_shared::types::{InvoiceId, InvoiceItemId, PageRequest, PageResponse, TenantId};
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, LoaderTrait, ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    Set, SqlErr,
};

use crate::entities::{invoice_items, invoices, sea_orm_active_enums::InvoiceStatus as DbStatus};
use crate::rls::RlsExt;

/// Error types for invoice persistence.
#[derive(Debug, thiserror::Error)]
pub enum InvoiceRepoError {
    /// No invoice with this ID is visible to the tenant.
    #[error("Invoice not found: {0}")]
    NotFound(InvoiceId),

    /// Invoice number already used by the tenant.
    #[error("Invoice number '{0}' already exists")]
    DuplicateNumber(String),

    /// Invoice rule violation.
    #[error(transparent)]
    Rule(#[from] InvoiceError),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl From<InvoiceRepoError> for AppError {
    fn from(err: InvoiceRepoError) -> Self {
        match err {
            InvoiceRepoError::NotFound(_) => Self::NotFound(err.to_string()),
            InvoiceRepoError::DuplicateNumber(_) => Self::Conflict(err.to_string()),
            InvoiceRepoError::Rule(rule) => rule.into(),
            InvoiceRepoError::Database(db) => Self::Database(db.to_string()),
        }
    }
}

/// Inclusive issue-date range. Open on either side when unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    /// First issue date included.
    pub from: Option<NaiveDate>,
    /// Last issue date included.
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub(crate) fn condition(self) -> Condition {
        Condition::all()
            .add_option(self.from.map(|d| invoices::Column::IssueDate.gte(d)))
            .add_option(self.to.map(|d| invoices::Column::IssueDate.lte(d)))
    }
}

/// Filters for listing invoices.
#[derive(Debug, Clone, Default)]
pub struct InvoiceFilter {
    /// Exact status.
    pub status: Option<InvoiceStatus>,
    /// Case-insensitive substring of the vendor name.
    pub vendor: Option<String>,
    /// Issue-date range.
    pub issued: DateRange,
}

impl InvoiceFilter {
    fn condition(&self) -> Condition {
        let vendor = self
            .vendor
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| {
                Expr::expr(Func::lower(Expr::col(invoices::Column::VendorName)))
                    .like(contains_pattern(v))
            });

        self.issued
            .condition()
            .add_option(self.status.map(|s| invoices::Column::Status.eq(DbStatus::from(s))))
            .add_option(vendor)
    }
}

/// `LIKE` pattern matching `needle` anywhere, lower-cased with wildcards escaped.
fn contains_pattern(needle: &str) -> String {
    let escaped = needle
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// Invoice header with its line items.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceWithItems {
    /// Invoice record.
    pub invoice: invoices::Model,
    /// Items ordered by line number.
    pub items: Vec<invoice_items::Model>,
}

impl InvoiceWithItems {
    /// Converts the stored invoice back into its domain form.
    #[must_use]
    pub fn into_draft(self) -> InvoiceDraft {
        let invoice = self.invoice;
        InvoiceDraft {
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
            notes: invoice.notes,
            totals: InvoiceTotals {
                subtotal: invoice.subtotal.normalize(),
                tax_amount: invoice.tax_amount.normalize(),
                total_amount: invoice.total_amount.normalize(),
            },
            items: self
                .items
                .into_iter()
                .map(|item| InvoiceItemDraft {
                    line_number: item.line_number,
                    description: item.description,
                    quantity: item.quantity.normalize(),
                    unit_price: item.unit_price.normalize(),
                    amount: item.amount.normalize(),
                })
                .collect(),
        }
    }
}

/// Invoice repository for tenant-scoped CRUD.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    db: DatabaseConnection,
}

impl InvoiceRepository {
    /// Creates a new invoice repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Lists invoices, newest issue date first, then by invoice number.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(
        &self,
        tenant_id: TenantId,
        filter: &InvoiceFilter,
        page: &PageRequest,
    ) -> Result<PageResponse<invoices::Model>, DbErr> {
        let page = page.normalized();
        let rls = self.db.with_rls(tenant_id).await?;

        let query = invoices::Entity::find().filter(filter.condition());
        let total = query.clone().count(rls.transaction()).await?;
        let rows = query
            .order_by_desc(invoices::Column::IssueDate)
            .order_by_asc(invoices::Column::InvoiceNumber)
            .offset(page.offset())
            .limit(page.limit())
            .all(rls.transaction())
            .await?;

        rls.commit().await?;
        Ok(PageResponse::new(rows, page.page, page.per_page, total))
    }

    /// Finds an invoice with its items.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_with_items(
        &self,
        tenant_id: TenantId,
        id: InvoiceId,
    ) -> Result<Option<InvoiceWithItems>, DbErr> {
        let rls = self.db.with_rls(tenant_id).await?;
        let txn = rls.transaction();

        let Some(invoice) = invoices::Entity::find_by_id(id.into_inner()).one(txn).await? else {
            rls.commit().await?;
            return Ok(None);
        };
        let items = invoice
            .find_related(invoice_items::Entity)
            .order_by_asc(invoice_items::Column::LineNumber)
            .all(txn)
            .await?;

        rls.commit().await?;
        Ok(Some(InvoiceWithItems { invoice, items }))
    }

    /// Stores a validated invoice.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateNumber` if the tenant already has this invoice number.
    pub async fn create(
        &self,
        tenant_id: TenantId,
        draft: &InvoiceDraft,
    ) -> Result<InvoiceWithItems, InvoiceRepoError> {
        let rls = self.db.with_rls(tenant_id).await?;
        let created = insert_draft(rls.transaction(), tenant_id, draft).await?;
        rls.commit().await?;

        tracing::info!(
            tenant_id = %tenant_id,
            invoice_id = %created.invoice.id,
            invoice_number = %created.invoice.invoice_number,
            "Invoice created"
        );
        Ok(created)
    }

    /// Stores a batch of invoices in one transaction. Nothing is stored if
    /// any invoice fails.
    ///
    /// # Errors
    ///
    /// Returns the first failure; the transaction is rolled back.
    pub async fn create_many(
        &self,
        tenant_id: TenantId,
        drafts: &[InvoiceDraft],
    ) -> Result<Vec<invoices::Model>, InvoiceRepoError> {
        let rls = self.db.with_rls(tenant_id).await?;

        let mut created = Vec::with_capacity(drafts.len());
        for draft in drafts {
            match insert_draft(rls.transaction(), tenant_id, draft).await {
                Ok(row) => created.push(row.invoice),
                Err(e) => {
                    rls.rollback().await?;
                    return Err(e);
                }
            }
        }

        rls.commit().await?;
        tracing::info!(tenant_id = %tenant_id, count = created.len(), "Invoices imported");
        Ok(created)
    }

    /// Moves an invoice to a new status.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, or `Rule` when the lifecycle forbids the move.
    pub async fn update_status(
        &self,
        tenant_id: TenantId,
        id: InvoiceId,
        next: InvoiceStatus,
    ) -> Result<invoices::Model, InvoiceRepoError> {
        let rls = self.db.with_rls(tenant_id).await?;
        let txn = rls.transaction();

        let invoice = invoices::Entity::find_by_id(id.into_inner())
            .lock_exclusive()
            .one(txn)
            .await?
            .ok_or(InvoiceRepoError::NotFound(id))?;

        let current: InvoiceStatus = invoice.status.into();
        let next = InvoiceService::transition(current, next)?;

        let mut active: invoices::ActiveModel = invoice.into();
        active.status = Set(next.into());
        let updated = active.update(txn).await?;

        rls.commit().await?;
        tracing::info!(
            tenant_id = %tenant_id,
            invoice_id = %id,
            from = %current,
            to = %next,
            "Invoice status changed"
        );
        Ok(updated)
    }

    /// Deletes an invoice and its items.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no such invoice is visible.
    pub async fn delete(&self, tenant_id: TenantId, id: InvoiceId) -> Result<(), InvoiceRepoError> {
        let rls = self.db.with_rls(tenant_id).await?;
        let result = invoices::Entity::delete_by_id(id.into_inner())
            .exec(rls.transaction())
            .await?;

        if result.rows_affected == 0 {
            rls.rollback().await?;
            return Err(InvoiceRepoError::NotFound(id));
        }

        rls.commit().await?;
        tracing::info!(tenant_id = %tenant_id, invoice_id = %id, "Invoice deleted");
        Ok(())
    }

    /// Loads invoices with items for export, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn export_rows(
        &self,
        tenant_id: TenantId,
        range: DateRange,
    ) -> Result<Vec<InvoiceDraft>, DbErr> {
        let rls = self.db.with_rls(tenant_id).await?;
        let txn = rls.transaction();

        let headers = invoices::Entity::find()
            .filter(range.condition())
            .order_by_asc(invoices::Column::IssueDate)
            .order_by_asc(invoices::Column::InvoiceNumber)
            .all(txn)
            .await?;
        let items = headers.load_many(invoice_items::Entity, txn).await?;

        rls.commit().await?;

        Ok(headers
            .into_iter()
            .zip(items)
            .map(|(invoice, mut items)| {
                items.sort_by_key(|i| i.line_number);
                InvoiceWithItems { invoice, items }.into_draft()
            })
            .collect())
    }
}

async fn insert_draft<C: ConnectionTrait>(
    conn: &C,
    tenant_id: TenantId,
    draft: &InvoiceDraft,
) -> Result<InvoiceWithItems, InvoiceRepoError> {
    let taken = invoices::Entity::find()
        .filter(invoices::Column::InvoiceNumber.eq(draft.invoice_number.as_str()))
        .count(conn)
        .await?;
    if taken > 0 {
        return Err(InvoiceRepoError::DuplicateNumber(draft.invoice_number.clone()));
    }

    let now = chrono::Utc::now().into();
    let invoice = invoices::ActiveModel {
        id: Set(InvoiceId::new().into_inner()),
        tenant_id: Set(tenant_id.into_inner()),
        invoice_number: Set(draft.invoice_number.clone()),
        vendor_name: Set(draft.vendor_name.clone()),
        vendor_tax_id: Set(draft.vendor_tax_id.clone()),
        vendor_address: Set(draft.vendor_address.clone()),
        customer_name: Set(draft.customer_name.clone()),
        customer_tax_id: Set(draft.customer_tax_id.clone()),
        customer_address: Set(draft.customer_address.clone()),
        currency: Set(draft.currency.clone()),
        issue_date: Set(draft.issue_date),
        due_date: Set(draft.due_date),
        status: Set(draft.status.into()),
        subtotal: Set(draft.totals.subtotal),
        tax_amount: Set(draft.totals.tax_amount),
        total_amount: Set(draft.totals.total_amount),
        notes: Set(draft.notes.clone()),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await
    .map_err(|e| unique_violation(e, &draft.invoice_number))?;

    let mut items = Vec::with_capacity(draft.items.len());
    for item in &draft.items {
        let row = invoice_items::ActiveModel {
            id: Set(InvoiceItemId::new().into_inner()),
            tenant_id: Set(tenant_id.into_inner()),
            invoice_id: Set(invoice.id),
            line_number: Set(item.line_number),
            description: Set(item.description.clone()),
            quantity: Set(item.quantity),
            unit_price: Set(item.unit_price),
            amount: Set(item.amount),
        }
        .insert(conn)
        .await?;
        items.push(row);
    }

    Ok(InvoiceWithItems { invoice, items })
}

/// Maps a concurrent insert that lost the race on the unique constraint.
fn unique_violation(err: DbErr, invoice_number: &str) -> InvoiceRepoError {
    if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
        InvoiceRepoError::DuplicateNumber(invoice_number.to_string())
    } else {
        InvoiceRepoError::Database(err)
    }
}
