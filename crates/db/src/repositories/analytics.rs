//! Invoice facts for analytics.

use invora_core::analytics::InvoiceFact;
use invora_shared::TenantId;
use sea_orm::{DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder};

use super::invoice::DateRange;
use crate::entities::invoices;
use crate::rls::RlsExt;

/// Loads the per-invoice facts the analytics service aggregates.
#[derive(Debug, Clone)]
pub struct AnalyticsRepository {
    db: DatabaseConnection,
}

impl AnalyticsRepository {
    /// Creates a new analytics repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Returns one fact per invoice issued within `range`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn facts(
        &self,
        tenant_id: TenantId,
        range: DateRange,
    ) -> Result<Vec<InvoiceFact>, DbErr> {
        let rls = self.db.with_rls(tenant_id).await?;
        let rows = invoices::Entity::find()
            .filter(range.condition())
            .order_by_asc(invoices::Column::IssueDate)
            .all(rls.transaction())
            .await?;
        rls.commit().await?;

        Ok(rows.into_iter().map(to_fact).collect())
    }
}

fn to_fact(invoice: invoices::Model) -> InvoiceFact {
    InvoiceFact {
        invoice_number: invoice.invoice_number,
        vendor_name: invoice.vendor_name,
        customer_name: invoice.customer_name,
        currency: invoice.currency,
        issue_date: invoice.issue_date,
        due_date: invoice.due_date,
        status: invoice.status.into(),
        total_amount: invoice.total_amount,
        tax_amount: invoice.tax_amount,
    }
}
