//! Tenant-scoped transactions.
//!
//! `invoices` and `invoice_items` carry policies keyed on the
//! `app.current_tenant_id` setting. All tenant data access goes through an
//! [`RlsConnection`], which sets that value with `SET LOCAL` so it dies with
//! the transaction and never reaches the next user of a pooled connection.
//!
//! ```ignore
//! use invora_db::rls::RlsExt;
//!
//! let rls = db.with_rls(tenant_id).await?;
//! let rows = invoices::Entity::find().all(rls.transaction()).await?;
//! rls.commit().await?;
//! ```

use std::time::Duration;

use invora_shared::TenantId;
use sea_orm::{
    AccessMode, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbErr, TransactionTrait,
};

/// A transaction bound to one tenant.
pub struct RlsConnection {
    txn: DatabaseTransaction,
    tenant_id: TenantId,
}

impl RlsConnection {
    /// Begins a read-write transaction for the tenant.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot be started or the tenant
    /// context cannot be set.
    pub async fn new(db: &DatabaseConnection, tenant_id: TenantId) -> Result<Self, DbErr> {
        let txn = db.begin().await?;
        set_rls_context(&txn, tenant_id).await?;
        Ok(Self { txn, tenant_id })
    }

    /// Begins a read-only transaction for the tenant with a per-statement
    /// time limit. Used for SQL the service did not write itself.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot be started or configured.
    pub async fn read_only(
        db: &DatabaseConnection,
        tenant_id: TenantId,
        statement_timeout: Duration,
    ) -> Result<Self, DbErr> {
        let txn = db
            .begin_with_config(None, Some(AccessMode::ReadOnly))
            .await?;
        set_rls_context(&txn, tenant_id).await?;
        txn.execute_unprepared(&timeout_sql(statement_timeout))
            .await?;
        Ok(Self { txn, tenant_id })
    }

    /// Tenant this transaction is scoped to.
    #[must_use]
    pub const fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Returns the transaction to run queries on.
    #[must_use]
    pub fn transaction(&self) -> &DatabaseTransaction {
        &self.txn
    }

    /// Commits.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails.
    pub async fn commit(self) -> Result<(), DbErr> {
        self.txn.commit().await
    }

    /// Rolls back.
    ///
    /// # Errors
    ///
    /// Returns an error if the rollback fails.
    pub async fn rollback(self) -> Result<(), DbErr> {
        self.txn.rollback().await
    }
}

/// Opens tenant-scoped transactions on a pool.
#[async_trait::async_trait]
pub trait RlsExt {
    /// Read-write transaction for the tenant.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot be started.
    async fn with_rls(&self, tenant_id: TenantId) -> Result<RlsConnection, DbErr>;

    /// Read-only transaction for the tenant with a statement timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot be started.
    async fn with_rls_read_only(
        &self,
        tenant_id: TenantId,
        statement_timeout: Duration,
    ) -> Result<RlsConnection, DbErr>;
}

#[async_trait::async_trait]
impl RlsExt for DatabaseConnection {
    async fn with_rls(&self, tenant_id: TenantId) -> Result<RlsConnection, DbErr> {
        RlsConnection::new(self, tenant_id).await
    }

    async fn with_rls_read_only(
        &self,
        tenant_id: TenantId,
        statement_timeout: Duration,
    ) -> Result<RlsConnection, DbErr> {
        RlsConnection::read_only(self, tenant_id, statement_timeout).await
    }
}

/// Sets the tenant context on a transaction opened elsewhere.
///
/// # Errors
///
/// Returns an error if the statement fails.
pub async fn set_rls_context(txn: &DatabaseTransaction, tenant_id: TenantId) -> Result<(), DbErr> {
    txn.execute_unprepared(&context_sql(tenant_id)).await?;
    Ok(())
}

// SET takes no bind parameters. Both values are rendered from typed input.
fn context_sql(tenant_id: TenantId) -> String {
    format!("SET LOCAL app.current_tenant_id = '{tenant_id}'")
}

fn timeout_sql(timeout: Duration) -> String {
    format!("SET LOCAL statement_timeout = '{}ms'", timeout.as_millis().max(1))
}
