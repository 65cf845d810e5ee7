//! Tenant repository.

use invora_shared::TenantId;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter};

use crate::entities::tenants;

/// Read access to tenants.
#[derive(Debug, Clone)]
pub struct TenantRepository {
    db: DatabaseConnection,
}

impl TenantRepository {
    /// Creates a new tenant repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Finds a tenant by ID, ignoring deactivated tenants.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_active(&self, id: TenantId) -> Result<Option<tenants::Model>, DbErr> {
        tenants::Entity::find_by_id(id.into_inner())
            .filter(tenants::Column::IsActive.eq(true))
            .one(&self.db)
            .await
    }

    /// Finds a tenant by its alias.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_alias(&self, alias: &str) -> Result<Option<tenants::Model>, DbErr> {
        tenants::Entity::find()
            .filter(tenants::Column::Alias.eq(alias))
            .one(&self.db)
            .await
    }
}
