//! User repository.

use invora_shared::{Role, TenantId, UserId};
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter};

use crate::entities::{user_roles, users};

/// Read access to users and their roles.
#[derive(Debug, Clone)]
pub struct UserRepository {
    db: DatabaseConnection,
}

impl UserRepository {
    /// Creates a new user repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Finds an active user of a tenant by identity-provider subject.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_subject(
        &self,
        tenant_id: TenantId,
        subject: &str,
    ) -> Result<Option<users::Model>, DbErr> {
        users::Entity::find()
            .filter(users::Column::TenantId.eq(tenant_id.into_inner()))
            .filter(users::Column::ExternalSubject.eq(subject))
            .filter(users::Column::IsActive.eq(true))
            .one(&self.db)
            .await
    }

    /// Returns the roles granted to a user, lowest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn roles(&self, user_id: UserId) -> Result<Vec<Role>, DbErr> {
        let grants = user_roles::Entity::find()
            .filter(user_roles::Column::UserId.eq(user_id.into_inner()))
            .all(&self.db)
            .await?;

        let mut roles: Vec<Role> = grants.into_iter().map(|g| Role::from(g.role)).collect();
        roles.sort_unstable();
        Ok(roles)
    }
}
