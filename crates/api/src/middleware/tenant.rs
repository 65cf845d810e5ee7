//! Tenant resolution for authenticated requests.

use axum::{
    Json,
    extract::{FromRequestParts, Request, State},
    http::{StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use invora_db::{TenantRepository, UserRepository};
use invora_shared::{AppError, Claims, Role, TenantId, UserId};
use serde_json::json;

use crate::{AppState, error::ApiError};

/// Tenant, user and roles of the current request.
#[derive(Debug, Clone)]
pub struct TenantContext {
    /// Tenant the request acts on.
    pub tenant_id: TenantId,
    /// Local user matched by identity-provider subject.
    pub user_id: UserId,
    /// Roles granted in the database.
    pub roles: Vec<Role>,
}

impl TenantContext {
    /// Returns true if any granted role satisfies `required`.
    #[must_use]
    pub fn has_role(&self, required: Role) -> bool {
        Role::highest(&self.roles).is_some_and(|r| r.satisfies(required))
    }

    /// Fails with 403 unless the user holds `required` or a higher role.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` when the role is missing.
    pub fn require(&self, required: Role) -> Result<(), ApiError> {
        if self.has_role(required) {
            Ok(())
        } else {
            Err(ApiError(AppError::Forbidden(format!(
                "{required} role required"
            ))))
        }
    }
}

fn forbidden(error: &str, message: &str) -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(json!({ "error": error, "message": message })),
    )
        .into_response()
}

/// Resolves the token's tenant and user against the database.
///
/// Must run after `auth_middleware`. Roles asserted by the token are
/// ignored; only roles stored for the user count.
pub async fn tenant_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(claims) = request.extensions().get::<Claims>().cloned() else {
        return ApiError(AppError::Unauthorized("Authentication required".into())).into_response();
    };
    let tenant_id = claims.tenant_id();

    let tenant = match TenantRepository::new((*state.db).clone())
        .find_active(tenant_id)
        .await
    {
        Ok(tenant) => tenant,
        Err(e) => return ApiError::from(e).into_response(),
    };
    if tenant.is_none() {
        tracing::warn!(tenant_id = %tenant_id, "Token for unknown or inactive tenant");
        return forbidden("tenant_inactive", "Tenant does not exist or is inactive");
    }

    let users = UserRepository::new((*state.db).clone());
    let user = match users.find_by_subject(tenant_id, claims.subject()).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            tracing::warn!(tenant_id = %tenant_id, subject = %claims.subject(), "Unknown user");
            return forbidden("user_inactive", "User does not exist or is inactive");
        }
        Err(e) => return ApiError::from(e).into_response(),
    };

    let user_id = UserId::from_uuid(user.id);
    let roles = match users.roles(user_id).await {
        Ok(roles) => roles,
        Err(e) => return ApiError::from(e).into_response(),
    };

    request.extensions_mut().insert(TenantContext {
        tenant_id,
        user_id,
        roles,
    });
    next.run(request).await
}

impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or_else(|| ApiError(AppError::Unauthorized("Authentication required".into())))
    }
}
