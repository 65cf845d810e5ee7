//! Bearer-token claims issued by the identity provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::types::{Role, TenantId};

/// JWT claims carried by access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject as known by the identity provider.
    pub sub: String,
    /// Tenant the token was issued for.
    pub tenant: Uuid,
    /// Roles asserted by the identity provider.
    #[serde(default)]
    pub roles: Vec<Role>,
    /// Issuer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// Audience. Providers that send a list keep only the first entry.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "first_audience"
    )]
    pub aud: Option<String>,
    /// Issued at timestamp.
    pub iat: i64,
    /// Expiration timestamp.
    pub exp: i64,
}

impl Claims {
    /// Creates new claims for a subject.
    #[must_use]
    pub fn new(
        subject: impl Into<String>,
        tenant_id: TenantId,
        roles: Vec<Role>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            sub: subject.into(),
            tenant: tenant_id.into_inner(),
            roles,
            iss: None,
            aud: None,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        }
    }

    /// Returns the subject.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.sub
    }

    /// Returns the tenant ID from claims.
    #[must_use]
    pub const fn tenant_id(&self) -> TenantId {
        TenantId::from_uuid(self.tenant)
    }
}

fn first_audience<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Audience {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<Audience>::deserialize(deserializer)? {
        Some(Audience::One(aud)) => Some(aud),
        Some(Audience::Many(list)) => list.into_iter().next(),
        None => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_claims_new_sets_fields() {
        let tenant = TenantId::new();
        let expires_at = Utc::now() + Duration::hours(1);
        let before = Utc::now().timestamp();

        let claims = Claims::new("auth0|42", tenant, vec![Role::Admin], expires_at);

        assert_eq!(claims.subject(), "auth0|42");
        assert_eq!(claims.tenant_id(), tenant);
        assert_eq!(claims.roles, vec![Role::Admin]);
        assert!(claims.iat >= before);
        assert_eq!(claims.exp, expires_at.timestamp());
    }

    #[test]
    fn test_claims_roles_default_to_empty() {
        let claims: Claims = serde_json::from_value(serde_json::json!({
            "sub": "user-1",
            "tenant": "550e8400-e29b-41d4-a716-446655440000",
            "iat": 0,
            "exp": 1
        }))
        .unwrap();
        assert!(claims.roles.is_empty());
    }

    #[test]
    fn test_claims_accept_audience_list() {
        let claims: Claims = serde_json::from_value(serde_json::json!({
            "sub": "user-1",
            "tenant": "550e8400-e29b-41d4-a716-446655440000",
            "aud": ["invora-api", "https://idp.example/userinfo"],
            "iat": 0,
            "exp": 1
        }))
        .unwrap();
        assert_eq!(claims.aud.as_deref(), Some("invora-api"));
        assert_eq!(claims.iss, None);
    }
}
