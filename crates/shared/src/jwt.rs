//! Bearer-token validation.
//!
//! Production tokens come from the identity provider; Invora only checks
//! them. Minting exists so the seeder and tests can produce tokens the
//! server accepts.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use thiserror::Error;

use crate::auth::Claims;
use crate::config::JwtSettings;
use crate::types::{Role, TenantId};

/// Token verification settings.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HMAC secret shared with the identity provider.
    pub secret: String,
    /// Lifetime of minted tokens, in seconds.
    pub token_ttl_secs: i64,
    /// Required `iss` claim.
    pub issuer: Option<String>,
    /// Required `aud` claim.
    pub audience: Option<String>,
    /// Clock skew tolerated on `exp`, in seconds.
    pub leeway_secs: u64,
}

impl From<&JwtSettings> for JwtConfig {
    fn from(settings: &JwtSettings) -> Self {
        Self {
            secret: settings.secret.clone(),
            token_ttl_secs: i64::try_from(settings.access_token_expiry_secs).unwrap_or(i64::MAX),
            issuer: settings.issuer.clone(),
            audience: settings.audience.clone(),
            leeway_secs: settings.leeway_secs,
        }
    }
}

/// Token failures.
#[derive(Debug, Error)]
pub enum JwtError {
    /// Minting failed.
    #[error("failed to encode token: {0}")]
    Encoding(String),

    /// Bad signature, malformed token, or wrong issuer/audience.
    #[error("invalid token: {0}")]
    Invalid(String),

    /// `exp` is in the past.
    #[error("token has expired")]
    Expired,
}

/// Verifies and mints bearer tokens.
#[derive(Clone)]
pub struct JwtService {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("issuer", &self.config.issuer)
            .field("audience", &self.config.audience)
            .field("token_ttl_secs", &self.config.token_ttl_secs)
            .field("keys", &"[hidden]")
            .finish()
    }
}

impl JwtService {
    /// Creates a service from verification settings.
    #[must_use]
    pub fn new(config: JwtConfig) -> Self {
        let mut validation = Validation::default();
        validation.leeway = config.leeway_secs;
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }
        match &config.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            config,
        }
    }

    /// Creates a service from the `[jwt]` configuration section.
    #[must_use]
    pub fn from_settings(settings: &JwtSettings) -> Self {
        Self::new(settings.into())
    }

    /// Mints a token for a subject, stamped with the configured issuer and
    /// audience.
    ///
    /// # Errors
    ///
    /// Returns `JwtError::Encoding` if signing fails.
    pub fn issue_token(
        &self,
        subject: &str,
        tenant_id: TenantId,
        roles: Vec<Role>,
    ) -> Result<String, JwtError> {
        let expires_at = Utc::now() + Duration::seconds(self.config.token_ttl_secs);
        let mut claims = Claims::new(subject, tenant_id, roles, expires_at);
        claims.iss.clone_from(&self.config.issuer);
        claims.aud.clone_from(&self.config.audience);

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| JwtError::Encoding(e.to_string()))
    }

    /// Verifies a token and returns its claims.
    ///
    /// # Errors
    ///
    /// Returns `JwtError::Expired` past `exp` plus leeway, otherwise
    /// `JwtError::Invalid` for any verification failure.
    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::Expired,
                _ => JwtError::Invalid(e.to_string()),
            })
    }
}

#[cfg(test)]
#[path = "jwt_tests.rs"]
mod tests;
