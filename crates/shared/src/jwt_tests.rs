//! Unit tests for token verification.

use super::*;

const SECRET: &str = "test-secret-key-for-testing";

fn config() -> JwtConfig {
    JwtConfig {
        secret: SECRET.to_string(),
        token_ttl_secs: 900,
        issuer: None,
        audience: None,
        leeway_secs: 60,
    }
}

fn service() -> JwtService {
    JwtService::new(config())
}

#[test]
fn test_issue_and_validate_token() {
    let service = service();
    let tenant = TenantId::new();

    let token = service
        .issue_token("auth0|abc", tenant, vec![Role::User])
        .unwrap();
    let claims = service.validate_token(&token).unwrap();

    assert_eq!(claims.subject(), "auth0|abc");
    assert_eq!(claims.tenant_id(), tenant);
    assert_eq!(claims.roles, vec![Role::User]);
    assert_eq!(claims.iss, None);
}

#[test]
fn test_malformed_token_is_invalid() {
    assert!(matches!(
        service().validate_token("invalid.token.here"),
        Err(JwtError::Invalid(_))
    ));
}

#[test]
fn test_token_from_other_secret_rejected() {
    let other = JwtService::new(JwtConfig {
        secret: "someone-else".to_string(),
        ..config()
    });
    let token = other.issue_token("user", TenantId::new(), vec![]).unwrap();

    assert!(matches!(
        service().validate_token(&token),
        Err(JwtError::Invalid(_))
    ));
}

#[test]
fn test_expired_token() {
    let service = JwtService::new(JwtConfig {
        token_ttl_secs: -300,
        ..config()
    });
    let token = service.issue_token("user", TenantId::new(), vec![]).unwrap();

    assert!(matches!(
        service.validate_token(&token),
        Err(JwtError::Expired)
    ));
}

#[test]
fn test_expiry_within_leeway_accepted() {
    let service = JwtService::new(JwtConfig {
        token_ttl_secs: -10,
        ..config()
    });
    let token = service.issue_token("user", TenantId::new(), vec![]).unwrap();

    assert!(service.validate_token(&token).is_ok());
}

#[test]
fn test_issuer_and_audience_enforced() {
    let strict = JwtService::new(JwtConfig {
        issuer: Some("https://id.invora.dev/".to_string()),
        audience: Some("invora-api".to_string()),
        ..config()
    });

    let own = strict.issue_token("user", TenantId::new(), vec![]).unwrap();
    let claims = strict.validate_token(&own).unwrap();
    assert_eq!(claims.iss.as_deref(), Some("https://id.invora.dev/"));
    assert_eq!(claims.aud.as_deref(), Some("invora-api"));

    let foreign = service()
        .issue_token("user", TenantId::new(), vec![])
        .unwrap();
    assert!(matches!(
        strict.validate_token(&foreign),
        Err(JwtError::Invalid(_))
    ));
}

#[test]
fn test_audience_ignored_when_not_configured() {
    let stamped = JwtService::new(JwtConfig {
        audience: Some("invora-api".to_string()),
        ..config()
    });
    let token = stamped.issue_token("user", TenantId::new(), vec![]).unwrap();

    assert!(service().validate_token(&token).is_ok());
}

#[test]
fn test_config_from_settings() {
    let settings = JwtSettings {
        secret: "s".to_string(),
        access_token_expiry_secs: 600,
        issuer: Some("idp".to_string()),
        audience: None,
        leeway_secs: 5,
    };
    let config = JwtConfig::from(&settings);

    assert_eq!(config.token_ttl_secs, 600);
    assert_eq!(config.issuer.as_deref(), Some("idp"));
    assert_eq!(config.leeway_secs, 5);
}

#[test]
fn test_debug_hides_keys() {
    let debug = format!("{:?}", service());
    assert!(debug.contains("[hidden]"));
    assert!(!debug.contains(SECRET));
}
