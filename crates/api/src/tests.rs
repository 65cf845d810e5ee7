//! Router tests driven through `tower::ServiceExt::oneshot`.
//!
//! The database is a `SeaORM` mock; queries are answered in the order the
//! middleware and handlers issue them.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
};
use http_body_util::BodyExt;
use invora_core::assistant::{
    AssistantService, ColumnSchema, CompletionRequest, ExecutorError, LlmClient, LlmError,
    ModelStrategy, QueryExecutor, QueryRows, SchemaCache, SchemaCatalog, SchemaError,
    SchemaSource,
};
use invora_db::entities::{
    invoices, sea_orm_active_enums::UserRole, tenants, user_roles, users,
};
use invora_shared::jwt::JwtConfig;
use invora_shared::{AssistantConfig, JwtService, Role, TenantId};
use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use super::{AppState, create_router};

const SECRET: &str = "router-test-secret";
const SUBJECT: &str = "idp|alice";

fn tenant_id() -> TenantId {
    "0190a6b2-3c4d-7e8f-9a0b-1c2d3e4f5a6b".parse().unwrap()
}

fn jwt(ttl_secs: i64) -> JwtService {
    JwtService::new(JwtConfig {
        secret: SECRET.to_string(),
        token_ttl_secs: ttl_secs,
        issuer: None,
        audience: None,
        leeway_secs: 0,
    })
}

fn token() -> String {
    jwt(900)
        .issue_token(SUBJECT, tenant_id(), vec![Role::SuperAdmin])
        .unwrap()
}

fn state(db: DatabaseConnection, assistant: Option<Arc<AssistantService>>) -> AppState {
    AppState {
        db: Arc::new(db),
        jwt_service: Arc::new(jwt(900)),
        assistant,
    }
}

fn tenant_row() -> tenants::Model {
    let now = chrono::Utc::now().into();
    tenants::Model {
        id: tenant_id().into_inner(),
        name: "Acme".into(),
        alias: "acme".into(),
        billing_email: None,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

fn user_row(id: Uuid) -> users::Model {
    let now = chrono::Utc::now().into();
    users::Model {
        id,
        tenant_id: tenant_id().into_inner(),
        email: "alice@example.com".into(),
        external_subject: SUBJECT.into(),
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

/// Mock answering the tenant middleware's three lookups.
fn resolved(roles: &[UserRole]) -> MockDatabase {
    let user_id = Uuid::now_v7();
    let now = chrono::Utc::now().into();
    let grants: Vec<user_roles::Model> = roles
        .iter()
        .map(|role| user_roles::Model {
            user_id,
            role: *role,
            created_at: now,
        })
        .collect();

    MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![tenant_row()]])
        .append_query_results([vec![user_row(user_id)]])
        .append_query_results([grants])
}

fn request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token()));
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_is_public_and_tagged_with_request_id() {
    let app = create_router(state(DatabaseConnection::Disconnected, None));
    let response = app
        .oneshot(Request::get("/api/v1/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_missing_token() {
    let app = create_router(state(DatabaseConnection::Disconnected, None));
    let response = app
        .oneshot(Request::get("/api/v1/invoices").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "missing_token");
}

#[tokio::test]
async fn test_expired_and_invalid_tokens() {
    let expired = jwt(-10)
        .issue_token(SUBJECT, tenant_id(), vec![])
        .unwrap();

    for (token, code) in [(expired.as_str(), "token_expired"), ("not-a-jwt", "invalid_token")] {
        let app = create_router(state(DatabaseConnection::Disconnected, None));
        let response = app
            .oneshot(
                Request::get("/api/v1/invoices")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], code);
    }
}

#[tokio::test]
async fn test_unknown_tenant_is_forbidden() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<tenants::Model>::new()])
        .into_connection();
    let app = create_router(state(db, None));

    let response = app
        .oneshot(request("GET", "/api/v1/invoices", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"], "tenant_inactive");
}

#[tokio::test]
async fn test_roles_come_from_database_not_token() {
    // The token claims SUPER_ADMIN; the database only grants USER.
    let db = resolved(&[UserRole::User]).into_connection();
    let app = create_router(state(db, None));

    let uri = format!("/api/v1/invoices/{}", Uuid::now_v7());
    let response = app.oneshot(request("DELETE", &uri, None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"], "FORBIDDEN");
}

#[tokio::test]
async fn test_missing_invoice_is_not_found() {
    let db = resolved(&[UserRole::User])
        .append_exec_results([MockExecResult {
            last_insert_id: 0,
            rows_affected: 0,
        }])
        .append_query_results([Vec::<invoices::Model>::new()])
        .into_connection();
    let app = create_router(state(db, None));

    let uri = format!("/api/v1/invoices/{}", Uuid::now_v7());
    let response = app.oneshot(request("GET", &uri, None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "NOT_FOUND");
}

#[tokio::test]
async fn test_assistant_unconfigured_returns_503() {
    let db = resolved(&[UserRole::User]).into_connection();
    let app = create_router(state(db, None));

    let response = app
        .oneshot(request(
            "POST",
            "/api/v1/assistant/ask",
            Some(json!({"question": "How many invoices?"})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["error"], "SERVICE_UNAVAILABLE");
}

// ============================================================================
// Assistant fakes
// ============================================================================

struct ScriptedModel;

#[async_trait]
impl LlmClient for ScriptedModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        if request.json_mode {
            Ok(json!({
                "sql": format!(
                    "SELECT invoice_number FROM invoices WHERE tenant_id = '{}'",
                    tenant_id()
                ),
                "explanation": "Lists invoice numbers"
            })
            .to_string())
        } else {
            Ok("You have one invoice, INV-1.".to_string())
        }
    }
}

struct FixedSchema;

#[async_trait]
impl SchemaSource for FixedSchema {
    async fn load(&self, _tables: &[String]) -> Result<SchemaCatalog, SchemaError> {
        let mut catalog = SchemaCatalog::default();
        catalog.add_column(
            "invoices",
            ColumnSchema {
                name: "invoice_number".into(),
                data_type: "character varying".into(),
                nullable: false,
            },
        );
        Ok(catalog)
    }
}

struct OneRow;

#[async_trait]
impl QueryExecutor for OneRow {
    async fn execute(&self, tenant: TenantId, sql: &str) -> Result<QueryRows, ExecutorError> {
        assert_eq!(tenant, tenant_id());
        assert!(sql.ends_with("LIMIT 200"), "{sql}");
        QueryRows::from_json_array(json!([{"invoice_number": "INV-1"}]))
    }
}

fn assistant() -> Arc<AssistantService> {
    let model: Arc<dyn LlmClient> = Arc::new(ScriptedModel);
    Arc::new(AssistantService::new(
        ModelStrategy::new(Arc::clone(&model), model, 0.0, 256),
        Arc::new(SchemaCache::new(
            Arc::new(FixedSchema),
            vec!["invoices".to_string()],
        )),
        Arc::new(OneRow),
        AssistantConfig::default(),
    ))
}

#[tokio::test]
async fn test_assistant_answers_question() {
    let db = resolved(&[UserRole::User]).into_connection();
    let app = create_router(state(db, Some(assistant())));

    let response = app
        .oneshot(request(
            "POST",
            "/api/v1/assistant/ask",
            Some(json!({"question": "Which invoices do I have?"})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["answered"], true);
    assert_eq!(body["answer"], "You have one invoice, INV-1.");
    assert_eq!(body["row_count"], 1);
    assert_eq!(body["rows"][0]["invoice_number"], "INV-1");
    assert_eq!(body["attempts"], 1);
}

#[tokio::test]
async fn test_assistant_rejects_blank_question() {
    let db = resolved(&[UserRole::User]).into_connection();
    let app = create_router(state(db, Some(assistant())));

    let response = app
        .oneshot(request(
            "POST",
            "/api/v1/assistant/ask",
            Some(json!({"question": "   "})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_schema_refresh_requires_admin() {
    let db = resolved(&[UserRole::User]).into_connection();
    let app = create_router(state(db, Some(assistant())));

    let response = app
        .oneshot(request("POST", "/api/v1/assistant/schema/refresh", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let db = resolved(&[UserRole::Admin]).into_connection();
    let app = create_router(state(db, Some(assistant())));

    let response = app
        .oneshot(request("POST", "/api/v1/assistant/schema/refresh", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["tables"]["invoices"]["columns"][0]["name"], "invoice_number");
}
