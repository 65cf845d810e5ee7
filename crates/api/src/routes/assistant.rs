//! Data assistant routes.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use invora_core::assistant::{AssistantAnswer, AssistantService, SchemaCatalog};
use invora_shared::{AppError, Role};
use serde::Deserialize;

use crate::{
    AppState,
    error::{ApiError, ApiResult},
    middleware::TenantContext,
};

/// Creates the assistant routes (requires auth and tenant middleware to be applied externally).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/assistant/ask", post(ask))
        .route("/assistant/schema", get(schema))
        .route("/assistant/schema/refresh", post(refresh_schema))
}

/// Question request.
#[derive(Debug, Deserialize)]
pub struct AskRequest {
    /// Question in plain language.
    pub question: String,
}

fn assistant(state: &AppState) -> Result<&Arc<AssistantService>, ApiError> {
    state.assistant.as_ref().ok_or_else(|| {
        ApiError(AppError::ServiceUnavailable(
            "The data assistant is not configured".into(),
        ))
    })
}

/// POST /assistant/ask - Answer a question from the tenant's data.
async fn ask(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(payload): Json<AskRequest>,
) -> ApiResult<Json<AssistantAnswer>> {
    ctx.require(Role::User)?;

    let answer = assistant(&state)?
        .ask(ctx.tenant_id, &payload.question)
        .await?;
    Ok(Json(answer))
}

/// GET /assistant/schema - Tables and columns the assistant may query.
async fn schema(State(state): State<AppState>, ctx: TenantContext) -> ApiResult<Json<SchemaCatalog>> {
    ctx.require(Role::User)?;

    let catalog = assistant(&state)?.catalog().await?;
    Ok(Json(catalog.as_ref().clone()))
}

/// POST /assistant/schema/refresh - Reload the schema catalog.
async fn refresh_schema(
    State(state): State<AppState>,
    ctx: TenantContext,
) -> ApiResult<Json<SchemaCatalog>> {
    ctx.require(Role::Admin)?;

    let catalog = assistant(&state)?.refresh_schema().await?;
    tracing::info!(tables = catalog.tables.len(), "Schema catalog refreshed");
    Ok(Json(catalog.as_ref().clone()))
}
