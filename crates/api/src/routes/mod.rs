//! API route definitions.

use axum::{Router, middleware};

use crate::{
    AppState,
    middleware::{auth_middleware, tenant_middleware},
};

pub mod analytics;
pub mod assistant;
pub mod health;
pub mod invoices;

/// Creates the API router with protected routes that need state for middleware.
#[allow(clippy::needless_pass_by_value)]
pub fn api_routes_with_state(state: AppState) -> Router<AppState> {
    // Layers run outermost-last: auth validates the token before tenant resolution.
    let protected_routes = Router::new()
        .merge(invoices::routes())
        .merge(analytics::routes())
        .merge(assistant::routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            tenant_middleware,
        ))
        .layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new().merge(health::routes()).merge(protected_routes)
}
