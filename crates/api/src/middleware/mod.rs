//! Request middleware.

pub mod auth;
pub mod tenant;

pub use auth::auth_middleware;
pub use tenant::{TenantContext, tenant_middleware};
