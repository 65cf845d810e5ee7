//! Shared types, errors, and configuration for Invora.
//!
//! This crate provides common types used across all other crates:
//! - Typed IDs for type-safe entity references
//! - Roles and bearer-token claims
//! - Pagination types for list endpoints
//! - Application-wide error types
//! - Configuration management

pub mod auth;
pub mod config;
pub mod error;
pub mod jwt;
pub mod types;

pub use auth::Claims;
pub use config::{
    AppConfig, AssistantConfig, LlmConfig, LlmProvider, LogFormat, LoggingConfig, McpConfig,
};
pub use error::{AppError, AppResult};
pub use jwt::{JwtError, JwtService};
pub use types::{Role, TenantId, UserId};
