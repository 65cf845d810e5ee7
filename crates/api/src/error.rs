//! JSON error responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use invora_core::assistant::AssistantError;
use invora_core::invoice::InvoiceError;
use invora_core::spreadsheet::SpreadsheetError;
use invora_db::InvoiceRepoError;
use invora_shared::AppError;
use sea_orm::DbErr;
use serde_json::json;

/// Error returned by handlers, rendered as `{"error": code, "message": text}`.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let message = if self.0.is_client_safe() {
            self.0.to_string()
        } else {
            tracing::error!(error = %self.0, "Request failed");
            "An internal error occurred".to_string()
        };

        (
            status,
            Json(json!({
                "error": self.0.error_code(),
                "message": message
            })),
        )
            .into_response()
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<DbErr> for ApiError {
    fn from(err: DbErr) -> Self {
        Self(AppError::Database(err.to_string()))
    }
}

impl From<InvoiceRepoError> for ApiError {
    fn from(err: InvoiceRepoError) -> Self {
        Self(err.into())
    }
}

impl From<InvoiceError> for ApiError {
    fn from(err: InvoiceError) -> Self {
        Self(err.into())
    }
}

impl From<AssistantError> for ApiError {
    fn from(err: AssistantError) -> Self {
        Self(err.into())
    }
}

impl From<SpreadsheetError> for ApiError {
    fn from(err: SpreadsheetError) -> Self {
        Self(err.into())
    }
}

/// Result type for handlers.
pub type ApiResult<T> = Result<T, ApiError>;
