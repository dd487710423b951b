use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{gate::AuthError, models::ErrorResponse, ordering::{Direction, ReorderError}};

/// AppError
///
/// The single error taxonomy surfaced at the HTTP boundary. Every handler returns
/// `AppResult<T>`, and the `IntoResponse` impl below translates each kind into a status
/// code plus a `{ "error": "..." }` JSON body. Nothing here is retried.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Insufficient role for this operation")]
    Forbidden,

    #[error("You cannot delete your own account")]
    SelfDeletion,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Cannot move further {0}")]
    Boundary(Direction),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::SelfDeletion | AppError::Validation(_) | AppError::Boundary(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unauthenticated => AppError::Unauthenticated,
            AuthError::Forbidden => AppError::Forbidden,
        }
    }
}

impl From<ReorderError> for AppError {
    fn from(err: ReorderError) -> Self {
        match err {
            ReorderError::NotFound(id) => AppError::NotFound(format!("Project {}", id)),
            ReorderError::Boundary(direction) => AppError::Boundary(direction),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Server-side failures keep their detail in the logs, not in the response body.
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "Internal server error".to_string()
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "request rejected");
            self.to_string()
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
