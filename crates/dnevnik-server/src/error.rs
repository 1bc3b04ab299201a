use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use dnevnik_confirm::{BindError, ConfirmError, FinalizeError};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ServerError::Conflict(_) => (StatusCode::CONFLICT, self.to_string()),
            ServerError::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string()),
            ServerError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<ConfirmError> for ServerError {
    fn from(e: ConfirmError) -> Self {
        ServerError::Internal(e.to_string())
    }
}

impl From<BindError> for ServerError {
    fn from(e: BindError) -> Self {
        // Display texts are the user-visible reasons from the bind taxonomy.
        match e {
            BindError::InvalidFormat => ServerError::BadRequest(e.to_string()),
            BindError::NotFound => ServerError::NotFound(e.to_string()),
            BindError::AlreadyUsed => ServerError::Conflict(e.to_string()),
            BindError::Store(_) => ServerError::Internal(e.to_string()),
        }
    }
}

impl From<FinalizeError> for ServerError {
    fn from(e: FinalizeError) -> Self {
        match e {
            FinalizeError::NotConfirmed => ServerError::Conflict(e.to_string()),
            FinalizeError::UserNotFound => ServerError::NotFound(e.to_string()),
            FinalizeError::Store(_) => ServerError::Internal(e.to_string()),
        }
    }
}
