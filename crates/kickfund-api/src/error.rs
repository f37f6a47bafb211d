use axum::{
    Json,
    extract::multipart::{MultipartError, MultipartRejection},
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use tracing::error;

use kickfund_types::api::Envelope;

/// Message for every authorization-gate failure, whatever the cause.
pub const INVALID_ACCESS_TOKEN: &str = "Missing or invalid access token.";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid input: {}", .0.join(", "))]
    Validation(Vec<String>),

    #[error("{0}")]
    Unauthenticated(&'static str),

    /// Authenticated, but not the owner of the resource.
    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(&'static str),

    #[error(transparent)]
    Server(#[from] anyhow::Error),
}

impl ApiError {
    /// `Ok` when the request passed field validation.
    pub fn check(field_errors: Vec<String>) -> Result<(), ApiError> {
        if field_errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(field_errors))
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        ApiError::Validation(vec![message.into()])
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Unauthenticated(_) | ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (message, label, data) = match &self {
            ApiError::Validation(errors) => {
                ("Invalid input.".to_string(), "error", json!({ "errors": errors }))
            }
            ApiError::Unauthenticated(msg) => (msg.to_string(), "unauthenticated", json!(null)),
            ApiError::Unauthorized(msg) => (msg.to_string(), "unauthorized", json!(null)),
            ApiError::NotFound(msg) => (msg.to_string(), "not-found", json!(null)),
            ApiError::Conflict(msg) => (msg.to_string(), "conflict", json!(null)),
            ApiError::Server(e) => {
                error!("Request failed: {:#}", e);
                ("Internal server error.".to_string(), "error", json!(null))
            }
        };

        (status, Json(Envelope::new(message, status.as_u16(), label, data))).into_response()
    }
}

/// Successful response wrapped in the standard envelope.
pub fn respond<T: Serialize>(
    status: StatusCode,
    message: &str,
    label: &str,
    data: T,
) -> (StatusCode, Json<Envelope<T>>) {
    (status, Json(Envelope::new(message, status.as_u16(), label, data)))
}

// Extractor rejections surface as validation errors so clients always get the envelope.

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::invalid(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::invalid(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::invalid(rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::invalid(rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::invalid(err.body_text())
    }
}
