//! Unified error handling for the server.
//!
//! Errors are rendered in the platform's error shape:
//!
//! ```json
//! {"statusCode": 409, "message": "...", "errors": [{"code": "ConcurrentModification", "message": "...", "currentVersion": 3}]}
//! ```

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shelf_engine::Error as EngineError;

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{}", .0.body_text())]
    InvalidBody(#[from] JsonRejection),

    #[error("{0}")]
    NotFound(String),
}

/// One entry of the `errors` array.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorObject {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    current_version: Option<u64>,
}

/// Error response body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    status_code: u16,
    message: String,
    errors: Vec<ErrorObject>,
}

impl AppError {
    fn classify(&self) -> (StatusCode, &'static str, Option<u64>) {
        match self {
            AppError::BadRequest(_) | AppError::InvalidBody(_) => {
                (StatusCode::BAD_REQUEST, "InvalidInput", None)
            }
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "ResourceNotFound", None),
            AppError::Engine(e) => match e {
                EngineError::Syntax { .. }
                | EngineError::InvalidInput(_)
                | EngineError::InvalidDocument(_) => {
                    (StatusCode::BAD_REQUEST, "InvalidInput", None)
                }
                EngineError::ConcurrentModification { actual, .. } => {
                    (StatusCode::CONFLICT, "ConcurrentModification", Some(*actual))
                }
                EngineError::NotFound { .. } => (StatusCode::NOT_FOUND, "ResourceNotFound", None),
                EngineError::ReferenceNotFound { .. } => {
                    (StatusCode::BAD_REQUEST, "ReferencedResourceNotFound", None)
                }
                EngineError::Evaluation(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "General", None)
                }
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, current_version) = self.classify();
        let message = self.to_string();
        if status.is_server_error() {
            tracing::error!("Internal error: {}", message);
        } else {
            tracing::warn!(code, "Request failed: {}", message);
        }

        let body = Json(ErrorResponse {
            status_code: status.as_u16(),
            message: message.clone(),
            errors: vec![ErrorObject {
                code,
                message,
                current_version,
            }],
        });

        (status, body).into_response()
    }
}

/// Result type alias for handlers.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_map_to_platform_codes() {
        let cases = [
            (
                AppError::from(EngineError::syntax("unexpected token", ")")),
                StatusCode::BAD_REQUEST,
                "InvalidInput",
            ),
            (
                AppError::from(EngineError::ConcurrentModification {
                    expected: 1,
                    actual: 3,
                }),
                StatusCode::CONFLICT,
                "ConcurrentModification",
            ),
            (
                AppError::from(EngineError::NotFound {
                    type_id: "cart".into(),
                    id: "c".into(),
                }),
                StatusCode::NOT_FOUND,
                "ResourceNotFound",
            ),
            (
                AppError::from(EngineError::ReferenceNotFound {
                    type_id: "category".into(),
                    identifier: "x".into(),
                }),
                StatusCode::BAD_REQUEST,
                "ReferencedResourceNotFound",
            ),
            (
                AppError::from(EngineError::Evaluation("boom".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
                "General",
            ),
        ];
        for (error, status, code) in cases {
            let (s, c, _) = error.classify();
            assert_eq!(s, status);
            assert_eq!(c, code);
        }
    }

    #[test]
    fn conflict_carries_current_version() {
        let error = AppError::from(EngineError::ConcurrentModification {
            expected: 1,
            actual: 3,
        });
        assert_eq!(error.classify().2, Some(3));
    }
}
