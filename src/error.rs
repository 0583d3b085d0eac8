use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::scheduling::SchedulingError;
use crate::store::StoreError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorObject,
}

#[derive(Debug, Serialize)]
pub struct ErrorObject {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(&'static str, String),
    Forbidden(&'static str, String),
    BadRequest(&'static str, String),
    NotFound(&'static str, String),
    Conflict(&'static str, String, Option<Value>),
    Internal(String),
}

impl ApiError {
    pub fn session_expired() -> Self {
        ApiError::Unauthorized("SESSION_EXPIRED", "Session expired".into())
    }

    /// Backend details stay in the log, not in the response.
    pub fn internal() -> Self {
        ApiError::Internal("Internal server error".into())
    }

    fn to_error_response(code: &str, message: &str, details: Option<Value>) -> Json<ErrorResponse> {
        Json(ErrorResponse {
            error: ErrorObject {
                code: code.to_string(),
                message: message.to_string(),
                details,
            },
        })
    }
}

impl From<SchedulingError> for ApiError {
    fn from(e: SchedulingError) -> Self {
        let message = e.to_string();
        match e {
            SchedulingError::Validation(_) => ApiError::BadRequest("VALIDATION_ERROR", message),
            SchedulingError::InvalidRange { .. } => ApiError::BadRequest("INVALID_RANGE", message),
            SchedulingError::SlotConflict {
                conflicting_id,
                start,
                end,
            } => ApiError::Conflict(
                "SLOT_CONFLICT",
                message,
                Some(json!({
                    "conflicting_id": conflicting_id,
                    "start_time": start,
                    "end_time": end,
                })),
            ),
            SchedulingError::NotFound(_) => ApiError::NotFound("NOT_FOUND", message),
            SchedulingError::Forbidden { .. } => ApiError::Forbidden("FORBIDDEN", message),
            SchedulingError::Store(StoreError::Overlap) => {
                ApiError::Conflict("SLOT_CONFLICT", message, None)
            }
            SchedulingError::Store(err) => {
                tracing::error!(error = %err, "store failure");
                ApiError::internal()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(code, msg) => {
                (StatusCode::UNAUTHORIZED, ApiError::to_error_response(code, &msg, None)).into_response()
            }
            ApiError::Forbidden(code, msg) => {
                (StatusCode::FORBIDDEN, ApiError::to_error_response(code, &msg, None)).into_response()
            }
            ApiError::BadRequest(code, msg) => {
                (StatusCode::BAD_REQUEST, ApiError::to_error_response(code, &msg, None)).into_response()
            }
            ApiError::NotFound(code, msg) => {
                (StatusCode::NOT_FOUND, ApiError::to_error_response(code, &msg, None)).into_response()
            }
            ApiError::Conflict(code, msg, details) => {
                (StatusCode::CONFLICT, ApiError::to_error_response(code, &msg, details)).into_response()
            }
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::to_error_response("INTERNAL", &msg, None),
            )
                .into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_failure_hides_backend_text() {
        let err = SchedulingError::Store(StoreError::Database(sqlx::Error::PoolTimedOut));
        let backend = err.to_string();
        match ApiError::from(err) {
            ApiError::Internal(msg) => {
                assert_eq!(msg, "Internal server error");
                assert!(!backend.contains(&msg));
            }
            other => panic!("expected internal error, got {other:?}"),
        }

        let err = SchedulingError::Store(StoreError::OutOfRange("duration_minutes"));
        assert!(matches!(ApiError::from(err), ApiError::Internal(msg) if !msg.contains("duration")));
    }

    #[test]
    fn overlap_from_store_is_conflict() {
        let err = SchedulingError::Store(StoreError::Overlap);
        assert!(matches!(
            ApiError::from(err),
            ApiError::Conflict("SLOT_CONFLICT", _, None)
        ));
    }
}
