//! API error taxonomy and its mapping onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use thiserror::Error;

use crate::domain::InvalidLevel;
use crate::storage::StorageError;

/// Everything the HTTP surface can answer with besides success.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Reading failed validation; caller-fixable, nothing was stored.
    #[error(transparent)]
    InvalidPayload(#[from] InvalidLevel),

    /// The log could not be persisted. Fatal to this request only.
    #[error("Failed to save data")]
    Storage(#[from] StorageError),

    /// The root path only speaks OPTIONS, GET and POST.
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Catch-all, e.g. a body that is not JSON at all.
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, body) = match self {
            Self::InvalidPayload(err) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": message, "received": err.received }),
            ),
            Self::Storage(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": message, "details": err.to_string() }),
            ),
            Self::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                json!({ "error": message }),
            ),
            Self::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": message }),
            ),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn invalid_payload_maps_to_400_with_received_value() {
        let response = ApiError::from(InvalidLevel {
            received: json!(101.0),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn method_not_allowed_maps_to_405() {
        let response = ApiError::MethodNotAllowed.into_response();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn storage_failure_keeps_its_details() {
        let err = ApiError::Storage(StorageError::Rejected {
            status: 503,
            key: "sensor_readings.csv".to_string(),
            message: "bucket gone".to_string(),
        });
        assert_eq!(err.to_string(), "Failed to save data");
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn rejected_value_survives_serialization() {
        let received: Value = json!("high");
        let err = InvalidLevel { received };
        assert_eq!(err.to_string(), "Invalid waterLevel (0-100)");
    }
}
