//! API error-handling module

use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use crate::domain::notifications::{DeliveryError, MissingField, RequestError};

/// An error response
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Machine-readable error code
    #[schema(example = "missing_required_fields")]
    pub error: String,

    /// Diagnostic of the last failed delivery attempt
    #[schema(example = "TimeoutError: took too long")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// Names of the missing fields
    #[schema(example = json!(["subject"]))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing: Option<Vec<String>>,
}

/// An error raised in the API
#[derive(Debug)]
pub struct ApiError {
    /// The status code
    pub status: StatusCode,

    /// The error code
    pub message: String,

    /// Optional diagnostic
    pub detail: Option<String>,

    /// Optional list of missing fields
    pub missing: Option<Vec<String>>,
}

impl ApiError {
    /// Create a new API error
    pub fn new(status: StatusCode, message: &str) -> Self {
        Self {
            status,
            message: message.to_string(),
            detail: None,
            missing: None,
        }
    }

    /// Missing or wrong bearer token
    pub fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN, "forbidden")
    }

    /// Body is not a JSON object
    pub fn invalid_json() -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_json")
    }

    /// Required fields are missing
    pub fn missing_required_fields(fields: &[MissingField]) -> Self {
        Self {
            missing: Some(fields.iter().map(|field| field.to_string()).collect()),
            ..Self::new(StatusCode::BAD_REQUEST, "missing_required_fields")
        }
    }

    /// Unsupported HTTP method
    pub fn method_not_allowed() -> Self {
        Self::new(StatusCode::METHOD_NOT_ALLOWED, "method_not_allowed")
    }

    /// Every delivery attempt failed
    pub fn send_failed(detail: &str) -> Self {
        Self {
            detail: Some(detail.to_string()),
            ..Self::new(StatusCode::BAD_GATEWAY, "send_failed")
        }
    }

    /// Create new internal server error
    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
                detail: self.detail,
                missing: self.missing,
            }),
        )
            .into_response()
    }
}

impl From<RequestError> for ApiError {
    fn from(err: RequestError) -> Self {
        debug!("RequestError -> ApiError: {err}");

        ApiError::invalid_json()
    }
}

impl From<DeliveryError> for ApiError {
    fn from(err: DeliveryError) -> Self {
        match err {
            DeliveryError::MissingRequiredFields(fields) => {
                ApiError::missing_required_fields(&fields)
            }
            DeliveryError::SendFailed { detail, .. } => ApiError::send_failed(&detail),
        }
    }
}
