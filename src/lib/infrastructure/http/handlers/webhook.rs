//! Notification webhook handlers

use axum::{
    body::Bytes,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use constant_time_eq::constant_time_eq;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::{
    domain::notifications::{NotificationRequest, NotificationService},
    infrastructure::http::{
        errors::{ApiError, ErrorResponse},
        state::AppState,
    },
};

/// Which required settings are present. Never the values themselves.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Bindings {
    /// `WEBHOOK_TOKEN` is set
    pub webhook_token: bool,

    /// `OWNER_EMAIL` is set
    pub owner_email: bool,

    /// `DEFAULT_FROM` is set
    pub default_from: bool,
}

/// The status response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    /// Always `true`
    pub ok: bool,

    /// Service name
    #[schema(example = "tasterist-notifier")]
    pub service: String,

    /// Seconds since the server started
    #[schema(example = 123)]
    pub uptime: i64,

    /// Configuration presence
    pub bindings: Bindings,
}

/// The delivery response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeliveredResponse {
    /// Always `true`
    pub ok: bool,

    /// The owner address the notification went to
    #[schema(example = "owner@example.com")]
    pub to: String,

    /// The attempt that succeeded
    #[schema(example = 1)]
    pub attempt: u32,
}

/// Liveness and configuration status
#[utoipa::path(
    get,
    operation_id = "status",
    tag = "Webhook",
    path = "/",
    responses(
        (status = StatusCode::OK, description = "Service status", body = StatusResponse),
    )
)]
pub async fn status<N: NotificationService>(
    State(state): State<AppState<N>>,
) -> Json<StatusResponse> {
    let uptime = Utc::now().timestamp() - state.start_time.timestamp();

    Json(StatusResponse {
        ok: true,
        service: state.config.service_name.clone(),
        uptime,
        bindings: Bindings {
            webhook_token: state.config.webhook_token.is_some(),
            owner_email: state.config.owner_email_configured,
            default_from: state.config.default_from_configured,
        },
    })
}

/// Deliver a notification to the owner
#[utoipa::path(
    post,
    operation_id = "deliver",
    tag = "Webhook",
    path = "/",
    request_body = NotificationRequest,
    params(
        ("Authorization" = String, Header, description = "Bearer <WEBHOOK_TOKEN>"),
    ),
    responses(
        (status = StatusCode::OK, description = "Notification delivered", body = DeliveredResponse),
        (status = StatusCode::BAD_REQUEST, description = "Invalid JSON or missing fields", body = ErrorResponse, example = json!({ "error": "missing_required_fields", "missing": ["subject"] })),
        (status = StatusCode::FORBIDDEN, description = "Missing or wrong bearer token", body = ErrorResponse, example = json!({ "error": "forbidden" })),
        (status = StatusCode::BAD_GATEWAY, description = "Every delivery attempt failed", body = ErrorResponse, example = json!({ "error": "send_failed", "detail": "TimeoutError: took too long" })),
    )
)]
pub async fn deliver<N: NotificationService>(
    State(state): State<AppState<N>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<DeliveredResponse>, ApiError> {
    authorize(&headers, state.config.webhook_token.as_deref())?;

    let request = NotificationRequest::from_slice(&body)?;

    let delivery = state.notifications.deliver(&request).await?;

    Ok(Json(DeliveredResponse {
        ok: true,
        to: delivery.to,
        attempt: delivery.attempt,
    }))
}

/// Any method other than GET and POST
pub async fn method_not_allowed() -> ApiError {
    ApiError::method_not_allowed()
}

fn authorize(headers: &HeaderMap, token: Option<&str>) -> Result<(), ApiError> {
    let Some(token) = token else {
        warn!("webhook token is not configured, rejecting request");
        return Err(ApiError::forbidden());
    };

    let expected = format!("Bearer {token}");
    let presented = headers
        .get(AUTHORIZATION)
        .map(|value| value.as_bytes())
        .unwrap_or_default();

    if constant_time_eq(presented, expected.as_bytes()) {
        Ok(())
    } else {
        debug!("rejecting request with missing or wrong bearer token");
        Err(ApiError::forbidden())
    }
}
