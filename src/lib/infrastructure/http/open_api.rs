//! OpenAPI module

use axum::Json;
use utoipa::OpenApi;

use crate::{
    domain::notifications::NotificationRequest,
    infrastructure::http::{errors::ErrorResponse, handlers::webhook},
};

#[derive(Debug, OpenApi)]
#[openapi(
    info(title = "Tasterist Notifier"),
    paths(webhook::status, webhook::deliver),
    components(schemas(
        NotificationRequest,
        webhook::Bindings,
        webhook::StatusResponse,
        webhook::DeliveredResponse,
        ErrorResponse,
    ))
)]
pub struct ApiDocs;

/// The OpenAPI document
pub async fn handler() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDocs::openapi())
}
