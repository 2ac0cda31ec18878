//! Inbound notification request

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::errors::RequestError;

/// Notification request as sent by the upstream application.
///
/// Only the fields below are read. Anything else in the body, a `to` field
/// included, is discarded during deserialization.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct NotificationRequest {
    /// Sender header candidate, e.g. `Tasterist <reports@example.com>`
    #[schema(example = "Tasterist <reports@example.com>")]
    #[serde(default)]
    pub from: Option<String>,

    /// Email subject
    #[schema(example = "Weekly tasting report")]
    #[serde(default)]
    pub subject: Option<String>,

    /// Plain text body
    #[schema(example = "3 new tasters this week")]
    #[serde(default)]
    pub text: Option<String>,

    /// HTML body
    #[serde(default)]
    pub html: Option<String>,
}

impl NotificationRequest {
    /// Parses a request from a raw JSON body
    pub fn from_slice(body: &[u8]) -> Result<Self, RequestError> {
        let value: serde_json::Value = serde_json::from_slice(body)?;

        if !value.is_object() {
            return Err(RequestError::NotAnObject);
        }

        Ok(serde_json::from_value(value)?)
    }
}
