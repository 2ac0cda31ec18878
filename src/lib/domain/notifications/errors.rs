//! Error types for notification delivery

use std::fmt;

use thiserror::Error;

/// A required field that was absent or blank after resolution
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MissingField {
    /// No usable sender address
    From,

    /// Subject was absent or blank
    Subject,

    /// Neither a text nor an HTML body was supplied
    Body,

    /// The owner address is not configured
    OwnerEmail,
}

impl MissingField {
    /// The field name reported to callers
    pub fn as_str(&self) -> &'static str {
        match self {
            MissingField::From => "from",
            MissingField::Subject => "subject",
            MissingField::Body => "text_or_html",
            MissingField::OwnerEmail => "owner_email",
        }
    }
}

impl fmt::Display for MissingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur when reading a notification request body
#[derive(Debug, Error)]
pub enum RequestError {
    /// The body is not valid JSON, or a field has the wrong type
    #[error("invalid JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The body is valid JSON but not an object
    #[error("request body must be a JSON object")]
    NotAnObject,
}

/// Errors that can occur when delivering a notification
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// One or more required fields were missing
    #[error("missing required fields: {}", join_fields(.0))]
    MissingRequiredFields(Vec<MissingField>),

    /// Every attempt failed; `detail` is the diagnostic of the last one
    #[error("delivery failed after {attempts} attempts: {detail}")]
    SendFailed {
        /// How many attempts were made
        attempts: u32,

        /// Normalized diagnostic of the final attempt
        detail: String,
    },
}

fn join_fields(fields: &[MissingField]) -> String {
    fields
        .iter()
        .map(MissingField::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
