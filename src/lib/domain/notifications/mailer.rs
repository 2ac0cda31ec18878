//! Outbound mail capability

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use thiserror::Error;

#[cfg(test)]
use mockall::mock;

use super::message::OutboundMessage;

/// Mailer errors
#[derive(Debug, Error)]
pub enum MailerError {
    /// The message could not be built from its parts
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// The relay answered with an error reply
    #[error("{message}")]
    Rejected {
        /// SMTP reply code, when the relay sent one
        code: Option<String>,

        /// Reply text
        message: String,
    },

    /// The relay did not answer in time
    #[error("{0}")]
    Timeout(String),

    /// Connection, TLS or protocol failure
    #[error("{message}")]
    Transport {
        /// What went wrong
        message: String,

        /// Underlying cause, if any
        cause: Option<String>,
    },
}

impl MailerError {
    /// Short error class name used in diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            MailerError::InvalidMessage(_) => "MessageError",
            MailerError::Rejected { .. } => "RejectedError",
            MailerError::Timeout(_) => "TimeoutError",
            MailerError::Transport { .. } => "TransportError",
        }
    }

    /// Whether another attempt could succeed.
    ///
    /// Malformed messages and 5xx replies fail the same way every time.
    pub fn is_transient(&self) -> bool {
        match self {
            MailerError::InvalidMessage(_) => false,
            MailerError::Rejected { code, .. } => {
                !code.as_deref().is_some_and(|code| code.starts_with('5'))
            }
            MailerError::Timeout(_) | MailerError::Transport { .. } => true,
        }
    }

    /// Describes the error for [`diagnostics::normalize`](super::diagnostics::normalize).
    pub fn diagnostic(&self) -> Value {
        let mut fields = Map::new();
        fields.insert("name".to_string(), json!(self.name()));
        fields.insert("message".to_string(), json!(self.to_string()));

        match self {
            MailerError::Rejected {
                code: Some(code), ..
            } => {
                fields.insert("code".to_string(), json!(code));
            }
            MailerError::Transport {
                cause: Some(cause),
                ..
            } => {
                fields.insert("cause".to_string(), json!(cause));
            }
            _ => {}
        }

        Value::Object(fields)
    }
}

impl From<lettre::error::Error> for MailerError {
    fn from(err: lettre::error::Error) -> Self {
        MailerError::InvalidMessage(err.to_string())
    }
}

/// Sends fully composed messages.
///
/// A message is consumed by its attempt; callers compose a fresh one for
/// every retry.
#[async_trait]
pub trait Mailer: Clone + Send + Sync + 'static {
    /// Submit a message for delivery
    ///
    /// # Arguments
    /// * `message` - The composed [`OutboundMessage`]. The envelope is taken
    ///   from its `From` and `To` headers.
    ///
    /// # Returns
    /// A [`Result`] indicating whether the relay accepted the message.
    async fn send(&self, message: OutboundMessage) -> Result<(), MailerError>;
}

#[cfg(test)]
mock! {
    pub Mailer {}

    impl Clone for Mailer {
        fn clone(&self) -> Self;
    }

    #[async_trait]
    impl Mailer for Mailer {
        async fn send(&self, message: OutboundMessage) -> Result<(), MailerError>;
    }
}
