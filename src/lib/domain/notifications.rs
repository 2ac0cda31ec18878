//! Notification delivery to the owner's mailbox.

pub mod diagnostics;

mod errors;
mod mailer;
mod message;
mod request;
mod service;

pub use errors::{DeliveryError, MissingField, RequestError};
pub use mailer::{Mailer, MailerError};
pub use message::{DeliveryConfig, OutboundMessage, ResolvedMessage};
pub use request::NotificationRequest;
pub use service::{Delivery, NotificationService, NotificationServiceImpl, RetryPolicy};
