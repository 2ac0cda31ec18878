//! Message resolution and composition

use lazy_static::lazy_static;
use lettre::{
    message::{Mailbox, MultiPart},
    Address, Message,
};
use regex::Regex;
use uuid::Uuid;

use super::{
    errors::{DeliveryError, MissingField},
    mailer::MailerError,
    request::NotificationRequest,
};

lazy_static! {
    static ref ANGLE_ADDRESS: Regex = Regex::new(r"<([^<>]*)>").unwrap();
}

/// Trusted routing configuration
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeliveryConfig {
    /// The only address notifications are ever delivered to
    pub owner_email: Option<String>,

    /// Sender used instead of the caller's `from` when set
    pub default_from: Option<String>,
}

/// A validated message, ready to be composed.
///
/// The recipient is always the configured owner address.
#[derive(Clone, Debug)]
pub struct ResolvedMessage {
    from: Mailbox,
    to: Address,
    subject: String,
    text: String,
    html: String,
}

/// A composed message, consumed by a single send attempt
#[derive(Clone, Debug)]
pub struct OutboundMessage {
    /// Envelope sender
    pub from: String,

    /// Envelope recipient
    pub to: String,

    /// `Message-ID` header value
    pub message_id: String,

    /// The multipart/alternative message
    pub message: Message,
}

impl ResolvedMessage {
    /// Validates a request against the routing configuration.
    ///
    /// Every missing field is reported at once. A sender or owner address
    /// that does not parse counts as missing. The recipient is taken from
    /// `config` only; the request has no way to influence it.
    pub fn resolve(
        request: &NotificationRequest,
        config: &DeliveryConfig,
    ) -> Result<Self, DeliveryError> {
        let mut missing = Vec::new();

        let from = non_blank(config.default_from.as_deref())
            .or_else(|| non_blank(request.from.as_deref()))
            .map(strip_control)
            .and_then(|header| parse_mailbox(&header));
        if from.is_none() {
            missing.push(MissingField::From);
        }

        let subject = request
            .subject
            .as_deref()
            .map(strip_control)
            .unwrap_or_default();
        if subject.is_empty() {
            missing.push(MissingField::Subject);
        }

        let text = request.text.clone().unwrap_or_default();
        let html = request.html.clone().unwrap_or_default();
        if text.trim().is_empty() && html.trim().is_empty() {
            missing.push(MissingField::Body);
        }

        let to = config
            .owner_email
            .as_deref()
            .and_then(|owner| owner.trim().to_lowercase().parse::<Address>().ok());
        if to.is_none() {
            missing.push(MissingField::OwnerEmail);
        }

        let (Some(from), Some(to)) = (from, to) else {
            return Err(DeliveryError::MissingRequiredFields(missing));
        };

        if !missing.is_empty() {
            return Err(DeliveryError::MissingRequiredFields(missing));
        }

        let html = if html.trim().is_empty() {
            format!("<pre>{}</pre>", escape_html(&text))
        } else {
            html
        };

        Ok(Self {
            from,
            to,
            subject,
            text,
            html,
        })
    }

    /// The owner address
    pub fn to(&self) -> &str {
        self.to.as_ref()
    }

    /// Bare sender address
    pub fn from_address(&self) -> &str {
        self.from.email.as_ref()
    }

    /// Sender display name, if any
    pub fn from_name(&self) -> Option<&str> {
        self.from.name.as_deref()
    }

    /// Sanitized subject
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Plain text body
    pub fn text(&self) -> &str {
        &self.text
    }

    /// HTML body, synthesized from the text when none was given
    pub fn html(&self) -> &str {
        &self.html
    }

    /// Builds a fresh multipart/alternative message.
    ///
    /// Every call gets its own `Message-ID`, `Date` and boundary.
    pub fn compose(&self) -> Result<OutboundMessage, MailerError> {
        let message_id = format!("<{}@{}>", Uuid::now_v7(), self.message_id_domain());

        let message = Message::builder()
            .from(self.from.clone())
            .to(Mailbox::new(None, self.to.clone()))
            .subject(self.subject.clone())
            .message_id(Some(message_id.clone()))
            .date_now()
            .multipart(MultiPart::alternative_plain_html(
                self.text.clone(),
                self.html.clone(),
            ))?;

        Ok(OutboundMessage {
            from: self.from_address().to_string(),
            to: self.to().to_string(),
            message_id,
            message,
        })
    }

    fn message_id_domain(&self) -> &str {
        self.from.email.domain()
    }
}

/// Extracts the bare, lower-cased address from a header value.
///
/// `Name <Addr@Example.com>` gives `addr@example.com`; a value without angle
/// brackets is used whole.
pub fn extract_address(header: &str) -> String {
    let address = ANGLE_ADDRESS
        .captures(header)
        .and_then(|captures| captures.get(1))
        .map_or(header, |address| address.as_str());

    address.trim().to_lowercase()
}

fn parse_mailbox(header: &str) -> Option<Mailbox> {
    let address = extract_address(header).parse::<Address>().ok()?;

    let name = header
        .find('<')
        .map(|index| header[..index].trim().trim_matches('"').trim())
        .filter(|name| !name.is_empty())
        .map(ToString::to_string);

    Some(Mailbox::new(name, address))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}

fn strip_control(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());

    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }

    escaped
}
