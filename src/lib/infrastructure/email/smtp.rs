//! SMTP email service implementation

use std::{error::Error as _, fmt, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use lettre::{
    transport::smtp::{
        self,
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
    AsyncSmtpTransport, AsyncTransport, Tokio1Executor,
};
use tracing::debug;

use crate::domain::notifications::{Mailer, MailerError, OutboundMessage};

/// SMTP configuration
#[derive(Clone, Parser)]
pub struct SMTPConfig {
    /// The SMTP host
    #[clap(long = "smtp-host", env = "SMTP_HOST")]
    pub host: String,

    /// The SMTP port
    #[clap(long = "smtp-port", env = "SMTP_PORT", default_value = "587")]
    pub port: u16,

    /// The SMTP username
    #[clap(long = "smtp-user", env = "SMTP_USER")]
    pub username: Option<String>,

    /// The SMTP password
    #[clap(long = "smtp-password", env = "SMTP_PASSWORD")]
    pub password: Option<String>,

    /// Verify the TLS certificate
    #[clap(long = "smtp-verify-tls", env = "SMTP_VERIFY_TLS", default_value = "true")]
    pub verify_tls: bool,

    /// Enable STARTTLS (TLS upgrade on connection)
    #[clap(long = "smtp-starttls", env = "SMTP_STARTTLS", default_value = "true")]
    pub starttls: bool,

    /// Timeout for each SMTP command, in seconds
    #[clap(long = "smtp-timeout", env = "SMTP_TIMEOUT", default_value = "10")]
    pub timeout: u64,
}

impl fmt::Debug for SMTPConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SMTPConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[redacted]"))
            .field("verify_tls", &self.verify_tls)
            .field("starttls", &self.starttls)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// SMTP mailer
#[derive(Clone)]
pub struct SMTPMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    host: String,
}

impl SMTPMailer {
    /// Create a new SMTP mailer. No connection is made until the first send.
    pub fn new(config: SMTPConfig) -> Result<Self> {
        let tls = TlsParameters::builder(config.host.clone())
            .dangerous_accept_invalid_certs(!config.verify_tls)
            .build()?;

        let mut builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
                .tls(Tls::Required(tls))
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?.tls(Tls::Wrapper(tls))
        };

        builder = builder
            .port(config.port)
            .timeout(Some(Duration::from_secs(config.timeout)));

        if let (Some(username), Some(password)) = (config.username, config.password) {
            builder = builder.credentials(Credentials::new(username, password));
        }

        Ok(Self {
            transport: builder.build(),
            host: config.host,
        })
    }
}

impl fmt::Debug for SMTPMailer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SMTPMailer")
            .field("host", &self.host)
            .finish()
    }
}

#[async_trait]
impl Mailer for SMTPMailer {
    async fn send(&self, message: OutboundMessage) -> Result<(), MailerError> {
        debug!(
            host = %self.host,
            message_id = %message.message_id,
            "submitting message to relay"
        );

        self.transport.send(message.message).await?;

        Ok(())
    }
}

impl From<smtp::Error> for MailerError {
    fn from(err: smtp::Error) -> Self {
        if err.is_timeout() {
            MailerError::Timeout(err.to_string())
        } else if err.is_transient() || err.is_permanent() {
            MailerError::Rejected {
                code: err.status().map(|code| code.to_string()),
                message: err.to_string(),
            }
        } else {
            MailerError::Transport {
                message: err.to_string(),
                cause: err.source().map(ToString::to_string),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    fn config() -> SMTPConfig {
        SMTPConfig {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: Some("user".to_string()),
            password: Some("hunter2".to_string()),
            verify_tls: true,
            starttls: true,
            timeout: 10,
        }
    }

    #[test]
    fn test_config_debug_redacts_password() {
        let debug = format!("{:?}", config());

        assert!(!debug.contains("hunter2"));
    }

    #[tokio::test]
    async fn test_new_does_not_connect() -> TestResult {
        let mailer = SMTPMailer::new(SMTPConfig {
            starttls: false,
            port: 465,
            ..config()
        })?;

        assert_eq!(format!("{mailer:?}"), r#"SMTPMailer { host: "smtp.example.com" }"#);

        Ok(())
    }
}
