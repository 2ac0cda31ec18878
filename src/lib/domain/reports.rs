//! Scheduled report forwarding
//!
//! On every timer fire the forwarder makes a single authenticated call to
//! the upstream report generator and logs the outcome. Nothing is retried;
//! the next fire is the retry.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{error, info, warn};

#[cfg(test)]
use mockall::mock;

/// Longest response body excerpt kept for logging, in characters
pub const MAX_LOGGED_BODY: usize = 300;

/// The report generator's answer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportResponse {
    /// HTTP status code
    pub status: u16,

    /// Response body
    pub body: String,
}

/// Errors raised when the report generator cannot be reached
#[derive(Debug, Error)]
pub enum ReportError {
    /// The request did not produce a response
    #[error("{0}")]
    Unreachable(String),
}

/// Triggers report generation upstream
#[async_trait]
pub trait ReportGenerator: Send + Sync + 'static {
    /// Calls `url`, presenting `token` as the cron credential
    async fn generate(&self, url: &str, token: &str) -> Result<ReportResponse, ReportError>;
}

#[cfg(test)]
mock! {
    pub ReportGenerator {}

    #[async_trait]
    impl ReportGenerator for ReportGenerator {
        async fn generate(&self, url: &str, token: &str) -> Result<ReportResponse, ReportError>;
    }
}

/// Where scheduled report requests go
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ReportTarget {
    /// Report generator URL
    pub url: Option<String>,

    /// Shared secret sent with every request
    pub token: Option<String>,
}

impl fmt::Debug for ReportTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportTarget")
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

/// Why a fire was skipped
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// No report URL configured
    MissingUrl,

    /// No cron token configured
    MissingToken,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingUrl => f.write_str("RENDER_CRON_URL is not configured"),
            SkipReason::MissingToken => f.write_str("RENDER_CRON_TOKEN is not configured"),
        }
    }
}

/// What happened on one timer fire
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// No request was made
    Skipped(SkipReason),

    /// The generator answered; `body` is truncated to [`MAX_LOGGED_BODY`]
    Completed {
        /// HTTP status code
        status: u16,

        /// Truncated response body
        body: String,
    },

    /// The request failed before a response arrived
    Failed(String),
}

/// Forwards timer fires to the report generator
pub struct ReportForwarder<G: ReportGenerator> {
    generator: Arc<G>,
    target: ReportTarget,
}

impl<G: ReportGenerator> ReportForwarder<G> {
    /// Creates a new forwarder
    pub fn new(generator: Arc<G>, target: ReportTarget) -> Self {
        Self { generator, target }
    }

    /// Runs one fire. Never fails; the outcome is logged and returned.
    pub async fn forward(&self) -> ForwardOutcome {
        let url = self.target.url.as_deref().filter(|url| !url.trim().is_empty());
        let token = self
            .target
            .token
            .as_deref()
            .filter(|token| !token.trim().is_empty());

        let (url, token) = match (url, token) {
            (None, _) => return skip(SkipReason::MissingUrl),
            (_, None) => return skip(SkipReason::MissingToken),
            (Some(url), Some(token)) => (url.trim(), token.trim()),
        };

        match self.generator.generate(url, token).await {
            Ok(response) => {
                let body: String = response.body.chars().take(MAX_LOGGED_BODY).collect();

                if (200..300).contains(&response.status) {
                    info!("status={} body={}", response.status, body);
                } else {
                    warn!("status={} body={}", response.status, body);
                }

                ForwardOutcome::Completed {
                    status: response.status,
                    body,
                }
            }
            Err(err) => {
                let ReportError::Unreachable(detail) = err;
                error!(error = %detail, "scheduled report request failed");

                ForwardOutcome::Failed(detail)
            }
        }
    }
}

impl<G: ReportGenerator> fmt::Debug for ReportForwarder<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportForwarder")
            .field("generator", &"ReportGenerator")
            .field("target", &self.target)
            .finish()
    }
}

fn skip(reason: SkipReason) -> ForwardOutcome {
    warn!(%reason, "skipping scheduled report");

    ForwardOutcome::Skipped(reason)
}

#[cfg(test)]
mod tests {
    use std::{
        io,
        sync::{Arc, Mutex},
    };

    use super::*;

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync {
            let logs = self.clone();

            tracing_subscriber::fmt()
                .with_ansi(false)
                .with_writer(move || logs.clone())
                .finish()
        }

        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn target() -> ReportTarget {
        ReportTarget {
            url: Some("https://app.example.com/cron/reports".to_string()),
            token: Some("cron-secret".to_string()),
        }
    }

    #[tokio::test]
    async fn test_missing_url_skips_without_request() {
        let mut generator = MockReportGenerator::new();
        generator.expect_generate().times(0);

        let forwarder = ReportForwarder::new(
            Arc::new(generator),
            ReportTarget {
                url: None,
                ..target()
            },
        );

        assert_eq!(
            forwarder.forward().await,
            ForwardOutcome::Skipped(SkipReason::MissingUrl)
        );
    }

    #[tokio::test]
    async fn test_skip_reason_is_logged() {
        let logs = CapturedLogs::default();
        let _guard = tracing::subscriber::set_default(logs.subscriber());

        let mut generator = MockReportGenerator::new();
        generator.expect_generate().times(0);

        let forwarder = ReportForwarder::new(Arc::new(generator), ReportTarget::default());
        forwarder.forward().await;

        let logs = logs.contents();

        assert!(logs.contains("WARN"), "{logs}");
        assert!(logs.contains("skipping scheduled report"), "{logs}");
        assert!(logs.contains("RENDER_CRON_URL is not configured"), "{logs}");
    }

    #[tokio::test]
    async fn test_completed_outcome_is_logged() {
        let logs = CapturedLogs::default();
        let _guard = tracing::subscriber::set_default(logs.subscriber());

        let mut generator = MockReportGenerator::new();
        generator.expect_generate().times(1).returning(|_, _| {
            Ok(ReportResponse {
                status: 200,
                body: "queued".to_string(),
            })
        });

        ReportForwarder::new(Arc::new(generator), target())
            .forward()
            .await;

        assert!(logs.contents().contains("status=200 body=queued"));
    }

    #[tokio::test]
    async fn test_blank_token_skips_without_request() {
        let mut generator = MockReportGenerator::new();
        generator.expect_generate().times(0);

        let forwarder = ReportForwarder::new(
            Arc::new(generator),
            ReportTarget {
                token: Some("  ".to_string()),
                ..target()
            },
        );

        assert_eq!(
            forwarder.forward().await,
            ForwardOutcome::Skipped(SkipReason::MissingToken)
        );
    }

    #[tokio::test]
    async fn test_forward_calls_generator_once() {
        let mut generator = MockReportGenerator::new();

        generator
            .expect_generate()
            .times(1)
            .withf(|url, token| url == "https://app.example.com/cron/reports" && token == "cron-secret")
            .returning(|_, _| {
                Ok(ReportResponse {
                    status: 200,
                    body: r#"{"ok":true}"#.to_string(),
                })
            });

        let forwarder = ReportForwarder::new(Arc::new(generator), target());

        assert_eq!(
            forwarder.forward().await,
            ForwardOutcome::Completed {
                status: 200,
                body: r#"{"ok":true}"#.to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_forward_truncates_body() {
        let mut generator = MockReportGenerator::new();

        generator.expect_generate().times(1).returning(|_, _| {
            Ok(ReportResponse {
                status: 500,
                body: "x".repeat(1000),
            })
        });

        let forwarder = ReportForwarder::new(Arc::new(generator), target());

        match forwarder.forward().await {
            ForwardOutcome::Completed { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body.len(), MAX_LOGGED_BODY);
            }
            other => panic!("expected completed outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_forward_failure_is_not_raised() {
        let mut generator = MockReportGenerator::new();

        generator
            .expect_generate()
            .times(1)
            .returning(|_, _| Err(ReportError::Unreachable("connection refused".to_string())));

        let forwarder = ReportForwarder::new(Arc::new(generator), target());

        assert_eq!(
            forwarder.forward().await,
            ForwardOutcome::Failed("connection refused".to_string())
        );
    }

    #[test]
    fn test_target_debug_redacts_token() {
        let debug = format!("{:?}", target());

        assert!(!debug.contains("cron-secret"));
        assert!(debug.contains("[redacted]"));
    }
}
