//! Notification delivery service

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tracing::{error, info, warn};

#[cfg(test)]
use mockall::mock;

use super::{
    diagnostics,
    errors::DeliveryError,
    mailer::Mailer,
    message::{DeliveryConfig, ResolvedMessage},
    request::NotificationRequest,
};

/// A successful delivery
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    /// The owner address the message went to
    pub to: String,

    /// The attempt that succeeded, starting at 1
    pub attempt: u32,
}

/// Bounded retry with linear backoff.
///
/// After failed attempt `n` the service waits `n * backoff_step` before the
/// next one. No wait follows the final attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff_step: Duration,
}

impl RetryPolicy {
    /// Create a retry policy; at least one attempt is always made
    pub fn new(max_attempts: u32, backoff_step: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_step,
        }
    }

    /// Total number of attempts
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// The wait after a failed `attempt`, or `None` when it was the last one
    pub fn backoff_after(&self, attempt: u32) -> Option<Duration> {
        (attempt < self.max_attempts).then(|| self.backoff_step * attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(250))
    }
}

/// Notification service
#[async_trait]
pub trait NotificationService: Clone + Send + Sync + 'static {
    /// Delivers a notification to the owner.
    ///
    /// # Arguments
    /// * `request` - The parsed [`NotificationRequest`].
    ///
    /// # Returns
    /// - [`Ok`] with a [`Delivery`] naming the attempt that succeeded.
    /// - [`Err`] with [`DeliveryError::MissingRequiredFields`] before any attempt
    ///   is made, or [`DeliveryError::SendFailed`] once every attempt failed or
    ///   one failed permanently.
    async fn deliver(&self, request: &NotificationRequest) -> Result<Delivery, DeliveryError>;
}

#[cfg(test)]
mock! {
    pub NotificationService {}

    impl Clone for NotificationService {
        fn clone(&self) -> Self;
    }

    #[async_trait]
    impl NotificationService for NotificationService {
        async fn deliver(&self, request: &NotificationRequest) -> Result<Delivery, DeliveryError>;
    }
}

/// Notification service implementation
#[derive(Debug, Clone)]
pub struct NotificationServiceImpl<M>
where
    M: Mailer,
{
    mailer: Arc<M>,
    config: DeliveryConfig,
    retry: RetryPolicy,
}

impl<M> NotificationServiceImpl<M>
where
    M: Mailer,
{
    /// Creates a new notification service.
    pub fn new(mailer: Arc<M>, config: DeliveryConfig, retry: RetryPolicy) -> Self {
        Self {
            mailer,
            config,
            retry,
        }
    }
}

#[async_trait]
impl<M> NotificationService for NotificationServiceImpl<M>
where
    M: Mailer,
{
    async fn deliver(&self, request: &NotificationRequest) -> Result<Delivery, DeliveryError> {
        let message = ResolvedMessage::resolve(request, &self.config)?;
        let max_attempts = self.retry.max_attempts();
        let mut detail = String::from(diagnostics::UNKNOWN_ERROR);

        for attempt in 1..=max_attempts {
            let sent = match message.compose() {
                Ok(outbound) => {
                    let message_id = outbound.message_id.clone();
                    self.mailer.send(outbound).await.map(|()| message_id)
                }
                Err(err) => Err(err),
            };

            match sent {
                Ok(message_id) => {
                    info!(
                        attempt,
                        to = %message.to(),
                        message_id = %message_id,
                        "notification delivered"
                    );

                    return Ok(Delivery {
                        to: message.to().to_string(),
                        attempt,
                    });
                }
                Err(err) => {
                    detail = diagnostics::normalize(&err.diagnostic());

                    if !err.is_transient() {
                        error!(attempt, error = %detail, "delivery failed permanently");

                        return Err(DeliveryError::SendFailed {
                            attempts: attempt,
                            detail,
                        });
                    }

                    warn!(attempt, max_attempts, error = %detail, "delivery attempt failed");

                    if let Some(backoff) = self.retry.backoff_after(attempt) {
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        }

        error!(attempts = max_attempts, error = %detail, "delivery failed");

        Err(DeliveryError::SendFailed {
            attempts: max_attempts,
            detail,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicU32, Ordering},
        Mutex,
    };

    use testresult::TestResult;
    use tokio::time::Instant;

    use crate::domain::notifications::{
        errors::MissingField, mailer::MailerError, tests::MockMailer,
    };

    use super::*;

    fn config() -> DeliveryConfig {
        DeliveryConfig {
            owner_email: Some("owner@example.com".to_string()),
            default_from: Some("Tasterist <noreply@example.com>".to_string()),
        }
    }

    fn request() -> NotificationRequest {
        NotificationRequest {
            from: Some("caller@example.com".to_string()),
            subject: Some("Weekly report".to_string()),
            text: Some("hello".to_string()),
            html: None,
        }
    }

    fn timeout() -> MailerError {
        MailerError::Timeout("took too long".to_string())
    }

    fn service(mailer: MockMailer) -> NotificationServiceImpl<MockMailer> {
        NotificationServiceImpl::new(Arc::new(mailer), config(), RetryPolicy::default())
    }

    #[test]
    fn test_retry_policy_backoff() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.backoff_after(1), Some(Duration::from_millis(250)));
        assert_eq!(policy.backoff_after(2), Some(Duration::from_millis(500)));
        assert_eq!(policy.backoff_after(3), None);
    }

    #[test]
    fn test_retry_policy_makes_at_least_one_attempt() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(), 1);
    }

    #[tokio::test]
    async fn test_deliver_first_attempt() -> TestResult {
        let mut mailer = MockMailer::new();

        mailer
            .expect_send()
            .times(1)
            .withf(|message| {
                message.to == "owner@example.com" && message.from == "noreply@example.com"
            })
            .returning(|_| Ok(()));

        let delivery = service(mailer).deliver(&request()).await?;

        assert_eq!(
            delivery,
            Delivery {
                to: "owner@example.com".to_string(),
                attempt: 1
            }
        );

        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_deliver_retries_with_linear_backoff() -> TestResult {
        let calls = Arc::new(AtomicU32::new(0));
        let sent_at = Arc::new(Mutex::new(Vec::new()));
        let message_ids = Arc::new(Mutex::new(Vec::new()));

        let mut mailer = MockMailer::new();

        {
            let calls = calls.clone();
            let sent_at = sent_at.clone();
            let message_ids = message_ids.clone();

            mailer.expect_send().times(3).returning(move |message| {
                sent_at.lock().unwrap().push(Instant::now());
                message_ids.lock().unwrap().push(message.message_id.clone());

                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(timeout())
                } else {
                    Ok(())
                }
            });
        }

        let delivery = service(mailer).deliver(&request()).await?;

        assert_eq!(delivery.attempt, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let sent_at = sent_at.lock().unwrap();
        assert_eq!(sent_at[1] - sent_at[0], Duration::from_millis(250));
        assert_eq!(sent_at[2] - sent_at[1], Duration::from_millis(500));

        let message_ids = message_ids.lock().unwrap();
        assert_ne!(message_ids[0], message_ids[1], "message must be rebuilt per attempt");
        assert_ne!(message_ids[1], message_ids[2], "message must be rebuilt per attempt");

        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_deliver_exhausts_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut mailer = MockMailer::new();

        {
            let calls = calls.clone();

            mailer.expect_send().times(3).returning(move |_| {
                let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;

                Err(MailerError::Transport {
                    message: format!("attempt {attempt} failed"),
                    cause: None,
                })
            });
        }

        let start = Instant::now();
        let result = service(mailer).deliver(&request()).await;

        assert_eq!(start.elapsed(), Duration::from_millis(750));

        match result {
            Err(DeliveryError::SendFailed { attempts, detail }) => {
                assert_eq!(attempts, 3);
                assert_eq!(detail, "TransportError: attempt 3 failed");
            }
            other => panic!("expected send failure, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_rejection_is_not_retried() {
        let mut mailer = MockMailer::new();

        mailer.expect_send().times(1).returning(|_| {
            Err(MailerError::Rejected {
                code: Some("550".to_string()),
                message: "mailbox unavailable".to_string(),
            })
        });

        let start = Instant::now();
        let result = service(mailer).deliver(&request()).await;

        assert_eq!(start.elapsed(), Duration::ZERO);

        match result {
            Err(DeliveryError::SendFailed { attempts, detail }) => {
                assert_eq!(attempts, 1);
                assert_eq!(detail, r#"RejectedError: mailbox unavailable: props={"code":"550"}"#);
            }
            other => panic!("expected send failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unparseable_sender_makes_no_attempt() {
        let mut mailer = MockMailer::new();
        mailer.expect_send().times(0);

        let service = NotificationServiceImpl::new(
            Arc::new(mailer),
            DeliveryConfig {
                default_from: None,
                ..config()
            },
            RetryPolicy::default(),
        );

        let request = NotificationRequest {
            from: Some("Bob".to_string()),
            ..request()
        };

        let result = service.deliver(&request).await;

        assert!(matches!(
            result,
            Err(DeliveryError::MissingRequiredFields(fields)) if fields == vec![MissingField::From]
        ));
    }

    #[tokio::test]
    async fn test_missing_fields_make_no_attempt() {
        let mut mailer = MockMailer::new();
        mailer.expect_send().times(0);

        let request = NotificationRequest {
            subject: None,
            text: None,
            html: None,
            ..request()
        };

        let result = service(mailer).deliver(&request).await;

        assert!(matches!(
            result,
            Err(DeliveryError::MissingRequiredFields(fields))
                if fields == vec![MissingField::Subject, MissingField::Body]
        ));
    }

    #[tokio::test]
    async fn test_unconfigured_owner_makes_no_attempt() {
        let mut mailer = MockMailer::new();
        mailer.expect_send().times(0);

        let service = NotificationServiceImpl::new(
            Arc::new(mailer),
            DeliveryConfig {
                owner_email: None,
                ..config()
            },
            RetryPolicy::default(),
        );

        let result = service.deliver(&request()).await;

        assert!(matches!(
            result,
            Err(DeliveryError::MissingRequiredFields(fields))
                if fields == vec![MissingField::OwnerEmail]
        ));
    }
}
