//! Application state module

use std::{fmt, sync::Arc};

use chrono::{DateTime, Utc};

use crate::{domain::notifications::NotificationService, infrastructure::http::WebhookConfig};

/// Application configuration
#[derive(Clone)]
pub struct AppConfig {
    /// Name reported by the status endpoint
    pub service_name: String,

    /// Shared secret for the webhook; `None` rejects every request
    pub webhook_token: Option<String>,

    /// Whether an owner address is configured
    pub owner_email_configured: bool,

    /// Whether a default sender is configured
    pub default_from_configured: bool,
}

impl From<&WebhookConfig> for AppConfig {
    fn from(config: &WebhookConfig) -> Self {
        let present = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.trim().is_empty());

        Self {
            service_name: config.service_name.clone(),
            webhook_token: config.webhook_token.clone().filter(|token| !token.is_empty()),
            owner_email_configured: present(&config.owner_email),
            default_from_configured: present(&config.default_from),
        }
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("service_name", &self.service_name)
            .field("webhook_token", &self.webhook_token.as_ref().map(|_| "[redacted]"))
            .field("owner_email_configured", &self.owner_email_configured)
            .field("default_from_configured", &self.default_from_configured)
            .finish()
    }
}

/// Global application state
#[derive(Clone)]
pub struct AppState<N: NotificationService> {
    /// The time the server started
    pub start_time: DateTime<Utc>,

    /// The application configuration
    pub config: AppConfig,

    /// Notification service
    pub notifications: Arc<N>,
}

/// Implementation of the application state
impl<N> AppState<N>
where
    N: NotificationService,
{
    /// Create a new application state
    pub fn new(config: AppConfig, notifications: N) -> Self {
        Self {
            config,
            start_time: Utc::now(),
            notifications: Arc::new(notifications),
        }
    }
}

impl<N> fmt::Debug for AppState<N>
where
    N: NotificationService,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("start_time", &self.start_time)
            .field("config", &self.config)
            .field("notifications", &"NotificationService")
            .finish()
    }
}

#[cfg(test)]
use crate::domain::notifications::tests::MockNotificationService;

#[cfg(test)]
pub const TEST_TOKEN: &str = "s3cret-webhook-token";

#[cfg(test)]
pub fn test_config() -> AppConfig {
    AppConfig {
        service_name: "tasterist-notifier".to_string(),
        webhook_token: Some(TEST_TOKEN.to_string()),
        owner_email_configured: true,
        default_from_configured: false,
    }
}

#[cfg(test)]
pub fn test_state(
    notifications: Option<MockNotificationService>,
) -> AppState<MockNotificationService> {
    let notifications = notifications
        .map(Arc::new)
        .unwrap_or_else(|| Arc::new(MockNotificationService::new()));

    AppState {
        start_time: Utc::now(),
        config: test_config(),
        notifications,
    }
}
