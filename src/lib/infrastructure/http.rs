//! HTTP Server

use std::{fmt, future::Future, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use axum::{extract::Request, routing::get, Router};
use axum_server::Handle;
use clap::Parser;
use handlers::{panic_handler, webhook};
use state::AppState;
use tokio::signal;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::{debug, info_span};

use crate::domain::notifications::{DeliveryConfig, NotificationService};

mod errors;
mod handlers;
mod open_api;
pub mod servers;
pub mod state;

/// Configuration for the HTTP server.
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
pub struct HttpServerConfig {
    /// The port to listen on
    #[arg(long = "http-port", env = "HTTP_PORT", default_value = "3000")]
    pub port: u16,

    /// TLS certificate (PEM); HTTPS is served when set together with the key
    #[arg(long = "tls-cert-path", env = "TLS_CERT_PATH")]
    pub cert_path: Option<String>,

    /// TLS private key (PEM)
    #[arg(long = "tls-key-path", env = "TLS_KEY_PATH")]
    pub key_path: Option<String>,
}

impl HttpServerConfig {
    /// Certificate and key paths, when both are configured
    pub fn tls_paths(&self) -> Option<(&str, &str)> {
        match (&self.cert_path, &self.key_path) {
            (Some(cert), Some(key)) => Some((cert, key)),
            _ => None,
        }
    }
}

/// Webhook and routing configuration
#[derive(Clone, Parser)]
pub struct WebhookConfig {
    /// Shared secret expected as `Authorization: Bearer <token>`
    #[arg(long = "webhook-token", env = "WEBHOOK_TOKEN")]
    pub webhook_token: Option<String>,

    /// The only recipient notifications are delivered to
    #[arg(long = "owner-email", env = "OWNER_EMAIL")]
    pub owner_email: Option<String>,

    /// Sender used in place of the caller's `from`
    #[arg(long = "default-from", env = "DEFAULT_FROM")]
    pub default_from: Option<String>,

    /// Service name reported by the status endpoint
    #[arg(long = "service-name", env = "SERVICE_NAME", default_value = "tasterist-notifier")]
    pub service_name: String,
}

impl WebhookConfig {
    /// The trusted routing configuration for the delivery service
    pub fn delivery(&self) -> DeliveryConfig {
        DeliveryConfig {
            owner_email: self.owner_email.clone(),
            default_from: self.default_from.clone(),
        }
    }
}

impl fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("webhook_token", &self.webhook_token.as_ref().map(|_| "[redacted]"))
            .field("owner_email", &self.owner_email)
            .field("default_from", &self.default_from)
            .field("service_name", &self.service_name)
            .finish()
    }
}

/// A runnable server
#[async_trait]
pub trait Server {
    /// Serves until a shutdown signal arrives
    async fn run(self) -> Result<()>;
}

/// Create the application's router
pub fn router<N: NotificationService>(state: AppState<N>) -> Router {
    let trace_layer = TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
        let uri = request.uri().to_string();
        info_span!("http_request", method = ?request.method(), uri)
    });

    Router::new()
        .route(
            "/",
            get(webhook::status)
                .post(webhook::deliver)
                .fallback(webhook::method_not_allowed),
        )
        .route("/openapi.json", get(open_api::handler))
        .layer(CatchPanicLayer::custom(panic_handler))
        .layer(trace_layer)
        .with_state(state)
}

/// How long in-flight requests may run after a shutdown signal
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Resolves on Ctrl+C or SIGTERM
#[mutants::skip]
pub(crate) async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Starts a graceful shutdown of `handle` once `signal` resolves.
///
/// The server stops accepting connections and in-flight requests get
/// [`SHUTDOWN_GRACE`] to finish.
pub(crate) fn shutdown_on<F>(handle: Handle, signal: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        signal.await;

        debug!("shutting down gracefully");
        handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
    });
}
