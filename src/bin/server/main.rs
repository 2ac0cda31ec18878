#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    missing_docs,
    rustdoc::broken_intra_doc_links,
    rustdoc::missing_crate_level_docs
)]

//! Owner-locked notification webhook and scheduled report trigger

use std::{
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
};

use anyhow::Result;
use clap::Parser;
use tasterist_notifier::{
    domain::{
        notifications::{NotificationServiceImpl, RetryPolicy},
        reports::ReportForwarder,
    },
    infrastructure::{
        email::smtp::{SMTPConfig, SMTPMailer},
        http::{
            servers::{http::HttpServer, https::HttpsServer},
            state::{AppConfig, AppState},
            HttpServerConfig, Server, WebhookConfig,
        },
        reports::HttpReportGenerator,
        scheduler::{CronConfig, ReportScheduler},
        supervise,
    },
};
use tracing::{info, warn};

/// Command-line arguments / environment variables
#[derive(Debug, Parser)]
pub struct Args {
    /// The HTTP server configuration
    #[clap(flatten)]
    pub server: HttpServerConfig,

    /// Webhook secret and recipient routing
    #[clap(flatten)]
    pub webhook: WebhookConfig,

    /// SMTP relay
    #[clap(flatten)]
    pub smtp: SMTPConfig,

    /// Scheduled report trigger
    #[clap(flatten)]
    pub cron: CronConfig,
}

#[mutants::skip]
#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Failed to load environment: {}", e);

            return Err(e.into());
        }
    }

    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let config = AppConfig::from(&args.webhook);

    if config.webhook_token.is_none() {
        warn!("WEBHOOK_TOKEN is not set, every delivery request will be rejected");
    }

    if !config.owner_email_configured {
        warn!("OWNER_EMAIL is not set, deliveries will fail with missing_required_fields");
    }

    let mailer = SMTPMailer::new(args.smtp)?;
    let notifications =
        NotificationServiceImpl::new(Arc::new(mailer), args.webhook.delivery(), RetryPolicy::default());

    let state = AppState::new(config, notifications);

    let forwarder = Arc::new(ReportForwarder::new(
        Arc::new(HttpReportGenerator::new(args.cron.timeout)?),
        args.cron.target(),
    ));

    let scheduler = ReportScheduler::new(&args.cron.schedule, forwarder)?;

    info!(schedule = %args.cron.schedule, "report scheduler configured");

    let address = SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), args.server.port);

    let server = match args.server.tls_paths() {
        Some((cert_path, key_path)) => tokio::spawn(
            HttpsServer::new(address, cert_path, key_path, state)
                .await?
                .run(),
        ),
        None => tokio::spawn(HttpServer::new(address, state).await?.run()),
    };

    let scheduler = tokio::spawn(scheduler.run());

    supervise(server, scheduler).await
}
