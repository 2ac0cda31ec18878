//! Cron timer driving the report forwarder

use std::{fmt, str::FromStr, sync::Arc};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use cron::Schedule;
use tracing::{debug, info, warn};

use crate::{
    domain::reports::{ReportForwarder, ReportGenerator, ReportTarget},
    infrastructure::http::shutdown_signal,
};

/// Scheduled report configuration
#[derive(Clone, Parser)]
pub struct CronConfig {
    /// The report generator URL
    #[arg(long = "cron-url", env = "RENDER_CRON_URL")]
    pub url: Option<String>,

    /// The shared secret sent to the report generator
    #[arg(long = "cron-token", env = "RENDER_CRON_TOKEN")]
    pub token: Option<String>,

    /// Cron expression (UTC, seconds first)
    #[arg(long = "cron-schedule", env = "RENDER_CRON_SCHEDULE", default_value = "0 0 6 * * *")]
    pub schedule: String,

    /// Request timeout in seconds
    #[arg(long = "cron-timeout", env = "RENDER_CRON_TIMEOUT", default_value = "30")]
    pub timeout: u64,
}

impl CronConfig {
    /// The forwarder target described by this configuration
    pub fn target(&self) -> ReportTarget {
        ReportTarget {
            url: self.url.clone(),
            token: self.token.clone(),
        }
    }
}

impl fmt::Debug for CronConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CronConfig")
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "[redacted]"))
            .field("schedule", &self.schedule)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Fires the report forwarder on a cron schedule
pub struct ReportScheduler<G: ReportGenerator> {
    schedule: Schedule,
    forwarder: Arc<ReportForwarder<G>>,
}

impl<G: ReportGenerator> ReportScheduler<G> {
    /// Creates a scheduler from a cron expression
    pub fn new(expression: &str, forwarder: Arc<ReportForwarder<G>>) -> Result<Self> {
        let schedule = Schedule::from_str(expression)
            .with_context(|| format!("invalid cron schedule \"{expression}\""))?;

        Ok(Self {
            schedule,
            forwarder,
        })
    }

    /// The first fire strictly after `after`
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }

    /// Runs until a shutdown signal arrives. Each fire runs as its own task.
    #[mutants::skip]
    pub async fn run(self) -> Result<()> {
        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        let mut after = Utc::now();

        loop {
            let Some(next) = self.next_after(after) else {
                warn!(schedule = %self.schedule, "cron schedule will never fire");
                return Ok(());
            };

            debug!(%next, "next scheduled report");

            let wait = (next - Utc::now()).to_std().unwrap_or_default();

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = &mut shutdown => {
                    info!("Shutting down report scheduler");
                    return Ok(());
                }
            }

            let forwarder = self.forwarder.clone();
            tokio::spawn(async move {
                forwarder.forward().await;
            });

            after = next.max(Utc::now());
        }
    }
}

impl<G: ReportGenerator> fmt::Debug for ReportScheduler<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportScheduler")
            .field("schedule", &self.schedule.to_string())
            .field("forwarder", &self.forwarder)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use testresult::TestResult;

    use crate::infrastructure::reports::HttpReportGenerator;

    use super::*;

    fn forwarder() -> Result<Arc<ReportForwarder<HttpReportGenerator>>> {
        Ok(Arc::new(ReportForwarder::new(
            Arc::new(HttpReportGenerator::new(5)?),
            ReportTarget::default(),
        )))
    }

    #[test]
    fn test_next_fire() -> TestResult {
        let scheduler = ReportScheduler::new("0 0 6 * * *", forwarder()?)?;
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 7, 0, 0).unwrap();

        assert_eq!(
            scheduler.next_after(now),
            Some(Utc.with_ymd_and_hms(2026, 10, 20, 6, 0, 0).unwrap())
        );

        Ok(())
    }

    #[test]
    fn test_invalid_schedule() -> TestResult {
        let result = ReportScheduler::new("every morning", forwarder()?);

        assert!(result.is_err());

        Ok(())
    }

    #[test]
    fn test_config_debug_redacts_token() {
        let config = CronConfig {
            url: Some("https://app.example.com/cron".to_string()),
            token: Some("cron-secret".to_string()),
            schedule: "0 0 6 * * *".to_string(),
            timeout: 30,
        };

        assert!(!format!("{config:?}").contains("cron-secret"));
        assert_eq!(config.target().token.as_deref(), Some("cron-secret"));
    }
}
