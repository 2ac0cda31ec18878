//! HTTP client for the upstream report generator

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;

use tracing::warn;

use crate::domain::{
    notifications::diagnostics,
    reports::{ReportError, ReportGenerator, ReportResponse, MAX_LOGGED_BODY},
};

/// Header carrying the shared cron secret
pub const CRON_TOKEN_HEADER: &str = "X-Tasterist-Cron-Token";

/// Most bytes of a response body that are read; enough for any
/// [`MAX_LOGGED_BODY`] characters of UTF-8
pub const MAX_BODY_BYTES: usize = MAX_LOGGED_BODY * 4;

/// Calls the report generator over HTTP
#[derive(Clone, Debug)]
pub struct HttpReportGenerator {
    client: Client,
}

impl HttpReportGenerator {
    /// Creates a client whose requests time out after `request_timeout` seconds
    pub fn new(request_timeout: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(request_timeout))
            .build()
            .context("failed to create report generator client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ReportGenerator for HttpReportGenerator {
    async fn generate(&self, url: &str, token: &str) -> Result<ReportResponse, ReportError> {
        let mut response = self
            .client
            .post(url)
            .header(CRON_TOKEN_HEADER, token)
            .send()
            .await
            .map_err(|err| ReportError::Unreachable(diagnostics::normalize_error(&err)))?;

        let status = response.status().as_u16();
        let mut body = Vec::new();

        while body.len() < MAX_BODY_BYTES {
            match response.chunk().await {
                Ok(Some(chunk)) => body.extend_from_slice(&chunk),
                Ok(None) => break,
                Err(err) => {
                    warn!(
                        status,
                        error = %diagnostics::normalize_error(&err),
                        "failed to read report response body"
                    );
                    break;
                }
            }
        }

        body.truncate(MAX_BODY_BYTES);

        Ok(ReportResponse {
            status,
            body: String::from_utf8_lossy(&body).into_owned(),
        })
    }
}
