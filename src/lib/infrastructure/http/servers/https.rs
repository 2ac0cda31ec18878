//! HTTPS server

use std::{future::Future, net::SocketAddr};

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::Router;
use axum_server::{tls_rustls::RustlsConfig, Handle};
use tracing::{debug, info};

use crate::{
    domain::notifications::NotificationService,
    infrastructure::http::{router, shutdown_on, shutdown_signal, state::AppState, Server},
};

/// The webhook served over TLS
#[derive(Debug)]
pub struct HttpsServer {
    router: Router,
    address: SocketAddr,
    tls_config: RustlsConfig,
}

impl HttpsServer {
    /// Loads the PEM certificate and key and builds the router around `state`.
    pub async fn new<N: NotificationService>(
        address: SocketAddr,
        cert_path: &str,
        key_path: &str,
        state: AppState<N>,
    ) -> Result<Self> {
        if rustls::crypto::ring::default_provider()
            .install_default()
            .is_err()
        {
            debug!("rustls crypto provider already installed");
        }

        let tls_config = RustlsConfig::from_pem_file(cert_path, key_path)
            .await
            .with_context(|| format!("failed to load TLS config from {cert_path} and {key_path}"))?;

        Ok(Self {
            router: router(state),
            address,
            tls_config,
        })
    }

    /// Serves until `signal` resolves, then lets in-flight requests finish.
    pub async fn serve_until<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = Handle::new();
        shutdown_on(handle.clone(), signal);

        axum_server::bind_rustls(self.address, self.tls_config)
            .handle(handle)
            .serve(self.router.into_make_service())
            .await
            .context("server error")?;

        info!("HTTPS server stopped");

        Ok(())
    }
}

#[async_trait]
impl Server for HttpsServer {
    #[mutants::skip]
    async fn run(self) -> Result<()> {
        debug!(address = %self.address, "HTTPS server listening");

        self.serve_until(shutdown_signal()).await
    }
}
