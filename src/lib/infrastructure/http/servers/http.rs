//! Plain HTTP server

use std::{
    future::Future,
    net::{SocketAddr, TcpListener},
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::Router;
use axum_server::Handle;
use tracing::{info, warn};

use crate::{
    domain::notifications::NotificationService,
    infrastructure::http::{router, shutdown_on, shutdown_signal, state::AppState, Server},
};

/// The webhook served over plain HTTP
#[derive(Debug)]
pub struct HttpServer {
    router: Router,
    listener: TcpListener,
}

impl HttpServer {
    /// Binds `address` and builds the router around `state`.
    pub async fn new<N: NotificationService>(
        address: SocketAddr,
        state: AppState<N>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(address)
            .with_context(|| format!("failed to listen on {address}"))?;

        listener
            .set_nonblocking(true)
            .context("failed to set listener to non-blocking")?;

        Ok(Self {
            router: router(state),
            listener,
        })
    }

    /// The bound address
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("failed to get local address")
    }

    /// Serves until `signal` resolves, then lets in-flight requests finish.
    pub async fn serve_until<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = Handle::new();
        shutdown_on(handle.clone(), signal);

        axum_server::from_tcp(self.listener)
            .handle(handle)
            .serve(self.router.into_make_service())
            .await
            .context("server error")?;

        info!("HTTP server stopped");

        Ok(())
    }
}

#[async_trait]
impl Server for HttpServer {
    #[mutants::skip]
    async fn run(self) -> Result<()> {
        info!(address = %self.local_addr()?, "HTTP server listening");
        warn!("serving without TLS, bearer tokens travel in plain text");

        self.serve_until(shutdown_signal()).await
    }
}
