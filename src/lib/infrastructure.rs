//! Infrastructure adapters

use anyhow::Result;
use tokio::task::JoinHandle;

pub mod email;
pub mod http;
pub mod reports;
pub mod scheduler;

/// Waits for the server and scheduler tasks.
///
/// Returns as soon as either task fails or panics, so a dead server never
/// leaves the scheduler running on its own.
pub async fn supervise(
    server: JoinHandle<Result<()>>,
    scheduler: JoinHandle<Result<()>>,
) -> Result<()> {
    tokio::try_join!(flatten(server), flatten(scheduler))?;

    Ok(())
}

async fn flatten(handle: JoinHandle<Result<()>>) -> Result<()> {
    handle.await?
}
