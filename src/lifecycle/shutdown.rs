//! Signal handling for graceful shutdown

use anyhow::{Context, Result};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tracing::debug;

/// Resolves on SIGTERM, SIGINT, or an explicit `trigger`
#[derive(Debug, Default)]
pub struct ShutdownSignal {
    manual: Notify,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown from inside the process
    pub fn trigger(&self) {
        self.manual.notify_one();
    }

    /// Wait for a shutdown signal
    pub async fn wait(&self) -> Result<()> {
        let mut sigterm =
            signal(SignalKind::terminate()).context("failed to register SIGTERM handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("failed to register SIGINT handler")?;

        tokio::select! {
            _ = sigterm.recv() => {
                debug!("received SIGTERM");
            }
            _ = sigint.recv() => {
                debug!("received SIGINT");
            }
            _ = self.manual.notified() => {
                debug!("shutdown triggered");
            }
        }
        Ok(())
    }
}
