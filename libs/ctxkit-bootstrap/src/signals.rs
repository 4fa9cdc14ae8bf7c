use std::fmt;

use anyhow::{Context, Result};
use tokio::signal;

/// Which termination request ended the wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    CtrlC,
    Terminate,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownSignal::CtrlC => f.write_str("Ctrl+C"),
            ShutdownSignal::Terminate => f.write_str("SIGTERM"),
        }
    }
}

/// Wait for Ctrl+C or, on unix, SIGTERM.
pub async fn wait_for_shutdown() -> Result<ShutdownSignal> {
    let signal = tokio::select! {
        res = signal::ctrl_c() => {
            res.context("Failed to install Ctrl+C handler")?;
            ShutdownSignal::CtrlC
        }
        res = terminate() => {
            res?;
            ShutdownSignal::Terminate
        }
    };

    tracing::info!(%signal, "Shutdown signal received, initiating graceful shutdown");
    Ok(signal)
}

#[cfg(unix)]
async fn terminate() -> Result<()> {
    let mut handler = signal::unix::signal(signal::unix::SignalKind::terminate())
        .context("Failed to install SIGTERM handler")?;
    handler.recv().await;
    Ok(())
}

#[cfg(not(unix))]
async fn terminate() -> Result<()> {
    std::future::pending::<()>().await;
    Ok(())
}
