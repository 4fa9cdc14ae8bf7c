//! Runtime runner.
//!
//! Shutdown can be driven by OS signals, an external `CancellationToken`,
//! or an arbitrary future.

use std::{future::Future, pin::Pin};

use tokio_util::sync::CancellationToken;

use super::hierarchy::ContextHierarchy;
use super::HostRuntime;

/// How the runtime should decide when to stop.
pub enum ShutdownOptions {
    /// Listen for OS signals (Ctrl+C / SIGTERM).
    Signals,
    /// An external `CancellationToken` controls the lifecycle.
    Token(CancellationToken),
    /// An arbitrary future; when it completes, we initiate shutdown.
    Future(Pin<Box<dyn Future<Output = ()> + Send>>),
}

pub struct RunOptions {
    /// Contexts to refresh, keep active, then close.
    pub hierarchy: ContextHierarchy,
    pub shutdown: ShutdownOptions,
}

/// Full cycle: refresh → wait → close.
pub async fn run(opts: RunOptions) -> anyhow::Result<()> {
    let cancel = match &opts.shutdown {
        ShutdownOptions::Token(t) => t.clone(),
        _ => CancellationToken::new(),
    };

    match opts.shutdown {
        ShutdownOptions::Signals => {
            let c = cancel.clone();
            tokio::spawn(async move {
                match ctxkit_bootstrap::wait_for_shutdown().await {
                    Ok(signal) => {
                        tracing::info!(%signal, "shutdown: signal received");
                    }
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            "shutdown: primary waiter failed; falling back to ctrl_c()"
                        );
                        let _ = tokio::signal::ctrl_c().await;
                    }
                }
                c.cancel();
            });
        }
        ShutdownOptions::Future(waiter) => {
            let c = cancel.clone();
            tokio::spawn(async move {
                waiter.await;
                tracing::info!("shutdown: external future completed");
                c.cancel();
            });
        }
        ShutdownOptions::Token(_) => {
            tracing::info!("shutdown: external token will control lifecycle");
        }
    }

    HostRuntime::new(opts.hierarchy, cancel).run_full_cycle().await
}
