//! Host Runtime - drives a context hierarchy through refresh → wait → close.

use tokio_util::sync::CancellationToken;

use super::hierarchy::{ContextHierarchy, HierarchyError};

/// Owns a [`ContextHierarchy`] for the lifetime of a host process.
pub struct HostRuntime {
    hierarchy: ContextHierarchy,
    cancel: CancellationToken,
}

impl HostRuntime {
    pub fn new(hierarchy: ContextHierarchy, cancel: CancellationToken) -> Self {
        Self { hierarchy, cancel }
    }

    pub fn hierarchy(&self) -> &ContextHierarchy {
        &self.hierarchy
    }

    /// REFRESH phase: root first, then children in declaration order.
    fn run_refresh_phase(&self) -> Result<(), HierarchyError> {
        tracing::info!("Phase: refresh");
        self.hierarchy.refresh_all()?;
        tracing::info!(
            root = %self.hierarchy.root().display_name(),
            children = self.hierarchy.children().count(),
            "hierarchy active"
        );
        Ok(())
    }

    /// CLOSE phase: children in reverse order, then the root.
    ///
    /// Errors are logged but do not fail the shutdown process.
    fn run_close_phase(&self) {
        tracing::info!("Phase: close");
        self.hierarchy.close_all();
    }

    /// Run the full lifecycle: refresh → wait → close.
    pub async fn run_full_cycle(self) -> anyhow::Result<()> {
        self.run_refresh_phase()?;

        self.cancel.cancelled().await;

        self.run_close_phase();
        Ok(())
    }
}
