//! Construction and injection for objects that live outside the registry.

use std::fmt;
use std::sync::Arc;

use crate::context::ContextNode;
use crate::contracts::ComponentLookupExt;
use crate::errors::ContextError;
use crate::injection::{inject_capabilities, Capability, Injectable, InjectionRecord};

/// Handle returned by [`ContextNode::autowire_capable_factory`]. Every call
/// re-checks the owning context's lifecycle, so a retained factory stops
/// working once the context closes.
#[derive(Clone)]
pub struct AutowireFactory {
    node: Arc<ContextNode>,
}

impl fmt::Debug for AutowireFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutowireFactory")
            .field("context", &self.node.display_name())
            .finish()
    }
}

impl AutowireFactory {
    pub(crate) fn new(node: Arc<ContextNode>) -> Self {
        Self { node }
    }

    pub fn context(&self) -> &Arc<ContextNode> {
        &self.node
    }

    /// Run the injection protocol on `target`. Each call starts a fresh
    /// record, so callers own the at-most-once guarantee for their instance.
    pub fn initialize(&self, target: &dyn Injectable) -> Result<Vec<Capability>, ContextError> {
        self.node.gate().ensure_active("initialize external object")?;
        let record = InjectionRecord::default();
        let injected = inject_capabilities(target, &record, &self.node.capability_source())?;
        tracing::debug!(
            context = %self.node.display_name(),
            capabilities = ?injected,
            "external object initialized"
        );
        Ok(injected)
    }

    pub fn resolve<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>, ContextError> {
        self.node.gate().ensure_active("resolve dependency")?;
        self.node.get_by_type::<T>()
    }

    pub fn resolve_named<T: ?Sized + Send + Sync + 'static>(
        &self,
        name: &str,
    ) -> Result<Arc<T>, ContextError> {
        self.node.gate().ensure_active("resolve dependency")?;
        self.node.get::<T>(name)
    }

    /// Build with `build`, which may resolve dependencies through the
    /// factory, then initialize the result.
    pub fn create<T, F>(&self, build: F) -> Result<Arc<T>, ContextError>
    where
        T: Injectable + 'static,
        F: FnOnce(&AutowireFactory) -> Result<T, ContextError>,
    {
        self.node.gate().ensure_active("create object")?;
        let object = Arc::new(build(self)?);
        self.initialize(object.as_ref())?;
        Ok(object)
    }
}
