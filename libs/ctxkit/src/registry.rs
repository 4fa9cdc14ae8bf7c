//! Component registry - the per-level directory of managed components.
//!
//! A context owns exactly one registry and never looks into another level's
//! registry directly; hierarchy traversal happens in the context itself.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::component::Component;
use crate::errors::ContextError;

/// Contract every registry backend fulfils for one context level.
pub trait ComponentRegistry: Send + Sync {
    /// Add a component. Names are unique within one registry.
    fn register(&self, component: Component) -> Result<(), ContextError>;

    fn contains(&self, name: &str) -> bool;

    fn get(&self, name: &str) -> Option<Component>;

    /// Component names in registration order.
    fn names(&self) -> Vec<String>;

    /// Components satisfying `predicate`, in registration order.
    fn list_matching(&self, predicate: &dyn Fn(&Component) -> bool) -> Vec<Component>;

    fn len(&self) -> usize {
        self.names().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Release every component, running destruction callbacks in reverse
    /// registration order. The registry is empty afterwards.
    fn destroy(&self);
}

#[derive(Default)]
struct RegistryInner {
    order: Vec<String>,
    entries: HashMap<String, Component>,
}

/// In-memory registry preserving registration order.
#[derive(Default)]
pub struct DefaultRegistry {
    inner: RwLock<RegistryInner>,
}

impl std::fmt::Debug for DefaultRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("DefaultRegistry")
            .field("components", &inner.order)
            .finish()
    }
}

impl DefaultRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ComponentRegistry for DefaultRegistry {
    fn register(&self, component: Component) -> Result<(), ContextError> {
        let mut inner = self.inner.write();
        let name = component.name().to_string();
        if inner.entries.contains_key(&name) {
            return Err(ContextError::DuplicateComponent(name));
        }
        tracing::debug!(component = %name, types = ?component.type_names(), "component registered");
        inner.order.push(name.clone());
        inner.entries.insert(name, component);
        Ok(())
    }

    fn contains(&self, name: &str) -> bool {
        self.inner.read().entries.contains_key(name)
    }

    fn get(&self, name: &str) -> Option<Component> {
        self.inner.read().entries.get(name).cloned()
    }

    fn names(&self) -> Vec<String> {
        self.inner.read().order.clone()
    }

    fn list_matching(&self, predicate: &dyn Fn(&Component) -> bool) -> Vec<Component> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|name| inner.entries.get(name))
            .filter(|c| predicate(*c))
            .cloned()
            .collect()
    }

    fn len(&self) -> usize {
        self.inner.read().order.len()
    }

    fn destroy(&self) {
        // Detach everything under the lock, run callbacks outside of it.
        let (order, mut entries) = {
            let mut inner = self.inner.write();
            let taken = std::mem::take(&mut *inner);
            (taken.order, taken.entries)
        };

        tracing::debug!(count = order.len(), "destroying registry components");
        for name in order.iter().rev() {
            if let Some(component) = entries.remove(name) {
                component.destroy();
            }
        }
    }
}
