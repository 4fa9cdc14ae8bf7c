//! Context node - the hierarchical façade over one component registry and
//! the four capability providers.
//!
//! ```rust,ignore
//! let root = ContextBuilder::new()
//!     .id("root")
//!     .component(ComponentDefinition::new("a", Arc::new(1u32)))
//!     .build()?;
//! root.refresh()?;
//!
//! let child = ContextBuilder::new().parent(root.clone()).build()?;
//! child.refresh()?;
//! assert_eq!(*child.get::<u32>("a")?, 1);
//! ```

mod delegation;
mod lookup;

use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::capabilities::{
    ApplicationEvent, Capabilities, ContextLifecycleEvent, EnvironmentProvider, EventPublisher,
    InMemoryResources, MessageResolver, ResourceResolver, SimpleEventMulticaster,
    StandardEnvironment, StaticMessageSource,
};
use crate::component::{Component, ComponentDefinition};
use crate::errors::{ContextError, InvalidStateReason};
use crate::factory::AutowireFactory;
use crate::injection::{
    inject_capabilities, Capability, CapabilitySource, ContextRef, EnvironmentHandle, Injected,
};
use crate::lifecycle::{LifecycleGate, LifecycleState};
use crate::registry::{ComponentRegistry, DefaultRegistry};

pub struct ContextNode {
    id: Option<String>,
    display_name: String,
    application_name: String,
    parent: Option<Arc<ContextNode>>,
    registry: Box<dyn ComponentRegistry>,
    capabilities: Capabilities,
    gate: LifecycleGate,
    startup_date: OnceLock<DateTime<Utc>>,
    autowire_supported: bool,
    self_ref: Weak<ContextNode>,
}

impl fmt::Debug for ContextNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextNode")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("application_name", &self.application_name)
            .field("state", &self.gate.state())
            .field("startup_date", &self.startup_date.get())
            .field("parent", &self.parent.as_ref().map(|p| p.display_name()))
            .field("components", &self.registry.len())
            .finish()
    }
}

impl ContextNode {
    // ---- identity ----

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn application_name(&self) -> &str {
        &self.application_name
    }

    /// When the context became active. Fails while it never has.
    pub fn startup_date(&self) -> Result<DateTime<Utc>, ContextError> {
        self.startup_date.get().copied().ok_or_else(|| {
            ContextError::invalid_state("read startup date", InvalidStateReason::NotRefreshed)
        })
    }

    pub fn parent(&self) -> Option<&Arc<ContextNode>> {
        self.parent.as_ref()
    }

    pub fn state(&self) -> LifecycleState {
        self.gate.state()
    }

    pub fn is_active(&self) -> bool {
        self.gate.state() == LifecycleState::Active
    }

    /// Number of ancestors above this node.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut cur = self.parent.as_ref();
        while let Some(p) = cur {
            depth += 1;
            cur = p.parent.as_ref();
        }
        depth
    }

    // ---- lifecycle ----

    /// Add a component to this level. Only legal before `refresh`.
    pub fn register(&self, definition: ComponentDefinition) -> Result<(), ContextError> {
        let tx = self.gate.transition();
        let state = tx.state();
        if state != LifecycleState::Unrefreshed {
            return Err(ContextError::invalid_state(
                "register component",
                InvalidStateReason::for_state(state),
            ));
        }
        self.registry.register(definition.into_component())
    }

    /// Run the injection protocol over every component, capture the startup
    /// date and become active. One-shot.
    pub fn refresh(&self) -> Result<(), ContextError> {
        let started = {
            let mut tx = self.gate.transition();
            let state = tx.state();
            if state != LifecycleState::Unrefreshed {
                return Err(ContextError::invalid_state(
                    "refresh",
                    InvalidStateReason::for_state(state),
                ));
            }

            let source = RefreshSource { node: self };
            for component in self.registry.list_matching(&|_: &Component| true) {
                if let Some(target) = component.injectable() {
                    let injected =
                        inject_capabilities(target.as_ref(), component.injection_record(), &source)?;
                    if !injected.is_empty() {
                        tracing::debug!(
                            context = %self.display_name,
                            component = component.name(),
                            capabilities = ?injected,
                            "capabilities injected"
                        );
                    }
                }
            }

            let now = Utc::now();
            let started = *self.startup_date.get_or_init(|| now);
            tx.advance("refresh", LifecycleState::Active)?;

            // Still under the transition lock: a concurrent close waits until
            // listeners have seen Refreshed.
            self.announce(ContextLifecycleEvent::Refreshed {
                display_name: self.display_name.clone(),
            });
            started
        };

        tracing::info!(
            context = %self.display_name,
            id = ?self.id,
            components = self.registry.len(),
            startup_date = %started,
            "context refreshed"
        );
        Ok(())
    }

    /// Close this context. Returns false when it was already closed. Never
    /// touches the parent.
    pub fn close(&self) -> Result<bool, ContextError> {
        let previous = {
            let mut tx = self.gate.transition();
            let previous = tx.state();
            if previous == LifecycleState::Closed {
                tracing::debug!(context = %self.display_name, "close ignored: already closed");
                return Ok(false);
            }
            tx.advance("close", LifecycleState::Closed)?;
            previous
        };

        if previous == LifecycleState::Active {
            self.announce(ContextLifecycleEvent::Closed {
                display_name: self.display_name.clone(),
            });
        }
        self.registry.destroy();

        tracing::info!(context = %self.display_name, id = ?self.id, "context closed");
        Ok(true)
    }

    /// Publish a lifecycle event locally and up the active ancestor chain,
    /// bypassing this node's gate.
    fn announce(&self, payload: ContextLifecycleEvent) {
        let event = ApplicationEvent::new(self.display_name.clone(), payload);
        if let Err(e) = self.capabilities.events.publish(&event) {
            tracing::warn!(context = %self.display_name, error = %e, "lifecycle event not delivered");
        }
        if let Err(e) = self.publish_to_ancestors(&event) {
            tracing::warn!(context = %self.display_name, error = %e, "lifecycle event not delivered to parent");
        }
    }

    fn publish_to_ancestors(&self, event: &ApplicationEvent) -> Result<(), ContextError> {
        match &self.parent {
            Some(parent) if parent.is_active() => parent.publish(event),
            Some(parent) => {
                tracing::trace!(parent = %parent.display_name, "skipping inactive parent for event");
                Ok(())
            }
            None => Ok(()),
        }
    }

    // ---- privileged access ----

    /// The construction/injection facility for objects living outside the
    /// registry. Only available while active, and only if enabled at build time.
    pub fn autowire_capable_factory(&self) -> Result<AutowireFactory, ContextError> {
        const OP: &str = "access autowire-capable factory";
        self.gate.ensure_active(OP)?;
        if !self.autowire_supported {
            return Err(ContextError::invalid_state(OP, InvalidStateReason::Unsupported));
        }
        let node = self
            .self_ref
            .upgrade()
            .ok_or_else(|| ContextError::invalid_state(OP, InvalidStateReason::Dropped))?;
        Ok(AutowireFactory::new(node))
    }

    pub(crate) fn gate(&self) -> &LifecycleGate {
        &self.gate
    }

    pub(crate) fn capability_source(&self) -> impl CapabilitySource + '_ {
        RefreshSource { node: self }
    }
}

/// Hands out weak handles onto this node. Calls made through them pass the
/// node's gate, so they fail once it is closed.
struct RefreshSource<'a> {
    node: &'a ContextNode,
}

impl CapabilitySource for RefreshSource<'_> {
    fn provide(&self, capability: Capability) -> Result<Injected, ContextError> {
        let handle = ContextRef::new(self.node.self_ref.clone());
        Ok(match capability {
            Capability::Context => Injected::Context(handle),
            Capability::ResourceResolver => Injected::ResourceResolver(Arc::new(handle)),
            Capability::EventPublisher => Injected::EventPublisher(Arc::new(handle)),
            Capability::MessageResolver => Injected::MessageResolver(Arc::new(handle)),
            Capability::Environment => Injected::Environment(EnvironmentHandle::new(handle)),
        })
    }
}

/// Builder for [`ContextNode`]. The parent can only be set here, on an
/// already-built node, so parent chains cannot form cycles.
pub struct ContextBuilder {
    id: Option<String>,
    display_name: Option<String>,
    application_name: String,
    parent: Option<Arc<ContextNode>>,
    registry: Option<Box<dyn ComponentRegistry>>,
    resources: Option<Arc<dyn ResourceResolver>>,
    events: Option<Arc<dyn EventPublisher>>,
    messages: Option<Arc<dyn MessageResolver>>,
    environment: Option<Arc<dyn EnvironmentProvider>>,
    components: Vec<ComponentDefinition>,
    autowire_supported: bool,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self {
            id: None,
            display_name: None,
            application_name: String::new(),
            parent: None,
            registry: None,
            resources: None,
            events: None,
            messages: None,
            environment: None,
            components: Vec::new(),
            autowire_supported: true,
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = name.into();
        self
    }

    pub fn parent(mut self, parent: Arc<ContextNode>) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Replace the default in-memory registry.
    pub fn registry(mut self, registry: Box<dyn ComponentRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set all four providers at once. No parent fallback is added to them.
    pub fn capabilities(mut self, capabilities: Capabilities) -> Self {
        self.resources = Some(capabilities.resources);
        self.events = Some(capabilities.events);
        self.messages = Some(capabilities.messages);
        self.environment = Some(capabilities.environment);
        self
    }

    pub fn resources(mut self, resources: Arc<dyn ResourceResolver>) -> Self {
        self.resources = Some(resources);
        self
    }

    pub fn events(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = Some(events);
        self
    }

    /// Without this, a node with a parent gets an empty catalog that falls
    /// back to the parent's messages.
    pub fn messages(mut self, messages: Arc<dyn MessageResolver>) -> Self {
        self.messages = Some(messages);
        self
    }

    /// Without this, a node with a parent gets an empty environment layered
    /// over the parent's.
    pub fn environment(mut self, environment: Arc<dyn EnvironmentProvider>) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn component(mut self, definition: ComponentDefinition) -> Self {
        self.components.push(definition);
        self
    }

    pub fn autowire_supported(mut self, supported: bool) -> Self {
        self.autowire_supported = supported;
        self
    }

    pub fn build(self) -> Result<Arc<ContextNode>, ContextError> {
        let registry = self
            .registry
            .unwrap_or_else(|| Box::new(DefaultRegistry::new()));
        for definition in self.components {
            registry.register(definition.into_component())?;
        }

        let display_name = self.display_name.unwrap_or_else(generated_display_name);

        let parent_caps = self.parent.as_ref().map(|p| &p.capabilities);
        let capabilities = Capabilities {
            resources: self
                .resources
                .unwrap_or_else(|| Arc::new(InMemoryResources::new())),
            events: self
                .events
                .unwrap_or_else(|| Arc::new(SimpleEventMulticaster::new())),
            messages: self.messages.unwrap_or_else(|| match parent_caps {
                Some(caps) => {
                    Arc::new(StaticMessageSource::new().with_parent(caps.messages.clone()))
                }
                None => Arc::new(StaticMessageSource::new()),
            }),
            environment: self.environment.unwrap_or_else(|| match parent_caps {
                Some(caps) => {
                    Arc::new(StandardEnvironment::new().with_parent(caps.environment.clone()))
                }
                None => Arc::new(StandardEnvironment::new()),
            }),
        };

        let node = Arc::new_cyclic(|self_ref| ContextNode {
            id: self.id,
            display_name,
            application_name: self.application_name,
            parent: self.parent,
            registry,
            capabilities,
            gate: LifecycleGate::new(),
            startup_date: OnceLock::new(),
            autowire_supported: self.autowire_supported,
            self_ref: self_ref.clone(),
        });

        tracing::debug!(
            context = %node.display_name,
            id = ?node.id,
            depth = node.depth(),
            "context built"
        );
        Ok(node)
    }
}

fn generated_display_name() -> String {
    let simple = Uuid::new_v4().simple().to_string();
    format!("ContextNode@{}", &simple[..8])
}

#[cfg(test)]
mod tests;
