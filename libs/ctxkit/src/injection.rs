//! Capability-injection protocol.
//!
//! A component declares the capabilities it wants through
//! [`Injectable::required_capabilities`]. After construction and before the
//! owning context becomes active, the context hands each declared capability
//! to [`Injectable::inject`], at most once per capability per instance.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};

use crate::capabilities::{
    ApplicationEvent, EnvironmentProvider, EventListener, EventPublisher, Locale, MessageResolver,
    Resource, ResourceResolver, SubscriptionId,
};
use crate::context::ContextNode;
use crate::contracts::EnvironmentCapable;
use crate::errors::{ContextError, InvalidStateReason};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    Context,
    ResourceResolver,
    EventPublisher,
    MessageResolver,
    Environment,
}

impl Capability {
    pub const ALL: [Capability; 5] = [
        Capability::Context,
        Capability::ResourceResolver,
        Capability::EventPublisher,
        Capability::MessageResolver,
        Capability::Environment,
    ];

    fn bit(self) -> u8 {
        match self {
            Capability::Context => 1,
            Capability::ResourceResolver => 1 << 1,
            Capability::EventPublisher => 1 << 2,
            Capability::MessageResolver => 1 << 3,
            Capability::Environment => 1 << 4,
        }
    }
}

/// Non-owning handle to a context, given to components so they can reach the
/// context that owns them without keeping it alive.
#[derive(Clone)]
pub struct ContextRef(Weak<ContextNode>);

impl ContextRef {
    pub(crate) fn new(node: Weak<ContextNode>) -> Self {
        Self(node)
    }

    pub fn get(&self) -> Result<Arc<ContextNode>, ContextError> {
        self.0.upgrade().ok_or_else(|| {
            ContextError::invalid_state("access context", InvalidStateReason::Dropped)
        })
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl fmt::Debug for ContextRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextRef")
            .field("alive", &self.is_alive())
            .finish()
    }
}

// The capability impls below go through the owning node, so they see its
// lifecycle gate and its parent chain exactly like direct calls on the node.

impl ResourceResolver for ContextRef {
    fn resource(&self, location: &str) -> Result<Resource, ContextError> {
        self.get()?.resource(location)
    }

    fn resources(&self, pattern: &str) -> Result<Vec<Resource>, ContextError> {
        self.get()?.resources(pattern)
    }
}

impl EventPublisher for ContextRef {
    fn publish(&self, event: &ApplicationEvent) -> Result<(), ContextError> {
        self.get()?.publish(event)
    }

    fn subscribe(&self, listener: Arc<dyn EventListener>) -> Result<SubscriptionId, ContextError> {
        self.get()?.subscribe(listener)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> Result<bool, ContextError> {
        self.get()?.unsubscribe(id)
    }
}

impl MessageResolver for ContextRef {
    fn message(&self, code: &str, args: &[&str], locale: &Locale) -> Result<String, ContextError> {
        self.get()?.message(code, args, locale)
    }
}

/// Environment view handed to components. Unlike a bare
/// [`EnvironmentProvider`], every read fails once the owning context is closed.
#[derive(Clone, Debug)]
pub struct EnvironmentHandle(ContextRef);

impl EnvironmentHandle {
    pub(crate) fn new(owner: ContextRef) -> Self {
        Self(owner)
    }

    pub fn property(&self, key: &str) -> Result<Option<String>, ContextError> {
        self.0.get()?.property(key)
    }

    pub fn required_property(&self, key: &str) -> Result<String, ContextError> {
        self.0.get()?.required_property(key)
    }

    pub fn contains_property(&self, key: &str) -> Result<bool, ContextError> {
        self.0.get()?.contains_property(key)
    }

    pub fn active_profiles(&self) -> Result<Vec<String>, ContextError> {
        self.0.get()?.active_profiles()
    }

    pub fn default_profiles(&self) -> Result<Vec<String>, ContextError> {
        self.0.get()?.default_profiles()
    }

    pub fn accepts_profiles(&self, profiles: &[&str]) -> Result<bool, ContextError> {
        self.0.get()?.accepts_profiles(profiles)
    }
}

impl EnvironmentCapable for EnvironmentHandle {
    fn environment(&self) -> Result<Arc<dyn EnvironmentProvider>, ContextError> {
        self.0.get()?.environment()
    }
}

/// A capability handed to a component. Every variant resolves through the
/// owning context and never keeps it alive.
#[derive(Clone)]
pub enum Injected {
    Context(ContextRef),
    ResourceResolver(Arc<dyn ResourceResolver>),
    EventPublisher(Arc<dyn EventPublisher>),
    MessageResolver(Arc<dyn MessageResolver>),
    Environment(EnvironmentHandle),
}

impl Injected {
    pub fn capability(&self) -> Capability {
        match self {
            Injected::Context(_) => Capability::Context,
            Injected::ResourceResolver(_) => Capability::ResourceResolver,
            Injected::EventPublisher(_) => Capability::EventPublisher,
            Injected::MessageResolver(_) => Capability::MessageResolver,
            Injected::Environment(_) => Capability::Environment,
        }
    }
}

impl fmt::Debug for Injected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Injected({:?})", self.capability())
    }
}

/// Post-construction hook for components that want context capabilities.
pub trait Injectable: Send + Sync {
    fn required_capabilities(&self) -> &[Capability];

    fn inject(&self, injected: Injected);
}

/// Something able to hand out capabilities during injection.
pub trait CapabilitySource {
    fn provide(&self, capability: Capability) -> Result<Injected, ContextError>;
}

/// Which capabilities an instance has already received.
#[derive(Default)]
pub struct InjectionRecord(AtomicU8);

impl InjectionRecord {
    /// Returns true only for the first claim of `capability`.
    pub fn claim(&self, capability: Capability) -> bool {
        let bit = capability.bit();
        self.0.fetch_or(bit, Ordering::AcqRel) & bit == 0
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.0.load(Ordering::Acquire) & capability.bit() != 0
    }
}

impl fmt::Debug for InjectionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let got: Vec<_> = Capability::ALL.iter().filter(|c| self.has(**c)).collect();
        f.debug_tuple("InjectionRecord").field(&got).finish()
    }
}

/// Run the protocol for one target. Returns the capabilities injected by
/// this call, in declaration order.
pub fn inject_capabilities(
    target: &dyn Injectable,
    record: &InjectionRecord,
    source: &dyn CapabilitySource,
) -> Result<Vec<Capability>, ContextError> {
    let mut injected = Vec::new();
    for &capability in target.required_capabilities() {
        if !record.claim(capability) {
            continue;
        }
        let value = source.provide(capability)?;
        target.inject(value);
        injected.push(capability);
    }
    Ok(injected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{Capabilities, StandardEnvironment};
    use parking_lot::Mutex;

    struct FromCapabilities(Capabilities);

    impl CapabilitySource for FromCapabilities {
        fn provide(&self, capability: Capability) -> Result<Injected, ContextError> {
            let detached = || ContextRef::new(Weak::new());
            Ok(match capability {
                Capability::Context => Injected::Context(detached()),
                Capability::ResourceResolver => Injected::ResourceResolver(self.0.resources.clone()),
                Capability::EventPublisher => Injected::EventPublisher(self.0.events.clone()),
                Capability::MessageResolver => Injected::MessageResolver(self.0.messages.clone()),
                Capability::Environment => Injected::Environment(EnvironmentHandle::new(detached())),
            })
        }
    }

    struct Recorder {
        needs: Vec<Capability>,
        seen: Mutex<Vec<Capability>>,
    }

    impl Injectable for Recorder {
        fn required_capabilities(&self) -> &[Capability] {
            &self.needs
        }
        fn inject(&self, injected: Injected) {
            self.seen.lock().push(injected.capability());
        }
    }

    #[test]
    fn each_capability_injected_once() {
        let caps = Capabilities {
            environment: Arc::new(StandardEnvironment::new().with_property("k", "v")),
            ..Capabilities::default()
        };
        let source = FromCapabilities(caps);
        let target = Recorder {
            needs: vec![
                Capability::Environment,
                Capability::EventPublisher,
                Capability::Environment,
            ],
            seen: Mutex::new(Vec::new()),
        };
        let record = InjectionRecord::default();

        let first = inject_capabilities(&target, &record, &source).unwrap();
        assert_eq!(first, vec![Capability::Environment, Capability::EventPublisher]);

        let second = inject_capabilities(&target, &record, &source).unwrap();
        assert!(second.is_empty());
        assert_eq!(
            *target.seen.lock(),
            vec![Capability::Environment, Capability::EventPublisher]
        );
        assert!(record.has(Capability::Environment));
        assert!(!record.has(Capability::Context));
    }

    #[test]
    fn dropped_context_ref_is_invalid_state() {
        let r = ContextRef::new(Weak::new());
        assert!(!r.is_alive());
        assert!(r.get().unwrap_err().is_invalid_state());
        assert!(r.publish(&ApplicationEvent::new("t", 1u8)).unwrap_err().is_invalid_state());
        assert!(r.resource("a.txt").unwrap_err().is_invalid_state());
        assert!(r
            .message("code", &[], &Locale::root())
            .unwrap_err()
            .is_invalid_state());

        let env = EnvironmentHandle::new(r);
        assert!(env.property("k").unwrap_err().is_invalid_state());
        assert!(env.environment().is_err());
    }
}
