//! Capability surfaces of [`ContextNode`], forwarded to the held providers
//! behind the lifecycle gate.

use std::sync::Arc;

use super::ContextNode;
use crate::capabilities::{
    ApplicationEvent, EnvironmentProvider, EventListener, EventPublisher, Locale, MessageResolver,
    Resource, ResourceResolver, SubscriptionId,
};
use crate::contracts::EnvironmentCapable;
use crate::errors::ContextError;

impl ResourceResolver for ContextNode {
    fn resource(&self, location: &str) -> Result<Resource, ContextError> {
        self.gate.ensure_active("resolve resource")?;
        self.capabilities.resources.resource(location)
    }

    fn resources(&self, pattern: &str) -> Result<Vec<Resource>, ContextError> {
        self.gate.ensure_active("resolve resources")?;
        self.capabilities.resources.resources(pattern)
    }
}

impl EventPublisher for ContextNode {
    /// Deliver to this context's listeners, then to every active ancestor.
    fn publish(&self, event: &ApplicationEvent) -> Result<(), ContextError> {
        self.gate.ensure_active("publish event")?;
        self.capabilities.events.publish(event)?;
        self.publish_to_ancestors(event)
    }

    fn subscribe(&self, listener: Arc<dyn EventListener>) -> Result<SubscriptionId, ContextError> {
        self.gate.ensure_active("subscribe listener")?;
        self.capabilities.events.subscribe(listener)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> Result<bool, ContextError> {
        self.gate.ensure_active("unsubscribe listener")?;
        self.capabilities.events.unsubscribe(id)
    }
}

impl MessageResolver for ContextNode {
    fn message(&self, code: &str, args: &[&str], locale: &Locale) -> Result<String, ContextError> {
        self.gate.ensure_active("resolve message")?;
        self.capabilities.messages.message(code, args, locale)
    }
}

impl EnvironmentCapable for ContextNode {
    fn environment(&self) -> Result<Arc<dyn EnvironmentProvider>, ContextError> {
        self.gate.ensure_active("access environment")?;
        Ok(self.capabilities.environment.clone())
    }
}

/// Gated shortcuts onto the environment.
impl ContextNode {
    pub fn property(&self, key: &str) -> Result<Option<String>, ContextError> {
        Ok(self.environment()?.property(key))
    }

    pub fn required_property(&self, key: &str) -> Result<String, ContextError> {
        self.environment()?.required_property(key)
    }

    pub fn contains_property(&self, key: &str) -> Result<bool, ContextError> {
        Ok(self.environment()?.contains_property(key))
    }

    pub fn active_profiles(&self) -> Result<Vec<String>, ContextError> {
        Ok(self.environment()?.active_profiles())
    }

    pub fn default_profiles(&self) -> Result<Vec<String>, ContextError> {
        Ok(self.environment()?.default_profiles())
    }

    pub fn accepts_profiles(&self, profiles: &[&str]) -> Result<bool, ContextError> {
        Ok(self.environment()?.accepts_profiles(profiles))
    }
}
