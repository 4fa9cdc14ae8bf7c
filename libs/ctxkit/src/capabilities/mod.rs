//! The four capability contracts a context composes, each with a simple
//! in-memory backend.

pub mod environment;
pub mod event;
pub mod message;
pub mod resource;

use std::fmt;
use std::sync::Arc;

pub use environment::{EnvironmentProvider, StandardEnvironment, DEFAULT_PROFILE};
pub use event::{
    ApplicationEvent, ContextLifecycleEvent, EventListener, EventPublisher,
    SimpleEventMulticaster, SubscriptionId, TypedListener,
};
pub use message::{format_message, Locale, MessageResolvable, MessageResolver, StaticMessageSource};
pub use resource::{InMemoryResources, Resource, ResourceResolver};

/// Shared handles to one provider of each capability.
#[derive(Clone)]
pub struct Capabilities {
    pub resources: Arc<dyn ResourceResolver>,
    pub events: Arc<dyn EventPublisher>,
    pub messages: Arc<dyn MessageResolver>,
    pub environment: Arc<dyn EnvironmentProvider>,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            resources: Arc::new(InMemoryResources::new()),
            events: Arc::new(SimpleEventMulticaster::new()),
            messages: Arc::new(StaticMessageSource::new()),
            environment: Arc::new(StandardEnvironment::new()),
        }
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities").finish_non_exhaustive()
    }
}
