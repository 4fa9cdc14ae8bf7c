//! Application events and their publication to registered listeners.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};

use crate::errors::ContextError;

/// An event with a typed payload, stamped at creation.
#[derive(Clone)]
pub struct ApplicationEvent {
    source: String,
    timestamp: DateTime<Utc>,
    payload_type: &'static str,
    payload: Arc<dyn Any + Send + Sync>,
}

impl fmt::Debug for ApplicationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplicationEvent")
            .field("source", &self.source)
            .field("timestamp", &self.timestamp)
            .field("payload_type", &self.payload_type)
            .finish()
    }
}

impl ApplicationEvent {
    pub fn new<T: Send + Sync + 'static>(source: impl Into<String>, payload: T) -> Self {
        Self {
            source: source.into(),
            timestamp: Utc::now(),
            payload_type: std::any::type_name::<T>(),
            payload: Arc::new(payload),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn payload_type(&self) -> &'static str {
        self.payload_type
    }

    pub fn payload<T: 'static>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.payload.is::<T>()
    }
}

/// Payload of the events a context publishes about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextLifecycleEvent {
    Refreshed { display_name: String },
    Closed { display_name: String },
}

pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &ApplicationEvent);

    /// Listeners returning false are skipped for this event.
    fn supports(&self, _event: &ApplicationEvent) -> bool {
        true
    }
}

/// Listener invoked only for events whose payload is a `T`.
pub struct TypedListener<T, F> {
    handler: F,
    _payload: PhantomData<fn(&T)>,
}

impl<T, F> TypedListener<T, F>
where
    T: 'static,
    F: Fn(&ApplicationEvent, &T) + Send + Sync,
{
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _payload: PhantomData,
        }
    }
}

impl<T, F> EventListener for TypedListener<T, F>
where
    T: 'static,
    F: Fn(&ApplicationEvent, &T) + Send + Sync,
{
    fn on_event(&self, event: &ApplicationEvent) {
        if let Some(payload) = event.payload::<T>() {
            (self.handler)(event, payload);
        }
    }

    fn supports(&self, event: &ApplicationEvent) -> bool {
        event.is::<T>()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: &ApplicationEvent) -> Result<(), ContextError>;

    fn subscribe(&self, listener: Arc<dyn EventListener>) -> Result<SubscriptionId, ContextError>;

    /// Returns false when the subscription was already gone.
    fn unsubscribe(&self, id: SubscriptionId) -> Result<bool, ContextError>;
}

type ListenerList = Vec<(SubscriptionId, Arc<dyn EventListener>)>;

/// Synchronous multicaster. Publication reads a lock-free snapshot of the
/// listener list; subscription changes swap in a new list.
pub struct SimpleEventMulticaster {
    listeners: ArcSwap<ListenerList>,
    next_id: AtomicU64,
}

impl Default for SimpleEventMulticaster {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SimpleEventMulticaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleEventMulticaster")
            .field("listeners", &self.listeners.load().len())
            .finish()
    }
}

impl SimpleEventMulticaster {
    pub fn new() -> Self {
        Self {
            listeners: ArcSwap::from_pointee(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.load().len()
    }
}

impl EventPublisher for SimpleEventMulticaster {
    fn publish(&self, event: &ApplicationEvent) -> Result<(), ContextError> {
        let snapshot = self.listeners.load();
        let mut delivered = 0usize;
        for (_, listener) in snapshot.iter() {
            if listener.supports(event) {
                listener.on_event(event);
                delivered += 1;
            }
        }
        tracing::trace!(
            payload = event.payload_type(),
            source = event.source(),
            delivered,
            "event published"
        );
        Ok(())
    }

    fn subscribe(&self, listener: Arc<dyn EventListener>) -> Result<SubscriptionId, ContextError> {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.rcu(|current| {
            let mut next = ListenerList::clone(current);
            next.push((id, listener.clone()));
            next
        });
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> Result<bool, ContextError> {
        let mut removed = false;
        self.listeners.rcu(|current| {
            let mut next = ListenerList::clone(current);
            let before = next.len();
            next.retain(|(sid, _)| *sid != id);
            removed = next.len() != before;
            next
        });
        Ok(removed)
    }
}
