//! # ctxkit - Hierarchical Component Context
//!
//! A context is a read-mostly façade over a registry of managed components
//! and four cross-cutting capabilities: resource resolution, event
//! publication, message lookup and environment introspection. Contexts nest:
//! a child sees its parent's components, and its own definitions win.
//!
//! ## Lifecycle
//!
//! `Unrefreshed → Active → Closed`. Components are registered while
//! unrefreshed; `refresh` injects requested capabilities and activates the
//! context; `close` runs destruction callbacks. Lookups and capability calls
//! only succeed while active.
//!
//! ## Example
//!
//! ```rust,ignore
//! use ctxkit::{ComponentDefinition, ComponentLookupExt, ContextBuilder};
//! use std::sync::Arc;
//!
//! let root = ContextBuilder::new()
//!     .display_name("root")
//!     .component(ComponentDefinition::new("a", Arc::new(1u32)))
//!     .build()?;
//! root.refresh()?;
//!
//! let child = ContextBuilder::new()
//!     .parent(root.clone())
//!     .component(ComponentDefinition::new("b", Arc::new(2u32)))
//!     .build()?;
//! child.refresh()?;
//!
//! assert_eq!(*child.get::<u32>("a")?, 1);
//! assert!(root.get::<u32>("b").unwrap_err().is_not_found());
//! ```

pub mod capabilities;
pub mod component;
pub mod context;
pub mod contracts;
pub mod errors;
pub mod factory;
pub mod injection;
pub mod lifecycle;
pub mod registry;
pub mod runtime;

pub use capabilities::{
    ApplicationEvent, Capabilities, ContextLifecycleEvent, EnvironmentProvider, EventListener,
    EventPublisher, InMemoryResources, Locale, MessageResolvable, MessageResolver, Resource,
    ResourceResolver, SimpleEventMulticaster, StandardEnvironment, StaticMessageSource,
    SubscriptionId, TypedListener,
};
pub use component::{Component, ComponentDefinition};
pub use context::{ContextBuilder, ContextNode};
pub use contracts::{ComponentLookup, ComponentLookupExt, EnvironmentCapable};
pub use errors::{ContextError, ContextResult, InvalidStateReason, LookupKind};
pub use factory::AutowireFactory;
pub use injection::{Capability, ContextRef, EnvironmentHandle, Injectable, Injected};
pub use lifecycle::LifecycleState;
pub use registry::{ComponentRegistry, DefaultRegistry};
pub use runtime::{run, ContextHierarchy, HierarchyError, HostRuntime, RunOptions, ShutdownOptions};
