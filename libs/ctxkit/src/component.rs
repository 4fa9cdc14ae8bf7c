//! Managed components and their definitions.
//!
//! A component is a named, type-erased shared instance. It can be looked up
//! under its concrete type and under any additional views (typically trait
//! objects) registered with [`ComponentDefinition::expose`].

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::injection::{Injectable, InjectionRecord};

type DestroyFn = Box<dyn FnOnce() + Send>;

/// One lookup view of a component: `value` always holds an `Arc<T>`.
struct TypeView {
    type_id: TypeId,
    type_name: &'static str,
    value: Box<dyn Any + Send + Sync>,
}

impl TypeView {
    fn of<T: ?Sized + Send + Sync + 'static>(instance: Arc<T>) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            value: Box::new(instance),
        }
    }
}

struct ComponentInner {
    name: String,
    views: Vec<TypeView>,
    injectable: Option<Arc<dyn Injectable>>,
    injection: InjectionRecord,
    on_destroy: Mutex<Option<DestroyFn>>,
}

/// A registered component. Cheap to clone; clones share the instance.
#[derive(Clone)]
pub struct Component {
    inner: Arc<ComponentInner>,
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.inner.name)
            .field("types", &self.type_names())
            .field("injectable", &self.inner.injectable.is_some())
            .finish()
    }
}

impl Component {
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn type_names(&self) -> Vec<&'static str> {
        self.inner.views.iter().map(|v| v.type_name).collect()
    }

    pub fn exposes_type_id(&self, type_id: TypeId) -> bool {
        self.inner.views.iter().any(|v| v.type_id == type_id)
    }

    pub fn exposes<T: ?Sized + 'static>(&self) -> bool {
        self.exposes_type_id(TypeId::of::<T>())
    }

    /// The instance viewed as `T`, if the component exposes that type.
    pub fn downcast<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.inner
            .views
            .iter()
            .find(|v| v.type_id == TypeId::of::<T>())
            .and_then(|v| v.value.downcast_ref::<Arc<T>>())
            .cloned()
    }

    pub fn injectable(&self) -> Option<&Arc<dyn Injectable>> {
        self.inner.injectable.as_ref()
    }

    pub(crate) fn injection_record(&self) -> &InjectionRecord {
        &self.inner.injection
    }

    /// Run the destruction callback, if any. Runs at most once.
    pub fn destroy(&self) {
        let callback = self.inner.on_destroy.lock().take();
        if let Some(callback) = callback {
            tracing::debug!(component = %self.inner.name, "running destruction callback");
            callback();
        }
    }
}

/// Builder describing a component before it enters a registry.
pub struct ComponentDefinition {
    name: String,
    views: Vec<TypeView>,
    injectable: Option<Arc<dyn Injectable>>,
    on_destroy: Option<DestroyFn>,
}

impl fmt::Debug for ComponentDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDefinition")
            .field("name", &self.name)
            .field(
                "types",
                &self.views.iter().map(|v| v.type_name).collect::<Vec<_>>(),
            )
            .field("injectable", &self.injectable.is_some())
            .field("has_destroy", &self.on_destroy.is_some())
            .finish()
    }
}

impl ComponentDefinition {
    pub fn new<T: Send + Sync + 'static>(name: impl Into<String>, instance: Arc<T>) -> Self {
        Self {
            name: name.into(),
            views: vec![TypeView::of(instance)],
            injectable: None,
            on_destroy: None,
        }
    }

    /// A component that takes part in the capability-injection protocol.
    pub fn injectable<T: Injectable + 'static>(name: impl Into<String>, instance: Arc<T>) -> Self {
        let hook: Arc<dyn Injectable> = instance.clone();
        let mut def = Self::new(name, instance);
        def.injectable = Some(hook);
        def
    }

    /// Also expose the instance under `U`, usually a trait object.
    ///
    /// ```rust,ignore
    /// let svc = Arc::new(EnglishGreeter);
    /// ComponentDefinition::new("greeter", svc.clone()).expose::<dyn Greeter>(svc);
    /// ```
    pub fn expose<U: ?Sized + Send + Sync + 'static>(mut self, view: Arc<U>) -> Self {
        let type_id = TypeId::of::<U>();
        self.views.retain(|v| v.type_id != type_id);
        self.views.push(TypeView::of(view));
        self
    }

    pub fn on_destroy(mut self, callback: impl FnOnce() + Send + 'static) -> Self {
        self.on_destroy = Some(Box::new(callback));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn into_component(self) -> Component {
        Component {
            inner: Arc::new(ComponentInner {
                name: self.name,
                views: self.views,
                injectable: self.injectable,
                injection: InjectionRecord::default(),
                on_destroy: Mutex::new(self.on_destroy),
            }),
        }
    }
}
