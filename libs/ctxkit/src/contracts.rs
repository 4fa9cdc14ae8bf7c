//! Narrow consumer-facing contracts implemented by [`ContextNode`](crate::ContextNode).
//!
//! Code that only needs component lookup should take `&dyn ComponentLookup`
//! rather than the whole context.

use std::any::TypeId;
use std::collections::HashSet;
use std::sync::Arc;

use crate::capabilities::EnvironmentProvider;
use crate::component::Component;
use crate::errors::ContextError;

/// Hierarchy-aware component lookup. Local entries shadow ancestor entries
/// of the same name.
pub trait ComponentLookup: Send + Sync {
    fn contains_component(&self, name: &str) -> Result<bool, ContextError>;

    /// Like `contains_component` but ignores ancestors.
    fn contains_local_component(&self, name: &str) -> Result<bool, ContextError>;

    fn get_component(&self, name: &str) -> Result<Component, ContextError>;

    /// The single component exposing `type_id`, searching child to root and
    /// stopping at the first level with any candidate.
    fn find_by_type(&self, type_id: TypeId, type_name: &'static str) -> Result<Component, ContextError>;

    fn component_names(&self) -> Result<Vec<String>, ContextError>;

    fn list_matching(&self, predicate: &dyn Fn(&Component) -> bool) -> Result<Vec<Component>, ContextError>;
}

/// Typed helpers layered over [`ComponentLookup`].
pub trait ComponentLookupExt: ComponentLookup {
    fn get<T: ?Sized + Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>, ContextError> {
        let component = self.get_component(name)?;
        component
            .downcast::<T>()
            .ok_or_else(|| ContextError::TypeMismatch {
                name: name.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }

    fn get_by_type<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>, ContextError> {
        let type_name = std::any::type_name::<T>();
        let component = self.find_by_type(TypeId::of::<T>(), type_name)?;
        component
            .downcast::<T>()
            .ok_or_else(|| ContextError::TypeMismatch {
                name: component.name().to_string(),
                expected: type_name,
            })
    }

    fn names_for_type<T: ?Sized + 'static>(&self) -> Result<Vec<String>, ContextError> {
        let matching = self.list_matching(&|c: &Component| c.exposes::<T>())?;
        Ok(matching.iter().map(|c| c.name().to_string()).collect())
    }

    fn components_of_type<T: ?Sized + Send + Sync + 'static>(
        &self,
    ) -> Result<Vec<(String, Arc<T>)>, ContextError> {
        let matching = self.list_matching(&|c: &Component| c.exposes::<T>())?;
        Ok(matching
            .iter()
            .filter_map(|c| c.downcast::<T>().map(|v| (c.name().to_string(), v)))
            .collect())
    }
}

impl<L: ComponentLookup + ?Sized> ComponentLookupExt for L {}

/// Access to the environment a context was built with.
pub trait EnvironmentCapable {
    fn environment(&self) -> Result<Arc<dyn EnvironmentProvider>, ContextError>;
}

/// Append `parent` entries whose names are not in `shadowed`.
pub(crate) fn merge_shadowed(
    mut local: Vec<Component>,
    shadowed: Vec<String>,
    parent: Vec<Component>,
) -> Vec<Component> {
    let shadowed: HashSet<String> = shadowed.into_iter().collect();
    local.extend(
        parent
            .into_iter()
            .filter(|c| !shadowed.contains(c.name())),
    );
    local
}
