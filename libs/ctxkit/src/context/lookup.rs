//! Hierarchical component lookup: local registry first, then the parent
//! chain. Enumerations merge every level, local names shadowing ancestors.

use std::any::TypeId;

use super::ContextNode;
use crate::component::Component;
use crate::contracts::{merge_shadowed, ComponentLookup};
use crate::errors::{ContextError, LookupKind};

impl ComponentLookup for ContextNode {
    fn contains_component(&self, name: &str) -> Result<bool, ContextError> {
        self.gate.ensure_active("check component")?;
        if self.registry.contains(name) {
            return Ok(true);
        }
        match &self.parent {
            Some(parent) => parent.contains_component(name),
            None => Ok(false),
        }
    }

    fn contains_local_component(&self, name: &str) -> Result<bool, ContextError> {
        self.gate.ensure_active("check local component")?;
        Ok(self.registry.contains(name))
    }

    fn get_component(&self, name: &str) -> Result<Component, ContextError> {
        self.gate.ensure_active("look up component")?;
        if let Some(component) = self.registry.get(name) {
            return Ok(component);
        }
        match &self.parent {
            Some(parent) => {
                tracing::trace!(context = %self.display_name, component = name, "delegating lookup to parent");
                parent.get_component(name)
            }
            None => Err(ContextError::not_found(LookupKind::Component, name)),
        }
    }

    fn find_by_type(&self, type_id: TypeId, type_name: &'static str) -> Result<Component, ContextError> {
        self.gate.ensure_active("look up component by type")?;
        let mut candidates = self
            .registry
            .list_matching(&|c: &Component| c.exposes_type_id(type_id));
        match candidates.len() {
            1 => Ok(candidates.remove(0)),
            0 => match &self.parent {
                Some(parent) => {
                    tracing::trace!(context = %self.display_name, type_name, "delegating type lookup to parent");
                    parent.find_by_type(type_id, type_name)
                }
                None => Err(ContextError::not_found(LookupKind::Component, type_name)),
            },
            _ => Err(ContextError::AmbiguousMatch {
                type_name,
                candidates: candidates.iter().map(|c| c.name().to_string()).collect(),
            }),
        }
    }

    fn component_names(&self) -> Result<Vec<String>, ContextError> {
        let all = self.list_matching(&|_: &Component| true)?;
        Ok(all.iter().map(|c| c.name().to_string()).collect())
    }

    fn list_matching(&self, predicate: &dyn Fn(&Component) -> bool) -> Result<Vec<Component>, ContextError> {
        self.gate.ensure_active("list components")?;
        let local = self.registry.list_matching(predicate);
        match &self.parent {
            Some(parent) => {
                let inherited = parent.list_matching(predicate)?;
                Ok(merge_shadowed(local, self.registry.names(), inherited))
            }
            None => Ok(local),
        }
    }
}
