use std::sync::Arc;

use crate::context::ContextNode;
use crate::errors::ContextError;

/// A root context plus named children, refreshed root first and closed in
/// reverse.
#[derive(Debug, Clone)]
pub struct ContextHierarchy {
    root: Arc<ContextNode>,
    children: Vec<(String, Arc<ContextNode>)>,
}

#[derive(Debug, thiserror::Error)]
pub enum HierarchyError {
    #[error("child context '{0}' is already part of the hierarchy")]
    DuplicateChild(String),
    #[error("child context '{0}' does not descend from the hierarchy root")]
    NotDescendant(String),
    #[error("failed to refresh context '{name}'")]
    Refresh {
        name: String,
        #[source]
        source: ContextError,
    },
}

impl ContextHierarchy {
    pub fn new(root: Arc<ContextNode>) -> Self {
        Self {
            root,
            children: Vec::new(),
        }
    }

    /// Add a child. It must have the root somewhere on its parent chain.
    pub fn add_child(
        &mut self,
        name: impl Into<String>,
        child: Arc<ContextNode>,
    ) -> Result<(), HierarchyError> {
        let name = name.into();
        if self.children.iter().any(|(n, _)| *n == name) {
            return Err(HierarchyError::DuplicateChild(name));
        }
        if !descends_from(&child, &self.root) {
            return Err(HierarchyError::NotDescendant(name));
        }
        self.children.push((name, child));
        Ok(())
    }

    pub fn root(&self) -> &Arc<ContextNode> {
        &self.root
    }

    pub fn child(&self, name: &str) -> Option<&Arc<ContextNode>> {
        self.children
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c)
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, &Arc<ContextNode>)> {
        self.children.iter().map(|(n, c)| (n.as_str(), c))
    }

    /// Refresh the root, then every child in insertion order. On failure the
    /// whole hierarchy is closed before the error is returned.
    pub fn refresh_all(&self) -> Result<(), HierarchyError> {
        let nodes = std::iter::once(("root", &self.root))
            .chain(self.children.iter().map(|(n, c)| (n.as_str(), c)));
        for (name, node) in nodes {
            tracing::debug!(context = name, "refreshing");
            if let Err(source) = node.refresh() {
                tracing::error!(context = name, error = %source, "refresh failed; closing hierarchy");
                self.close_all();
                return Err(HierarchyError::Refresh {
                    name: name.to_string(),
                    source,
                });
            }
        }
        Ok(())
    }

    /// Close children in reverse order, then the root. Errors are logged and
    /// do not stop the remaining closes.
    pub fn close_all(&self) {
        let nodes = self
            .children
            .iter()
            .rev()
            .map(|(n, c)| (n.as_str(), c))
            .chain(std::iter::once(("root", &self.root)));
        for (name, node) in nodes {
            match node.close() {
                Ok(true) => tracing::debug!(context = name, "closed"),
                Ok(false) => {}
                Err(e) => tracing::warn!(context = name, error = %e, "failed to close context"),
            }
        }
    }
}

fn descends_from(node: &Arc<ContextNode>, ancestor: &Arc<ContextNode>) -> bool {
    let mut cur = node.parent();
    while let Some(p) = cur {
        if Arc::ptr_eq(p, ancestor) {
            return true;
        }
        cur = p.parent();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextBuilder;
    use crate::lifecycle::LifecycleState;

    #[test]
    fn rejects_unrelated_child() {
        let root = ContextBuilder::new().build().unwrap();
        let stranger = ContextBuilder::new().build().unwrap();
        let mut h = ContextHierarchy::new(root);
        assert!(matches!(
            h.add_child("s", stranger),
            Err(HierarchyError::NotDescendant(_))
        ));
    }

    #[test]
    fn refresh_then_close_all() {
        let root = ContextBuilder::new().build().unwrap();
        let a = ContextBuilder::new().parent(root.clone()).build().unwrap();
        let b = ContextBuilder::new().parent(a.clone()).build().unwrap();
        let mut h = ContextHierarchy::new(root.clone());
        h.add_child("a", a.clone()).unwrap();
        h.add_child("b", b.clone()).unwrap();
        assert!(matches!(
            h.add_child("a", a.clone()),
            Err(HierarchyError::DuplicateChild(_))
        ));

        h.refresh_all().unwrap();
        assert!(root.is_active() && a.is_active() && b.is_active());

        h.close_all();
        for node in [&root, &a, &b] {
            assert_eq!(node.state(), LifecycleState::Closed);
        }
    }

    #[test]
    fn failed_refresh_closes_everything() {
        let root = ContextBuilder::new().build().unwrap();
        let child = ContextBuilder::new().parent(root.clone()).build().unwrap();
        child.refresh().ok();
        let mut h = ContextHierarchy::new(root.clone());
        h.add_child("child", child).unwrap();

        // root refreshes, child is already active and fails
        let err = h.refresh_all().unwrap_err();
        assert!(matches!(err, HierarchyError::Refresh { ref name, .. } if name == "child"));
        assert_eq!(root.state(), LifecycleState::Closed);
    }
}
