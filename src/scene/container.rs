//! Ordered child sequences. Sequence order is paint order: later children
//! paint on top.

use std::cmp::Ordering;

use crate::error::SceneError;

use super::{NodeId, Scene, View};

impl Scene {
    /// Append `child` to the end of `parent`'s children.
    ///
    /// A child owned elsewhere is detached first. Adding a child to its
    /// current owner moves it to the end.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        let len = self.try_node(parent)?.children.len();
        let already_here = self.parent(child) == Some(parent);
        self.add_child_at(parent, child, if already_here { len - 1 } else { len })
    }

    /// Insert `child` at `index` (clamped to the sequence length).
    pub fn add_child_at(
        &mut self,
        parent: NodeId,
        child: NodeId,
        index: usize,
    ) -> Result<(), SceneError> {
        self.check_insert(parent, child)?;

        self.detach(child)?;
        let parent_node = self.try_node_mut(parent)?;
        let index = index.min(parent_node.children.len());
        parent_node.children.insert(index, child);
        self.try_node_mut(child)?.parent = Some(parent);
        self.invalidate_world(child);
        Ok(())
    }

    fn check_insert(&self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        let parent_node = self.try_node(parent)?;
        let child_node = self.try_node(child)?;

        let reason = if !parent_node.kind.is_container() {
            Some("parent is not a container")
        } else if child_node.kind == super::NodeKind::Stage {
            Some("a stage cannot be owned")
        } else if child == parent || self.contains(child, parent) {
            Some("child is an ancestor of parent")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(SceneError::InvalidHierarchy {
                parent,
                child,
                reason,
            }),
            None => Ok(()),
        }
    }

    /// Remove `child` from `parent`. Returns `Ok(false)` when it was not a
    /// child there.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<bool, SceneError> {
        let parent_node = self.try_node(parent)?;
        if !parent_node.children.contains(&child) {
            return Ok(false);
        }
        self.detach(child)?;
        Ok(true)
    }

    pub fn remove_child_at(&mut self, parent: NodeId, index: usize) -> Result<NodeId, SceneError> {
        let child = self.child_at(parent, index)?;
        self.detach(child)?;
        Ok(child)
    }

    /// Detach every child. The children stay alive in the scene.
    pub fn remove_all_children(&mut self, parent: NodeId) -> Result<Vec<NodeId>, SceneError> {
        let children = std::mem::take(&mut self.try_node_mut(parent)?.children);
        for &child in &children {
            if let Some(node) = self.node_mut(child) {
                node.parent = None;
            }
            self.invalidate_world(child);
        }
        Ok(children)
    }

    /// Release a node from its owner, if any.
    pub fn detach(&mut self, child: NodeId) -> Result<(), SceneError> {
        let Some(parent) = self.try_node(child)?.parent else {
            return Ok(());
        };
        if let Some(parent_node) = self.node_mut(parent) {
            parent_node.children.retain(|&c| c != child);
        }
        self.try_node_mut(child)?.parent = None;
        self.invalidate_world(child);
        Ok(())
    }

    /// Move `child` to `index`, shifting the siblings in between.
    pub fn set_child_index(
        &mut self,
        parent: NodeId,
        child: NodeId,
        index: usize,
    ) -> Result<(), SceneError> {
        let current = self.child_index(parent, child)?;
        let children = &mut self.try_node_mut(parent)?.children;
        if index >= children.len() {
            return Err(SceneError::IndexOutOfRange {
                index,
                len: children.len(),
            });
        }
        if current != index {
            let moved = children.remove(current);
            children.insert(index, moved);
        }
        Ok(())
    }

    pub fn swap_children(
        &mut self,
        parent: NodeId,
        first: NodeId,
        second: NodeId,
    ) -> Result<(), SceneError> {
        let i = self.child_index(parent, first)?;
        let j = self.child_index(parent, second)?;
        self.try_node_mut(parent)?.children.swap(i, j);
        Ok(())
    }

    pub fn swap_children_at(
        &mut self,
        parent: NodeId,
        first: usize,
        second: usize,
    ) -> Result<(), SceneError> {
        let children = &mut self.try_node_mut(parent)?.children;
        let len = children.len();
        for index in [first, second] {
            if index >= len {
                return Err(SceneError::IndexOutOfRange { index, len });
            }
        }
        children.swap(first, second);
        Ok(())
    }

    pub fn child_at(&self, parent: NodeId, index: usize) -> Result<NodeId, SceneError> {
        let children = &self.try_node(parent)?.children;
        children
            .get(index)
            .copied()
            .ok_or(SceneError::IndexOutOfRange {
                index,
                len: children.len(),
            })
    }

    pub fn child_index(&self, parent: NodeId, child: NodeId) -> Result<usize, SceneError> {
        self.try_node(parent)?
            .children
            .iter()
            .position(|&c| c == child)
            .ok_or(SceneError::NotAChild { parent, child })
    }

    /// Children in paint order. Empty for leaves and stale ids.
    pub fn children(&self, parent: NodeId) -> &[NodeId] {
        self.node(parent).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn num_children(&self, parent: NodeId) -> usize {
        self.children(parent).len()
    }

    /// Whether `descendant` sits strictly below `ancestor`.
    pub fn contains(&self, ancestor: NodeId, descendant: NodeId) -> bool {
        let mut current = self.parent(descendant);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Stable sort of `parent`'s children by their view properties.
    pub fn sort_children<F>(&mut self, parent: NodeId, mut compare: F) -> Result<(), SceneError>
    where
        F: FnMut(&View, &View) -> Ordering,
    {
        let mut children = std::mem::take(&mut self.try_node_mut(parent)?.children);
        children.sort_by(|&a, &b| match (self.view(a), self.view(b)) {
            (Some(va), Some(vb)) => compare(va, vb),
            _ => Ordering::Equal,
        });
        self.try_node_mut(parent)?.children = children;
        Ok(())
    }
}
