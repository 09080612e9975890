//! Per-node hooks and the update pass.

use std::time::Duration;

use crate::error::{DrawError, SceneError};
use crate::renderer::{Painter, paint_content};

use super::{Content, NodeId, Scene, View, ViewMut};

/// Custom per-node logic.
///
/// `update` runs once per frame with the frame's delta; `render` paints the
/// node under the transform and alpha the renderer has already set up on
/// the painter, and receives the delta of the update pass that preceded it.
pub trait Behavior: 'static {
    fn update(&mut self, ctx: &mut UpdateContext<'_>, delta: Duration) {
        let _ = (ctx, delta);
    }

    fn render(
        &self,
        view: &View,
        content: &Content,
        painter: &mut dyn Painter,
        delta: Duration,
    ) -> Result<(), DrawError> {
        let _ = delta;
        paint_content(view, content, painter)
    }
}

struct UpdateFn<F>(F);

impl<F> Behavior for UpdateFn<F>
where
    F: FnMut(&mut UpdateContext<'_>, Duration) + 'static,
{
    fn update(&mut self, ctx: &mut UpdateContext<'_>, delta: Duration) {
        (self.0)(ctx, delta)
    }
}

/// Scene access granted to a behavior while it runs.
///
/// The behavior is taken out of its node for the duration of the call, so
/// the whole scene is available, including the running node itself.
pub struct UpdateContext<'a> {
    scene: &'a mut Scene,
    node: NodeId,
}

impl<'a> UpdateContext<'a> {
    /// The node whose hook is running.
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn scene(&self) -> &Scene {
        &*self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut *self.scene
    }

    pub fn view(&self) -> Option<&View> {
        self.scene.view(self.node)
    }

    pub fn view_mut(&mut self) -> Result<ViewMut<'_>, SceneError> {
        self.scene.view_mut(self.node)
    }

    /// Detach the running node from its owner. It stays alive.
    pub fn remove_self(&mut self) -> Result<(), SceneError> {
        self.scene.detach(self.node)
    }

    /// Remove the running node and its subtree from the scene.
    pub fn dispose_self(&mut self) -> Result<(), SceneError> {
        self.scene.dispose(self.node)
    }
}

impl Scene {
    pub fn set_behavior(
        &mut self,
        id: NodeId,
        behavior: impl Behavior,
    ) -> Result<(), SceneError> {
        self.try_node_mut(id)?.behavior = Some(Box::new(behavior));
        Ok(())
    }

    /// Install a closure as the node's update hook.
    pub fn on_update<F>(&mut self, id: NodeId, f: F) -> Result<(), SceneError>
    where
        F: FnMut(&mut UpdateContext<'_>, Duration) + 'static,
    {
        self.set_behavior(id, UpdateFn(f))
    }

    pub fn clear_behavior(&mut self, id: NodeId) -> Result<(), SceneError> {
        self.try_node_mut(id)?.behavior = None;
        Ok(())
    }

    pub fn has_behavior(&self, id: NodeId) -> bool {
        self.node(id).is_some_and(|n| n.behavior.is_some())
    }

    /// Delta of the most recent update pass, zero before the first.
    pub fn frame_delta(&self) -> Duration {
        self.frame_delta
    }

    pub(crate) fn behavior(&self, id: NodeId) -> Option<&dyn Behavior> {
        self.node(id).and_then(|n| n.behavior.as_deref())
    }

    /// Run one update pass over the subtree at `root`.
    ///
    /// Depth first: a node's hook runs before its children, children run in
    /// sequence order over a snapshot taken after the parent's hook. Every
    /// node runs at most once per pass, and a node that left its owner
    /// during its own hook does not update its children this pass.
    pub fn update(&mut self, root: NodeId, delta: Duration) {
        self.update_pass += 1;
        self.frame_delta = delta;
        let pass = self.update_pass;
        let owner = self.parent(root);
        self.update_node(root, owner, delta, pass);
    }

    fn update_node(&mut self, id: NodeId, owner: Option<NodeId>, delta: Duration, pass: u64) {
        let Some(node) = self.node_mut(id) else {
            return;
        };
        if node.update_stamp == pass {
            return;
        }
        node.update_stamp = pass;
        let behavior = node.behavior.take();

        if let Some(mut behavior) = behavior {
            let mut ctx = UpdateContext { scene: self, node: id };
            behavior.update(&mut ctx, delta);

            // Restore unless the node is gone or the hook installed a new one
            if let Some(node) = self.node_mut(id)
                && node.behavior.is_none()
            {
                node.behavior = Some(behavior);
            }
        }

        if !self.contains_node(id) || self.parent(id) != owner {
            log::trace!("node {:?} left its owner during update", id);
            return;
        }

        let snapshot = self.children(id).to_vec();
        for child in snapshot {
            self.update_node(child, Some(id), delta, pass);
        }
    }
}
