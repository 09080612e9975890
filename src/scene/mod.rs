//! Arena-based scene storage.
//!
//! Every node of a scene lives in one [`Scene`], addressed by a generational
//! [`NodeId`]. Ownership is the `children` sequence of the containing node;
//! the `parent` field is a lookup-only back reference.
//!
//! ## Key Features
//!
//! - **Generational Indices**: a `NodeId` carries index + generation, so a
//!   stale id never resolves to a node that later reused the slot.
//!
//! - **Dense Storage**: nodes are stored contiguously; removal is a
//!   swap-remove with sparse-map fixup.
//!
//! - **Lazy World Matrices**: each node caches its world matrix behind a
//!   dirty flag. Invariant: a dirty node's descendants are all dirty, which
//!   lets invalidation stop at the first node already marked.
//!
//! Detached nodes stay in the arena until [`Scene::dispose`] removes them.

mod behavior;
mod container;
mod view;

use std::cell::Cell;
use std::time::Duration;

use crate::drawable::Drawable;
use crate::error::SceneError;
use crate::matrix::Matrix;
use crate::shape::Shape;

pub use behavior::{Behavior, UpdateContext};
pub use view::{View, ViewMut};

/// Unique identifier for a node in a scene.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Combines generation (high bits) with index (low bits).
    pub fn as_u64(self) -> u64 {
        ((self.generation as u64) << 32) | (self.index as u64)
    }
}

/// The tagged node variants of a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Leaf node; cannot own children.
    View,
    /// Owns an ordered sequence of children.
    Container,
    /// Root container bound to a surface; never has an owner.
    Stage,
}

impl NodeKind {
    pub fn is_container(self) -> bool {
        matches!(self, NodeKind::Container | NodeKind::Stage)
    }
}

/// What a node paints.
#[derive(Debug, Clone, Default)]
pub enum Content {
    /// Pure grouping; nothing to draw.
    #[default]
    None,
    Drawable(Drawable),
    Shape(ShapeContent),
}

impl Content {
    pub fn drawable(&self) -> Option<&Drawable> {
        match self {
            Content::Drawable(d) => Some(d),
            Content::Shape(s) => Some(&s.cache),
            Content::None => None,
        }
    }
}

/// A vector shape plus the raster it was last cached to.
#[derive(Debug, Clone)]
pub struct ShapeContent {
    shape: Shape,
    cache: Drawable,
    stale: bool,
}

impl ShapeContent {
    pub fn new(shape: Shape) -> Self {
        Self {
            shape,
            cache: Drawable::new(),
            stale: true,
        }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Replace the outline or paint; the cached raster becomes stale.
    pub fn set_shape(&mut self, shape: Shape) {
        if self.shape != shape {
            self.shape = shape;
            self.stale = true;
        }
    }

    /// Raster produced by the stage's raster cache, if any.
    pub fn cache(&self) -> &Drawable {
        &self.cache
    }

    /// Whether the shape changed since it was last rasterized.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub(crate) fn bind_raster(&mut self, cache: Drawable) {
        self.cache = cache;
        self.stale = false;
    }
}

/// Entry in the sparse map, pointing to a dense array slot.
struct SparseEntry {
    /// Index into the dense array, `None` while the slot is free
    dense_index: Option<usize>,
    /// Generation of the current (or last) occupant
    generation: u32,
}

pub(crate) struct Node {
    pub(crate) view: View,
    pub(crate) kind: NodeKind,
    pub(crate) content: Content,
    pub(crate) behavior: Option<Box<dyn Behavior>>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    world: Cell<Matrix>,
    world_dirty: Cell<bool>,
    /// Last update pass this node ran in
    update_stamp: u64,
    /// Back-pointer to sparse array index (for swap-remove fixup)
    sparse_index: u32,
}

/// Central storage for all nodes of a scene.
pub struct Scene {
    dense: Vec<Node>,
    sparse: Vec<SparseEntry>,
    free_indices: Vec<u32>,
    update_pass: u64,
    frame_delta: Duration,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            dense: Vec::new(),
            sparse: Vec::new(),
            free_indices: Vec::new(),
            update_pass: 0,
            frame_delta: Duration::ZERO,
        }
    }

    /// Create a detached leaf node.
    pub fn create_view(&mut self, view: View) -> Result<NodeId, SceneError> {
        self.create(NodeKind::View, view)
    }

    /// Create a detached container node.
    pub fn create_container(&mut self, view: View) -> Result<NodeId, SceneError> {
        self.create(NodeKind::Container, view)
    }

    /// Create a detached leaf bound to a drawable. A view without a size
    /// adopts the drawable's source rect size.
    pub fn create_bitmap(&mut self, view: View, drawable: Drawable) -> Result<NodeId, SceneError> {
        let id = self.create_view(view)?;
        self.set_drawable(id, drawable)?;
        Ok(id)
    }

    /// Create a detached vector leaf.
    pub fn create_shape(&mut self, view: View, shape: Shape) -> Result<NodeId, SceneError> {
        let id = self.create_view(view)?;
        self.set_shape(id, shape)?;
        Ok(id)
    }

    pub(crate) fn create_stage_root(&mut self, width: f32, height: f32) -> NodeId {
        let view = View::new().size(width, height);
        self.register(NodeKind::Stage, view)
    }

    fn create(&mut self, kind: NodeKind, view: View) -> Result<NodeId, SceneError> {
        view.validate()?;
        Ok(self.register(kind, view))
    }

    fn register(&mut self, kind: NodeKind, view: View) -> NodeId {
        let (sparse_index, generation) = if let Some(idx) = self.free_indices.pop() {
            // Reuse a freed slot - increment generation
            let generation = self.sparse[idx as usize].generation.wrapping_add(1);
            (idx, generation)
        } else {
            let idx = self.sparse.len() as u32;
            self.sparse.push(SparseEntry {
                dense_index: None,
                generation: 0,
            });
            (idx, 0)
        };

        let dense_index = self.dense.len();
        self.dense.push(Node {
            view,
            kind,
            content: Content::None,
            behavior: None,
            parent: None,
            children: Vec::new(),
            world: Cell::new(Matrix::IDENTITY),
            world_dirty: Cell::new(true),
            update_stamp: 0,
            sparse_index,
        });

        self.sparse[sparse_index as usize] = SparseEntry {
            dense_index: Some(dense_index),
            generation,
        };

        NodeId::new(sparse_index, generation)
    }

    /// Remove a node and its whole subtree from the scene.
    ///
    /// The node is detached from its owner first. Ids of removed nodes
    /// become stale. A stage root cannot be disposed.
    pub fn dispose(&mut self, id: NodeId) -> Result<(), SceneError> {
        if self.try_node(id)?.kind == NodeKind::Stage {
            return Err(SceneError::StageRoot(id));
        }
        self.detach(id)?;

        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            if let Some(children) = self.node(current).map(|n| n.children.clone()) {
                pending.extend(children);
            }
            self.unregister(current);
        }
        Ok(())
    }

    fn unregister(&mut self, id: NodeId) {
        let Some(dense_index) = self.dense_index(id) else {
            return;
        };

        let last_dense_index = self.dense.len() - 1;
        self.dense.swap_remove(dense_index);

        // Fix up the moved node's sparse entry (if we didn't remove the last element)
        if dense_index != last_dense_index {
            let moved_sparse_idx = self.dense[dense_index].sparse_index;
            self.sparse[moved_sparse_idx as usize].dense_index = Some(dense_index);
        }

        // Keep the generation so the next occupant gets a fresh one
        self.sparse[id.index as usize].dense_index = None;
        self.free_indices.push(id.index);
    }

    /// Get the dense array index for a NodeId, validating generation.
    fn dense_index(&self, id: NodeId) -> Option<usize> {
        self.sparse
            .get(id.index as usize)
            .filter(|e| e.generation == id.generation)
            .and_then(|e| e.dense_index)
    }

    pub(crate) fn node(&self, id: NodeId) -> Option<&Node> {
        self.dense_index(id).map(|idx| &self.dense[idx])
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.dense_index(id).map(|idx| &mut self.dense[idx])
    }

    pub(crate) fn try_node(&self, id: NodeId) -> Result<&Node, SceneError> {
        self.node(id).ok_or(SceneError::StaleNode(id))
    }

    pub(crate) fn try_node_mut(&mut self, id: NodeId) -> Result<&mut Node, SceneError> {
        self.node_mut(id).ok_or(SceneError::StaleNode(id))
    }

    /// Check if a node is registered.
    pub fn contains_node(&self, id: NodeId) -> bool {
        self.dense_index(id).is_some()
    }

    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.node(id).map(|n| n.kind)
    }

    /// The owning container, if any.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    pub fn content(&self, id: NodeId) -> Option<&Content> {
        self.node(id).map(|n| &n.content)
    }

    /// Replace what a node paints.
    pub fn set_content(&mut self, id: NodeId, content: Content) -> Result<(), SceneError> {
        self.try_node_mut(id)?.content = content;
        Ok(())
    }

    pub fn set_drawable(&mut self, id: NodeId, drawable: Drawable) -> Result<(), SceneError> {
        let node = self.try_node_mut(id)?;
        if node.view.width() == 0.0 && node.view.height() == 0.0 {
            let rect = drawable.rect();
            node.view.set_size_unchecked(rect.width, rect.height);
        }
        drawable.mark_dirty();
        node.content = Content::Drawable(drawable);
        Ok(())
    }

    pub fn drawable(&self, id: NodeId) -> Option<&Drawable> {
        self.content(id).and_then(Content::drawable)
    }

    /// Mutable access to a node's bound drawable (not a shape's cache).
    pub fn drawable_mut(&mut self, id: NodeId) -> Option<&mut Drawable> {
        match &mut self.node_mut(id)?.content {
            Content::Drawable(d) => Some(d),
            _ => None,
        }
    }

    /// Bind or update a vector shape. A view without a size adopts the
    /// shape's bounds.
    pub fn set_shape(&mut self, id: NodeId, shape: Shape) -> Result<(), SceneError> {
        let node = self.try_node_mut(id)?;
        if node.view.width() == 0.0 && node.view.height() == 0.0 {
            let bounds = shape.bounds();
            node.view.set_size_unchecked(bounds.right().max(0.0), bounds.bottom().max(0.0));
        }
        match &mut node.content {
            Content::Shape(existing) => existing.set_shape(shape),
            other => *other = Content::Shape(ShapeContent::new(shape)),
        }
        Ok(())
    }

    pub fn shape(&self, id: NodeId) -> Option<&ShapeContent> {
        match self.content(id)? {
            Content::Shape(s) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn shape_mut(&mut self, id: NodeId) -> Option<&mut ShapeContent> {
        match &mut self.node_mut(id)?.content {
            Content::Shape(s) => Some(s),
            _ => None,
        }
    }

    /// Find the first node (in storage order) with the given name.
    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.dense
            .iter()
            .find(|n| n.view.name() == Some(name))
            .map(|n| NodeId::new(n.sparse_index, self.sparse[n.sparse_index as usize].generation))
    }

    /// Get the number of nodes in the scene, attached or not.
    pub fn len(&self) -> usize {
        self.dense.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    /// Cached local-to-world matrix, recomputed only when dirty.
    pub fn world_matrix(&self, id: NodeId) -> Result<Matrix, SceneError> {
        let node = self.try_node(id)?;
        if !node.world_dirty.get() {
            return Ok(node.world.get());
        }

        let parent_world = match node.parent {
            Some(parent) => self.world_matrix(parent)?,
            None => Matrix::IDENTITY,
        };
        let world = parent_world.append(&node.view.local_matrix());
        node.world.set(world);
        node.world_dirty.set(false);
        Ok(world)
    }

    pub fn local_matrix(&self, id: NodeId) -> Result<Matrix, SceneError> {
        Ok(self.try_node(id)?.view.local_matrix())
    }

    pub(crate) fn is_world_dirty(&self, id: NodeId) -> bool {
        self.node(id).map(|n| n.world_dirty.get()).unwrap_or(false)
    }

    /// Mark a node and its subtree as needing a world matrix recompute.
    pub(crate) fn invalidate_world(&mut self, id: NodeId) {
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            let Some(node) = self.node(current) else {
                continue;
            };
            // Already dirty: its subtree is dirty too
            if node.world_dirty.get() {
                continue;
            }
            node.world_dirty.set(true);
            pending.extend_from_slice(&node.children);
        }
    }

    /// Map a point from a node's local space to root space.
    pub fn local_to_global(&self, id: NodeId, x: f32, y: f32) -> Result<(f32, f32), SceneError> {
        Ok(self.world_matrix(id)?.transform_point(x, y))
    }

    /// Map a point from root space into a node's local space.
    pub fn global_to_local(&self, id: NodeId, x: f32, y: f32) -> Result<(f32, f32), SceneError> {
        Ok(self.world_matrix(id)?.invert()?.transform_point(x, y))
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}
