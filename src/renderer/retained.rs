//! Retained-mode backend.
//!
//! Mirrors the scene as a tree of persistent [`Element`]s, the way a
//! document-style host keeps one element per node. Each frame the scene is
//! diffed against the elements and only the properties whose value changed
//! are written. Elements of nodes no longer reachable are removed.

use std::collections::HashMap;

use super::{
    BackendKind, Capabilities, FrameStats, Painter, Renderer, RendererConfig, draw_node,
    report_draw_error,
};
use crate::drawable::{Drawable, ResourceId};
use crate::error::{BackendError, DrawError};
use crate::geometry::Rect;
use crate::matrix::Matrix;
use crate::scene::{NodeId, Scene, ShapeContent};
use crate::surface::Surface;

/// One paint layer of an element.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementContent {
    /// A region of a resource, shown in a `width` x `height` box.
    Image {
        resource: ResourceId,
        rect: Rect,
        offset: (f32, f32),
        width: f32,
        height: f32,
    },
    /// A shape's cached raster.
    Raster {
        resource: ResourceId,
        offset: (f32, f32),
    },
}

/// Properties written to an element. Transform and opacity are relative
/// to the parent element.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementStyle {
    pub transform: Matrix,
    pub opacity: f32,
    pub visible: bool,
    pub width: f32,
    pub height: f32,
    pub content: Vec<ElementContent>,
}

#[derive(Debug, Clone)]
pub struct Element {
    style: ElementStyle,
    children: Vec<NodeId>,
    seen_frame: u64,
}

impl Element {
    pub fn style(&self) -> &ElementStyle {
        &self.style
    }

    /// Child elements in stacking order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Persistent elements keyed by the node they mirror.
#[derive(Debug, Default)]
pub struct ElementTree {
    elements: HashMap<NodeId, Element>,
    root: Option<NodeId>,
}

impl ElementTree {
    pub fn get(&self, node: NodeId) -> Option<&Element> {
        self.elements.get(&node)
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    fn clear(&mut self) {
        self.elements.clear();
        self.root = None;
    }
}

/// Collects what a node paints instead of painting it.
struct RecordingPainter {
    content: Vec<ElementContent>,
    dirty: bool,
}

impl RecordingPainter {
    fn check(drawable: &Drawable) -> Result<bool, DrawError> {
        if drawable.resource().is_none() || drawable.rect().is_empty() {
            return Ok(false);
        }
        if !drawable.rect_in_bounds() {
            return Err(DrawError::SourceOutOfBounds);
        }
        Ok(true)
    }
}

impl Painter for RecordingPainter {
    fn kind(&self) -> BackendKind {
        BackendKind::Retained
    }

    fn draw_drawable(
        &mut self,
        drawable: &Drawable,
        width: f32,
        height: f32,
    ) -> Result<(), DrawError> {
        if width <= 0.0 || height <= 0.0 || !Self::check(drawable)? {
            return Ok(());
        }
        let Some(resource) = drawable.resource() else {
            return Ok(());
        };
        self.dirty |= drawable.take_dirty();
        self.content.push(ElementContent::Image {
            resource: resource.id(),
            rect: drawable.rect(),
            offset: drawable.offset(),
            width,
            height,
        });
        Ok(())
    }

    fn draw_shape(&mut self, shape: &ShapeContent) -> Result<(), DrawError> {
        let cache = shape.cache();
        if !Self::check(cache)? {
            return Ok(());
        }
        let Some(resource) = cache.resource() else {
            return Ok(());
        };
        self.dirty |= cache.take_dirty();
        self.content.push(ElementContent::Raster {
            resource: resource.id(),
            offset: cache.offset(),
        });
        Ok(())
    }
}

pub struct RetainedRenderer {
    tree: ElementTree,
    frame: u64,
    ready: bool,
}

impl RetainedRenderer {
    pub fn new() -> Self {
        Self {
            tree: ElementTree::default(),
            frame: 0,
            ready: false,
        }
    }

    pub fn elements(&self) -> &ElementTree {
        &self.tree
    }

    fn sync_node(&mut self, scene: &Scene, id: NodeId, stats: &mut FrameStats) {
        let Some(view) = scene.view(id) else {
            return;
        };
        stats.nodes_visited += 1;
        let visible = view.is_visible();
        let opacity = view.effective_alpha();

        // Hidden or transparent nodes keep their previous content
        let painted = if visible && opacity > 0.0 {
            let mut painter = RecordingPainter {
                content: Vec::new(),
                dirty: false,
            };
            match draw_node(scene, id, &mut painter) {
                Ok(()) => Some(painter),
                Err(err) => {
                    report_draw_error(id, BackendKind::Retained, &err, stats);
                    None
                }
            }
        } else {
            None
        };

        let transform = view.local_matrix();
        let (width, height) = (view.width(), view.height());
        let children = scene.children(id);
        let frame = self.frame;

        match self.tree.elements.get_mut(&id) {
            None => {
                let content = painted.map(|p| p.content).unwrap_or_default();
                if !content.is_empty() {
                    stats.nodes_drawn += 1;
                }
                self.tree.elements.insert(
                    id,
                    Element {
                        style: ElementStyle {
                            transform,
                            opacity,
                            visible,
                            width,
                            height,
                            content,
                        },
                        children: children.to_vec(),
                        seen_frame: frame,
                    },
                );
                stats.elements_created += 1;
            }
            Some(element) => {
                element.seen_frame = frame;
                let style = &mut element.style;
                let mut writes = 0;
                write_if_changed(&mut style.transform, transform, &mut writes);
                write_if_changed(&mut style.opacity, opacity, &mut writes);
                write_if_changed(&mut style.visible, visible, &mut writes);
                write_if_changed(&mut style.width, width, &mut writes);
                write_if_changed(&mut style.height, height, &mut writes);
                if let Some(painter) = painted {
                    if painter.dirty || style.content != painter.content {
                        style.content = painter.content;
                        writes += 1;
                    }
                    if !style.content.is_empty() {
                        stats.nodes_drawn += 1;
                    }
                }
                if element.children != children {
                    element.children = children.to_vec();
                    writes += 1;
                }
                stats.element_writes += writes;
            }
        }

        for &child in children {
            self.sync_node(scene, child, stats);
        }
    }

    fn sweep(&mut self, stats: &mut FrameStats) {
        let frame = self.frame;
        let before = self.tree.elements.len();
        self.tree.elements.retain(|_, e| e.seen_frame == frame);
        stats.elements_removed = (before - self.tree.elements.len()) as u32;
    }
}

impl Default for RetainedRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn write_if_changed<T: PartialEq>(slot: &mut T, value: T, writes: &mut u32) {
    if *slot != value {
        *slot = value;
        *writes += 1;
    }
}

impl Renderer for RetainedRenderer {
    fn kind(&self) -> BackendKind {
        BackendKind::Retained
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::RETAINED
    }

    fn init(&mut self, surface: &Surface, _config: &RendererConfig) -> Result<(), BackendError> {
        self.tree.clear();
        self.ready = true;
        log::debug!(
            "retained backend ready for {}x{} surface",
            surface.width(),
            surface.height()
        );
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn resize(&mut self, width: u32, height: u32) {
        log::trace!("retained backend resized to {}x{}", width, height);
    }

    fn render(
        &mut self,
        scene: &Scene,
        root: NodeId,
        _surface: &mut Surface,
    ) -> Result<FrameStats, BackendError> {
        if !self.ready {
            return Err(BackendError::ContextLost(BackendKind::Retained));
        }
        self.frame += 1;
        let mut stats = FrameStats::default();

        if self.tree.root != Some(root) {
            self.tree.root = Some(root);
        }
        self.sync_node(scene, root, &mut stats);
        self.sweep(&mut stats);

        log::trace!("retained frame: {:?}", stats);
        Ok(stats)
    }

    fn release(&mut self) {
        self.tree.clear();
        self.ready = false;
    }
}
