//! Backend-abstracted rendering.
//!
//! A renderer turns the tree under a root node into draw operations for one
//! backend. Renderers hold only backend context (device handles, texture and
//! element caches); everything they paint is re-derived from the [`Scene`]
//! each frame, so a backend can be released and re-initialized at any time.
//!
//! Three backends are available:
//!
//! - [`BitmapRenderer`]: immediate mode on a CPU pixmap, redrawn every frame.
//! - [`GpuRenderer`]: wgpu, batching adjacent quads that share a texture.
//! - [`RetainedRenderer`]: keeps an [`ElementTree`](retained::ElementTree)
//!   and only writes element properties that changed.

pub mod bitmap;
pub mod gpu;
pub mod retained;

use std::fmt;

use bitflags::bitflags;

use crate::drawable::Drawable;
use crate::error::{BackendError, DrawError, SceneError};
use crate::geometry::Color;
use crate::matrix::Matrix;
use crate::scene::{Content, NodeId, Scene, ShapeContent, View};
use crate::surface::Surface;

pub use bitmap::BitmapRenderer;
pub use gpu::GpuRenderer;
pub use retained::RetainedRenderer;

/// Concrete backend of a renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Bitmap,
    Gpu,
    Retained,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendKind::Bitmap => "bitmap",
            BackendKind::Gpu => "gpu",
            BackendKind::Retained => "retained",
        };
        f.write_str(name)
    }
}

/// Backend requested by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendType {
    /// Best available, trying GPU first.
    #[default]
    Auto,
    Gpu,
    Bitmap,
    Retained,
}

/// Backends tried for a request, in order.
pub fn fallback_chain(requested: BackendType) -> &'static [BackendKind] {
    match requested {
        BackendType::Auto | BackendType::Gpu => {
            &[BackendKind::Gpu, BackendKind::Bitmap, BackendKind::Retained]
        }
        BackendType::Bitmap => &[BackendKind::Bitmap, BackendKind::Retained],
        BackendType::Retained => &[BackendKind::Retained],
    }
}

bitflags! {
    /// What a backend can do natively.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Capabilities: u32 {
        /// Redraws the whole frame from scratch.
        const IMMEDIATE = 1 << 0;
        /// Groups draws that share a texture.
        const BATCHING = 1 << 1;
        /// Keeps persistent per-node objects between frames.
        const RETAINED = 1 << 2;
        /// Paints shapes directly, without the raster cache.
        const VECTOR_PATHS = 1 << 3;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpuConfig {
    pub power_preference: wgpu::PowerPreference,
    /// Only accept a software adapter.
    pub force_fallback_adapter: bool,
    /// wgpu backends the instance may use. Empty disables the GPU backend.
    pub backends: wgpu::Backends,
}

impl Default for GpuConfig {
    fn default() -> Self {
        Self {
            power_preference: wgpu::PowerPreference::LowPower,
            force_fallback_adapter: false,
            backends: wgpu::Backends::PRIMARY,
        }
    }
}

impl GpuConfig {
    pub fn power_preference(mut self, preference: wgpu::PowerPreference) -> Self {
        self.power_preference = preference;
        self
    }

    pub fn force_fallback_adapter(mut self, force: bool) -> Self {
        self.force_fallback_adapter = force;
        self
    }

    pub fn backends(mut self, backends: wgpu::Backends) -> Self {
        self.backends = backends;
        self
    }
}

/// Configuration shared by all backends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RendererConfig {
    /// Clear color of immediate backends.
    pub background: Color,
    pub gpu: GpuConfig,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            background: Color::TRANSPARENT,
            gpu: GpuConfig::default(),
        }
    }
}

impl RendererConfig {
    pub fn background(mut self, color: Color) -> Self {
        self.background = color;
        self
    }

    pub fn gpu(mut self, gpu: GpuConfig) -> Self {
        self.gpu = gpu;
        self
    }
}

/// Counters for one rendered frame.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameStats {
    pub nodes_visited: u32,
    pub nodes_drawn: u32,
    pub draw_calls: u32,
    pub batches: u32,
    pub texture_uploads: u32,
    pub element_writes: u32,
    pub elements_created: u32,
    pub elements_removed: u32,
    pub failed_nodes: u32,
}

pub trait Renderer {
    fn kind(&self) -> BackendKind;

    fn capabilities(&self) -> Capabilities;

    /// Prepare backend context for `surface`. Called again after context loss.
    fn init(&mut self, surface: &Surface, config: &RendererConfig) -> Result<(), BackendError>;

    fn is_ready(&self) -> bool;

    fn resize(&mut self, width: u32, height: u32);

    /// Paint the tree under `root`, in paint order.
    ///
    /// Per-node failures are logged and counted; only loss of the backend
    /// context fails the frame.
    fn render(
        &mut self,
        scene: &Scene,
        root: NodeId,
        surface: &mut Surface,
    ) -> Result<FrameStats, BackendError>;

    /// Drop backend context. `render` reports `ContextLost` until `init`
    /// runs again.
    fn release(&mut self);
}

/// Drawing capability handed to [`Behavior::render`](crate::scene::Behavior::render).
///
/// The renderer positions the painter (world matrix, effective alpha) before
/// each node's hook, so calls draw in the node's local space.
pub trait Painter {
    fn kind(&self) -> BackendKind;

    /// Paint the drawable's source rect into a `width` x `height` box at the
    /// drawable offset. A drawable without a resource is a no-op.
    fn draw_drawable(&mut self, drawable: &Drawable, width: f32, height: f32)
    -> Result<(), DrawError>;

    fn draw_shape(&mut self, shape: &ShapeContent) -> Result<(), DrawError>;
}

/// Default node painting: forward the bound content to the painter.
pub fn paint_content(
    view: &View,
    content: &Content,
    painter: &mut dyn Painter,
) -> Result<(), DrawError> {
    match content {
        Content::None => Ok(()),
        Content::Drawable(drawable) => {
            let (width, height) = draw_size(view, drawable);
            painter.draw_drawable(drawable, width, height)
        }
        Content::Shape(shape) => painter.draw_shape(shape),
    }
}

/// Box a drawable is painted into; a view without a size uses the source rect.
fn draw_size(view: &View, drawable: &Drawable) -> (f32, f32) {
    if view.width() == 0.0 && view.height() == 0.0 {
        let rect = drawable.rect();
        (rect.width, rect.height)
    } else {
        (view.width(), view.height())
    }
}

/// A node reached by the paint walk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaintItem {
    pub node: NodeId,
    pub world: Matrix,
    /// Product of the clamped alphas from the root down to this node.
    pub alpha: f32,
}

/// Visit the tree under `root` in paint order.
///
/// Invisible subtrees and subtrees whose effective alpha is zero are
/// skipped entirely. Returns the number of nodes visited.
pub fn walk(
    scene: &Scene,
    root: NodeId,
    mut visit: impl FnMut(PaintItem),
) -> Result<u32, SceneError> {
    let mut visited = 0;
    walk_node(scene, root, 1.0, &mut visit, &mut visited)?;
    Ok(visited)
}

fn walk_node(
    scene: &Scene,
    id: NodeId,
    parent_alpha: f32,
    visit: &mut impl FnMut(PaintItem),
    visited: &mut u32,
) -> Result<(), SceneError> {
    let view = scene.view(id).ok_or(SceneError::StaleNode(id))?;
    *visited += 1;
    let alpha = parent_alpha * view.effective_alpha();
    if !view.is_visible() || alpha <= 0.0 {
        return Ok(());
    }

    visit(PaintItem {
        node: id,
        world: scene.world_matrix(id)?,
        alpha,
    });

    for &child in scene.children(id) {
        walk_node(scene, child, alpha, visit, visited)?;
    }
    Ok(())
}

/// Paint items for one frame. A stale root paints nothing.
pub(crate) fn collect_items(scene: &Scene, root: NodeId, stats: &mut FrameStats) -> Vec<PaintItem> {
    let mut items = Vec::new();
    match walk(scene, root, |item| items.push(item)) {
        Ok(visited) => stats.nodes_visited = visited,
        Err(err) => {
            log::error!("paint walk from {:?} failed: {}", root, err);
            items.clear();
        }
    }
    items
}

/// Run a node's render hook, or the default painting when it has none.
/// Hooks receive the delta of the scene's last update pass.
pub(crate) fn draw_node(
    scene: &Scene,
    node: NodeId,
    painter: &mut dyn Painter,
) -> Result<(), DrawError> {
    let (Some(view), Some(content)) = (scene.view(node), scene.content(node)) else {
        return Ok(());
    };
    match scene.behavior(node) {
        Some(behavior) => behavior.render(view, content, painter, scene.frame_delta()),
        None => paint_content(view, content, painter),
    }
}

/// Log a per-node draw failure and keep going.
pub(crate) fn report_draw_error(node: NodeId, kind: BackendKind, err: &DrawError, stats: &mut FrameStats) {
    log::error!("{} backend failed to draw node {:?}: {}", kind, node, err);
    stats.failed_nodes += 1;
}

/// One of the closed set of backends.
pub enum AnyRenderer {
    Bitmap(BitmapRenderer),
    Gpu(GpuRenderer),
    Retained(RetainedRenderer),
}

impl AnyRenderer {
    /// An uninitialized renderer for `kind`.
    pub fn new(kind: BackendKind) -> Self {
        match kind {
            BackendKind::Bitmap => AnyRenderer::Bitmap(BitmapRenderer::new()),
            BackendKind::Gpu => AnyRenderer::Gpu(GpuRenderer::new()),
            BackendKind::Retained => AnyRenderer::Retained(RetainedRenderer::new()),
        }
    }

    /// Initialize the first backend of the fallback chain that comes up.
    pub fn select(
        requested: BackendType,
        surface: &Surface,
        config: &RendererConfig,
    ) -> Result<Self, BackendError> {
        select_with(requested, |kind| {
            let mut renderer = AnyRenderer::new(kind);
            renderer.init(surface, config)?;
            Ok(renderer)
        })
    }

    pub fn as_bitmap(&self) -> Option<&BitmapRenderer> {
        match self {
            AnyRenderer::Bitmap(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_gpu(&self) -> Option<&GpuRenderer> {
        match self {
            AnyRenderer::Gpu(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_retained(&self) -> Option<&RetainedRenderer> {
        match self {
            AnyRenderer::Retained(r) => Some(r),
            _ => None,
        }
    }

    fn inner(&self) -> &dyn Renderer {
        match self {
            AnyRenderer::Bitmap(r) => r,
            AnyRenderer::Gpu(r) => r,
            AnyRenderer::Retained(r) => r,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Renderer {
        match self {
            AnyRenderer::Bitmap(r) => r,
            AnyRenderer::Gpu(r) => r,
            AnyRenderer::Retained(r) => r,
        }
    }
}

impl Renderer for AnyRenderer {
    fn kind(&self) -> BackendKind {
        self.inner().kind()
    }

    fn capabilities(&self) -> Capabilities {
        self.inner().capabilities()
    }

    fn init(&mut self, surface: &Surface, config: &RendererConfig) -> Result<(), BackendError> {
        self.inner_mut().init(surface, config)
    }

    fn is_ready(&self) -> bool {
        self.inner().is_ready()
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.inner_mut().resize(width, height)
    }

    fn render(
        &mut self,
        scene: &Scene,
        root: NodeId,
        surface: &mut Surface,
    ) -> Result<FrameStats, BackendError> {
        self.inner_mut().render(scene, root, surface)
    }

    fn release(&mut self) {
        self.inner_mut().release()
    }
}

/// Walk the fallback chain for `requested`, returning the first backend the
/// factory brings up. Each failure is logged as a warning.
pub fn select_with<R, F>(requested: BackendType, mut factory: F) -> Result<R, BackendError>
where
    F: FnMut(BackendKind) -> Result<R, BackendError>,
{
    for &kind in fallback_chain(requested) {
        match factory(kind) {
            Ok(renderer) => {
                log::info!("using {} backend (requested {:?})", kind, requested);
                return Ok(renderer);
            }
            Err(err) => log::warn!("{} backend failed to initialize, falling back: {}", kind, err),
        }
    }
    Err(BackendError::NoBackend)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_order() {
        assert_eq!(
            fallback_chain(BackendType::Auto),
            &[BackendKind::Gpu, BackendKind::Bitmap, BackendKind::Retained]
        );
        assert_eq!(fallback_chain(BackendType::Gpu), fallback_chain(BackendType::Auto));
        assert_eq!(
            fallback_chain(BackendType::Bitmap),
            &[BackendKind::Bitmap, BackendKind::Retained]
        );
        assert_eq!(fallback_chain(BackendType::Retained), &[BackendKind::Retained]);
    }

    #[test]
    fn test_select_degrades_past_failures() {
        let mut tried = Vec::new();
        let chosen = select_with(BackendType::Auto, |kind| {
            tried.push(kind);
            match kind {
                BackendKind::Gpu => Err(BackendError::Unavailable {
                    kind,
                    reason: "no adapter".into(),
                }),
                other => Ok(other),
            }
        })
        .unwrap();
        assert_eq!(chosen, BackendKind::Bitmap);
        assert_eq!(tried, vec![BackendKind::Gpu, BackendKind::Bitmap]);
    }

    #[test]
    fn test_select_exhausted() {
        let result: Result<(), _> = select_with(BackendType::Bitmap, |kind| {
            Err(BackendError::Unavailable {
                kind,
                reason: "disabled".into(),
            })
        });
        assert_eq!(result, Err(BackendError::NoBackend));
    }

    #[test]
    fn test_walk_skips_hidden_and_transparent_subtrees() {
        let mut scene = Scene::new();
        let root = scene.create_container(View::new()).unwrap();
        let shown = scene.create_view(View::new().alpha(0.5)).unwrap();
        let hidden = scene.create_container(View::new().visible(false)).unwrap();
        let hidden_child = scene.create_view(View::new()).unwrap();
        let clear = scene.create_container(View::new().alpha(-1.0)).unwrap();
        let clear_child = scene.create_view(View::new()).unwrap();
        let half = scene.create_container(View::new().alpha(0.5)).unwrap();
        let quarter = scene.create_view(View::new().alpha(0.5)).unwrap();
        scene.add_child(root, shown).unwrap();
        scene.add_child(root, hidden).unwrap();
        scene.add_child(hidden, hidden_child).unwrap();
        scene.add_child(root, clear).unwrap();
        scene.add_child(clear, clear_child).unwrap();
        scene.add_child(root, half).unwrap();
        scene.add_child(half, quarter).unwrap();

        let mut items = Vec::new();
        let visited = walk(&scene, root, |item| items.push(item)).unwrap();
        let order: Vec<_> = items.iter().map(|i| i.node).collect();
        assert_eq!(order, vec![root, shown, half, quarter]);
        assert_eq!(items[3].alpha, 0.25);
        assert_eq!(visited, 6);
    }
}
