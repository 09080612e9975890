use std::time::Duration;

use crate::error::{BackendError, SceneError};
use crate::raster_cache::RasterCache;
use crate::render_stats;
use crate::renderer::{
    AnyRenderer, BackendKind, BackendType, Capabilities, FrameStats, Renderer, RendererConfig,
};
use crate::scene::{NodeId, Scene};
use crate::surface::Surface;

pub struct StageConfig {
    pub backend: BackendType,
    pub width: u32,
    pub height: u32,
    /// Apply sizes the host reports on the surface at the next tick.
    pub auto_resize: bool,
    pub renderer: RendererConfig,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            backend: BackendType::Auto,
            width: 800,
            height: 600,
            auto_resize: false,
            renderer: RendererConfig::default(),
        }
    }
}

impl StageConfig {
    pub fn backend(mut self, backend: BackendType) -> Self {
        self.backend = backend;
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn auto_resize(mut self, auto_resize: bool) -> Self {
        self.auto_resize = auto_resize;
        self
    }

    pub fn renderer(mut self, renderer: RendererConfig) -> Self {
        self.renderer = renderer;
        self
    }
}

/// Backend request covering the chain entries after `kind`.
fn fallback_after(kind: BackendKind) -> Option<BackendType> {
    match kind {
        BackendKind::Gpu => Some(BackendType::Bitmap),
        BackendKind::Bitmap => Some(BackendType::Retained),
        BackendKind::Retained => None,
    }
}

/// Root of a scene bound to one surface and one renderer.
///
/// The stage owns the scene arena; views are created through
/// [`Stage::scene_mut`] and attached with [`Stage::add`].
pub struct Stage {
    scene: Scene,
    root: NodeId,
    surface: Surface,
    renderer: AnyRenderer,
    raster_cache: RasterCache,
    config: StageConfig,
    last_stats: FrameStats,
}

impl Stage {
    pub fn new(config: StageConfig) -> Result<Self, BackendError> {
        let surface = Surface::new(config.width, config.height);
        Self::with_surface(config, surface)
    }

    /// Bind to an existing surface. The surface's size wins over the
    /// configured one.
    pub fn with_surface(mut config: StageConfig, surface: Surface) -> Result<Self, BackendError> {
        (config.width, config.height) = surface.size();
        let renderer = AnyRenderer::select(config.backend, &surface, &config.renderer)?;

        let mut scene = Scene::new();
        let root = scene.create_stage_root(config.width as f32, config.height as f32);
        log::info!(
            "stage created: {}x{} on {} backend",
            config.width,
            config.height,
            renderer.kind()
        );

        Ok(Self {
            scene,
            root,
            surface,
            renderer,
            raster_cache: RasterCache::new(),
            config,
            last_stats: FrameStats::default(),
        })
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn config(&self) -> &StageConfig {
        &self.config
    }

    /// Append `view` to the stage's children, detaching it from any
    /// previous parent.
    pub fn add(&mut self, view: NodeId) -> Result<(), SceneError> {
        self.scene.add_child(self.root, view)
    }

    /// Detach `view` from the stage. Returns false if it was not a direct
    /// child.
    pub fn remove(&mut self, view: NodeId) -> Result<bool, SceneError> {
        self.scene.remove_child(self.root, view)
    }

    pub fn backend(&self) -> BackendKind {
        self.renderer.kind()
    }

    pub fn renderer(&self) -> &AnyRenderer {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut AnyRenderer {
        &mut self.renderer
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut Surface {
        &mut self.surface
    }

    pub fn raster_cache(&self) -> &RasterCache {
        &self.raster_cache
    }

    pub fn last_stats(&self) -> &FrameStats {
        &self.last_stats
    }

    pub fn update(&mut self, delta: Duration) {
        self.scene.update(self.root, delta);
    }

    /// Draw one frame.
    ///
    /// A lost context is re-initialized and the frame drawn again once. If
    /// the backend cannot come back, the remaining fallback chain is tried.
    pub fn render(&mut self) -> Result<FrameStats, BackendError> {
        if !self.renderer.capabilities().contains(Capabilities::VECTOR_PATHS) {
            let count = self.raster_cache.refresh(&mut self.scene, self.root);
            render_stats::record_rasterized(count);
        }

        let stats = match self.draw() {
            Err(BackendError::ContextLost(kind)) => {
                log::warn!("{} context lost, reinitializing", kind);
                render_stats::record_context_lost();
                self.recover(kind)?;
                self.draw()?
            }
            other => other?,
        };

        self.last_stats = stats;
        render_stats::record_frame(self.renderer.kind(), &stats);
        render_stats::end_frame();
        Ok(stats)
    }

    fn draw(&mut self) -> Result<FrameStats, BackendError> {
        self.renderer
            .render(&self.scene, self.root, &mut self.surface)
    }

    fn recover(&mut self, kind: BackendKind) -> Result<(), BackendError> {
        let Err(err) = self.renderer.init(&self.surface, &self.config.renderer) else {
            return Ok(());
        };
        log::warn!("{} backend could not be restored: {}", kind, err);
        let Some(next) = fallback_after(kind) else {
            return Err(err);
        };
        self.renderer = AnyRenderer::select(next, &self.surface, &self.config.renderer)?;
        // Fresh backend, nothing cached for shapes it can't paint itself
        if !self.renderer.capabilities().contains(Capabilities::VECTOR_PATHS) {
            self.raster_cache.refresh(&mut self.scene, self.root);
        }
        Ok(())
    }

    /// One full frame: apply a reported size (with `auto_resize`), then
    /// update and render.
    pub fn tick(&mut self, delta: Duration) -> Result<FrameStats, BackendError> {
        if let Some((width, height)) = self.surface.take_reported_size() {
            if self.config.auto_resize {
                self.resize(width, height);
            } else {
                log::debug!("ignoring reported size {}x{}", width, height);
            }
        }
        self.update(delta);
        self.render()
    }

    /// Resize the surface, renderer and root. Returns false when the size
    /// is unchanged.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if !self.surface.resize(width, height) {
            return false;
        }
        self.config.width = width;
        self.config.height = height;
        self.renderer.resize(width, height);
        let resized = self
            .scene
            .view_mut(self.root)
            .and_then(|mut root| root.set_size(width as f32, height as f32).map(|_| ()));
        if let Err(err) = resized {
            log::warn!("could not resize stage root: {}", err);
        }
        log::info!("stage resized to {}x{}", width, height);
        true
    }
}

impl Drop for Stage {
    fn drop(&mut self) {
        self.renderer.release();
    }
}
