//! Immediate-mode backend on a CPU pixmap.

use resvg::tiny_skia as sk;

use super::{
    BackendKind, Capabilities, FrameStats, Painter, Renderer, RendererConfig, collect_items,
    draw_node, report_draw_error,
};
use crate::drawable::Drawable;
use crate::error::{BackendError, DrawError};
use crate::geometry::Color;
use crate::matrix::Matrix;
use crate::scene::{NodeId, Scene, ShapeContent};
use crate::surface::Surface;

/// A node that issued at least one paint operation in the last frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawRecord {
    pub node: NodeId,
    pub world: Matrix,
    pub alpha: f32,
    pub ops: u32,
}

pub struct BitmapRenderer {
    background: Color,
    ready: bool,
    last_draws: Vec<DrawRecord>,
}

impl BitmapRenderer {
    pub fn new() -> Self {
        Self {
            background: Color::TRANSPARENT,
            ready: false,
            last_draws: Vec::new(),
        }
    }

    /// Draws of the last frame, in paint order.
    pub fn last_draws(&self) -> &[DrawRecord] {
        &self.last_draws
    }

    pub fn paint_order(&self) -> Vec<NodeId> {
        self.last_draws.iter().map(|d| d.node).collect()
    }
}

impl Default for BitmapRenderer {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn to_skia_transform(m: &Matrix) -> sk::Transform {
    sk::Transform::from_row(m.a, m.b, m.c, m.d, m.tx, m.ty)
}

struct BitmapPainter<'a> {
    pixmap: &'a mut sk::Pixmap,
    transform: sk::Transform,
    alpha: f32,
    ops: u32,
}

impl Painter for BitmapPainter<'_> {
    fn kind(&self) -> BackendKind {
        BackendKind::Bitmap
    }

    fn draw_drawable(
        &mut self,
        drawable: &Drawable,
        width: f32,
        height: f32,
    ) -> Result<(), DrawError> {
        let Some(resource) = drawable.resource() else {
            return Ok(());
        };
        let src = drawable.rect();
        if src.is_empty() || width <= 0.0 || height <= 0.0 {
            return Ok(());
        }
        if !drawable.rect_in_bounds() {
            return Err(DrawError::SourceOutOfBounds);
        }

        let (ox, oy) = drawable.offset();
        let Some(dst) = sk::Rect::from_xywh(ox, oy, width, height) else {
            return Ok(());
        };
        let (sx, sy) = (width / src.width, height / src.height);
        let quality = if sx == 1.0 && sy == 1.0 {
            sk::FilterQuality::Nearest
        } else {
            sk::FilterQuality::Bilinear
        };
        let pattern_transform = sk::Transform::from_translate(ox, oy)
            .pre_scale(sx, sy)
            .pre_translate(-src.x, -src.y);

        let mut paint = sk::Paint::default();
        paint.shader = sk::Pattern::new(
            resource.pixmap().as_ref(),
            sk::SpreadMode::Pad,
            quality,
            self.alpha,
            pattern_transform,
        );
        self.pixmap.fill_rect(dst, &paint, self.transform, None);

        // Resolved from the source every frame
        drawable.take_dirty();
        self.ops += 1;
        Ok(())
    }

    fn draw_shape(&mut self, shape: &ShapeContent) -> Result<(), DrawError> {
        self.ops += shape.shape().paint(self.pixmap, self.transform, self.alpha);
        Ok(())
    }
}

impl Renderer for BitmapRenderer {
    fn kind(&self) -> BackendKind {
        BackendKind::Bitmap
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::IMMEDIATE | Capabilities::VECTOR_PATHS
    }

    fn init(&mut self, surface: &Surface, config: &RendererConfig) -> Result<(), BackendError> {
        self.background = config.background;
        self.ready = true;
        log::debug!(
            "bitmap backend ready for {}x{} surface",
            surface.width(),
            surface.height()
        );
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn resize(&mut self, width: u32, height: u32) {
        // The frame buffer lives on the surface and follows its size
        log::trace!("bitmap backend resized to {}x{}", width, height);
    }

    fn render(
        &mut self,
        scene: &Scene,
        root: NodeId,
        surface: &mut Surface,
    ) -> Result<FrameStats, BackendError> {
        if !self.ready {
            return Err(BackendError::ContextLost(BackendKind::Bitmap));
        }
        self.last_draws.clear();
        let mut stats = FrameStats::default();

        let Some(pixmap) = surface.frame_mut() else {
            // Zero-sized surface: nothing to paint into
            return Ok(stats);
        };
        pixmap.fill(self.background.to_skia());

        for item in collect_items(scene, root, &mut stats) {
            let mut painter = BitmapPainter {
                pixmap: &mut *pixmap,
                transform: to_skia_transform(&item.world),
                alpha: item.alpha,
                ops: 0,
            };
            let result = draw_node(scene, item.node, &mut painter);
            let ops = painter.ops;

            if let Err(err) = result {
                report_draw_error(item.node, BackendKind::Bitmap, &err, &mut stats);
            }
            if ops > 0 {
                stats.nodes_drawn += 1;
                stats.draw_calls += ops;
                self.last_draws.push(DrawRecord {
                    node: item.node,
                    world: item.world,
                    alpha: item.alpha,
                    ops,
                });
            }
        }

        log::trace!("bitmap frame: {:?}", stats);
        Ok(stats)
    }

    fn release(&mut self) {
        self.ready = false;
        self.last_draws.clear();
    }
}
