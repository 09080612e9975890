//! Per-stage rasterization of vector content.
//!
//! Backends without native path support draw shapes from a cached raster.
//! The cache owns one scratch pixmap, reused while a shape fits in it without
//! leaving most of it idle; each stale shape is painted into it and the
//! painted region is copied out as the shape's resource.

use resvg::tiny_skia as sk;

use crate::drawable::{Drawable, Resource};
use crate::renderer::walk;
use crate::scene::{NodeId, Scene};
use crate::shape::Shape;

/// A scratch at least this many times larger than the request, by area, is
/// reallocated to the requested size.
const MAX_SCRATCH_WASTE: u64 = 4;

pub struct RasterCache {
    scratch: Option<sk::Pixmap>,
    rasterized: u64,
}

impl RasterCache {
    pub fn new() -> Self {
        Self {
            scratch: None,
            rasterized: 0,
        }
    }

    /// Total shapes rasterized over the cache's lifetime.
    pub fn rasterized(&self) -> u64 {
        self.rasterized
    }

    /// Scratch size in pixels, if allocated.
    pub fn scratch_size(&self) -> Option<(u32, u32)> {
        self.scratch.as_ref().map(|p| (p.width(), p.height()))
    }

    /// Re-rasterize every stale shape reachable and visible under `root`.
    /// Returns the number of shapes rasterized.
    pub fn refresh(&mut self, scene: &mut Scene, root: NodeId) -> u32 {
        let mut stale = Vec::new();
        let view: &Scene = scene;
        let walked = walk(view, root, |item| {
            if view.shape(item.node).is_some_and(|s| s.is_stale()) {
                stale.push(item.node);
            }
        });
        if let Err(err) = walked {
            log::error!("raster cache walk from {:?} failed: {}", root, err);
            return 0;
        }

        let mut count = 0;
        for id in stale {
            let Some(shape) = scene.shape(id).map(|s| s.shape().clone()) else {
                continue;
            };
            let drawable = self.rasterize(&shape);
            if let Some(content) = scene.shape_mut(id) {
                content.bind_raster(drawable);
                count += 1;
            }
        }
        self.rasterized += count as u64;
        if count > 0 {
            log::debug!("rasterized {} shapes", count);
        }
        count
    }

    fn rasterize(&mut self, shape: &Shape) -> Drawable {
        let bounds = shape.bounds();
        let width = bounds.width.ceil() as u32;
        let height = bounds.height.ceil() as u32;
        if bounds.is_empty() || width == 0 || height == 0 {
            return Drawable::new();
        }

        let Some(scratch) = self.scratch_for(width, height) else {
            return Drawable::new();
        };
        scratch.fill(sk::Color::TRANSPARENT);
        shape.paint(
            &mut *scratch,
            sk::Transform::from_translate(-bounds.x, -bounds.y),
            1.0,
        );

        let Some(region) = sk::IntRect::from_xywh(0, 0, width, height) else {
            return Drawable::new();
        };
        match scratch.clone_rect(region) {
            Some(pixmap) => {
                let mut drawable = Drawable::with_resource(Resource::from_pixmap(pixmap), None);
                drawable.set_offset(bounds.x, bounds.y);
                drawable
            }
            None => Drawable::new(),
        }
    }

    /// Scratch pixmap of at least `width` x `height`.
    fn scratch_for(&mut self, width: u32, height: u32) -> Option<&mut sk::Pixmap> {
        let requested = width as u64 * height as u64;
        let reusable = self.scratch.as_ref().is_some_and(|p| {
            let area = p.width() as u64 * p.height() as u64;
            p.width() >= width && p.height() >= height && area <= requested * MAX_SCRATCH_WASTE
        });
        if !reusable {
            self.scratch = sk::Pixmap::new(width, height);
        }
        self.scratch.as_mut()
    }
}

impl Default for RasterCache {
    fn default() -> Self {
        Self::new()
    }
}
