//! Paintable resources and the handle that binds them to a node.
//!
//! A [`Resource`] is a decoded, premultiplied RGBA image shared by reference.
//! The loader side of an application hands these over once decoding is done;
//! this crate never blocks on I/O. A [`Drawable`] binds a resource and a
//! source sub-rectangle (atlas frame, sprite-sheet cell) to a node, and
//! carries the dirty flag backends use to decide when to re-upload.

use std::cell::Cell;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use resvg::tiny_skia::{IntSize, Pixmap};

use crate::error::ResourceError;
use crate::geometry::Rect;

/// Process-unique identifier of a decoded resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl ResourceId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        ResourceId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value (for debugging/logging).
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// A decoded image ready to paint. Cloning is cheap.
#[derive(Clone)]
pub struct Resource {
    id: ResourceId,
    pixmap: Arc<Pixmap>,
}

impl Resource {
    /// Wrap an already premultiplied pixmap.
    pub fn from_pixmap(pixmap: Pixmap) -> Self {
        Self {
            id: ResourceId::next(),
            pixmap: Arc::new(pixmap),
        }
    }

    /// Build from straight-alpha RGBA8 pixels.
    pub fn from_rgba8(width: u32, height: u32, mut data: Vec<u8>) -> Result<Self, ResourceError> {
        let size = IntSize::from_wh(width, height)
            .ok_or(ResourceError::InvalidSize { width, height })?;
        if data.len() != width as usize * height as usize * 4 {
            return Err(ResourceError::InvalidSize { width, height });
        }

        for px in data.chunks_exact_mut(4) {
            let a = px[3] as u16;
            if a < 255 {
                px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
                px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
                px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
            }
        }

        let pixmap =
            Pixmap::from_vec(data, size).ok_or(ResourceError::InvalidSize { width, height })?;
        Ok(Self::from_pixmap(pixmap))
    }

    pub fn from_image(image: &image::DynamicImage) -> Result<Self, ResourceError> {
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self::from_rgba8(width, height, rgba.into_raw())
    }

    /// Decode PNG/JPEG/GIF/WebP bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, ResourceError> {
        let image = image::load_from_memory(bytes)?;
        Self::from_image(&image)
    }

    /// Rasterize an SVG document at `scale` times its intrinsic size.
    pub fn from_svg(bytes: &[u8], scale: f32) -> Result<Self, ResourceError> {
        let tree = resvg::usvg::Tree::from_data(bytes, &resvg::usvg::Options::default())
            .map_err(|e| ResourceError::Svg(e.to_string()))?;
        let size = tree.size();

        let width = (size.width() * scale).ceil() as u32;
        let height = (size.height() * scale).ceil() as u32;
        let mut pixmap =
            Pixmap::new(width, height).ok_or(ResourceError::InvalidSize { width, height })?;

        let transform = resvg::tiny_skia::Transform::from_scale(scale, scale);
        resvg::render(&tree, transform, &mut pixmap.as_mut());

        Ok(Self::from_pixmap(pixmap))
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn bounds(&self) -> Rect {
        Rect::from_size(self.width() as f32, self.height() as f32)
    }

    /// Premultiplied RGBA pixels.
    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("id", &self.id)
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

/// Binds a resource region to a node.
#[derive(Debug, Clone, Default)]
pub struct Drawable {
    resource: Option<Resource>,
    rect: Rect,
    /// Local position where the source rect's top-left corner is painted.
    offset: (f32, f32),
    dirty: Cell<bool>,
}

impl Drawable {
    pub fn new() -> Self {
        Self::default()
    }

    /// A drawable bound to `resource`; `rect` defaults to the whole resource.
    pub fn with_resource(resource: Resource, rect: Option<Rect>) -> Self {
        let mut drawable = Self::new();
        drawable.init(resource, rect);
        drawable
    }

    /// Bind a resource and source sub-rectangle, marking the content dirty.
    pub fn init(&mut self, resource: Resource, rect: Option<Rect>) {
        self.rect = rect.unwrap_or_else(|| resource.bounds());
        self.resource = Some(resource);
        self.dirty.set(true);
    }

    /// Drop the bound resource.
    pub fn clear(&mut self) {
        self.resource = None;
        self.rect = Rect::default();
        self.dirty.set(true);
    }

    pub fn resource(&self) -> Option<&Resource> {
        self.resource.as_ref()
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    /// Select another region of the same resource (next sprite frame).
    pub fn set_rect(&mut self, rect: Rect) {
        if self.rect != rect {
            self.rect = rect;
            self.dirty.set(true);
        }
    }

    pub fn offset(&self) -> (f32, f32) {
        self.offset
    }

    pub fn set_offset(&mut self, x: f32, y: f32) {
        self.offset = (x, y);
    }

    /// Whether the source rect lies inside the bound resource.
    pub fn rect_in_bounds(&self) -> bool {
        let Some(resource) = &self.resource else {
            return false;
        };
        let r = self.rect;
        r.x >= 0.0
            && r.y >= 0.0
            && r.right() <= resource.width() as f32
            && r.bottom() <= resource.height() as f32
    }

    /// Flag the bound content as changed; backends re-resolve it on next paint.
    pub fn mark_dirty(&self) {
        self.dirty.set(true);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// Clear the dirty flag, returning whether it was set.
    pub fn take_dirty(&self) -> bool {
        self.dirty.replace(false)
    }
}
