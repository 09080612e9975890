//! The physical surface a stage is bound to.
//!
//! A surface has a size in device pixels and, for backends that produce
//! CPU-side pixels, the last presented frame. Hosts report size changes with
//! [`Surface::report_size`]; a stage with `auto_resize` picks them up on the
//! next tick.

use std::sync::atomic::{AtomicU64, Ordering};

use resvg::tiny_skia::Pixmap;

/// Unique identifier for each surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(u64);

impl SurfaceId {
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        SurfaceId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value (for debugging/logging).
    pub fn raw(&self) -> u64 {
        self.0
    }
}

pub struct Surface {
    id: SurfaceId,
    width: u32,
    height: u32,
    frame: Option<Pixmap>,
    reported: Option<(u32, u32)>,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            id: SurfaceId::next(),
            width,
            height,
            frame: None,
            reported: None,
        }
    }

    pub fn id(&self) -> SurfaceId {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Apply a new size. Returns `false` when the size is unchanged.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if (width, height) == (self.width, self.height) {
            return false;
        }
        self.width = width;
        self.height = height;
        self.frame = None;
        true
    }

    /// Record a size change observed by the host (window resize, rotation).
    pub fn report_size(&mut self, width: u32, height: u32) {
        self.reported = Some((width, height));
    }

    pub(crate) fn take_reported_size(&mut self) -> Option<(u32, u32)> {
        self.reported.take()
    }

    /// Last frame painted by a CPU backend, premultiplied RGBA.
    pub fn frame(&self) -> Option<&Pixmap> {
        self.frame.as_ref()
    }

    /// Frame buffer matching the current size, allocated on first use.
    /// `None` when the surface has a zero dimension.
    pub(crate) fn frame_mut(&mut self) -> Option<&mut Pixmap> {
        let stale = self
            .frame
            .as_ref()
            .is_some_and(|f| (f.width(), f.height()) != (self.width, self.height));
        if stale || self.frame.is_none() {
            self.frame = Pixmap::new(self.width, self.height);
        }
        self.frame.as_mut()
    }

    /// Copy of the last frame with straight alpha.
    pub fn to_image(&self) -> Option<image::RgbaImage> {
        let frame = self.frame.as_ref()?;
        let data: Vec<u8> = frame
            .pixels()
            .iter()
            .flat_map(|px| {
                let c = px.demultiply();
                [c.red(), c.green(), c.blue(), c.alpha()]
            })
            .collect();
        image::RgbaImage::from_raw(frame.width(), frame.height(), data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_reports_change() {
        let mut surface = Surface::new(10, 10);
        assert!(!surface.resize(10, 10));
        assert!(surface.resize(20, 10));
        assert_eq!(surface.size(), (20, 10));
    }

    #[test]
    fn test_frame_follows_size() {
        let mut surface = Surface::new(4, 2);
        assert!(surface.frame().is_none());
        assert_eq!(surface.frame_mut().map(|f| f.width()), Some(4));
        surface.resize(8, 8);
        assert!(surface.frame().is_none());
        assert_eq!(surface.frame_mut().map(|f| (f.width(), f.height())), Some((8, 8)));

        surface.resize(0, 8);
        assert!(surface.frame_mut().is_none());
    }

    #[test]
    fn test_to_image_demultiplies() {
        let mut surface = Surface::new(1, 1);
        if let Some(frame) = surface.frame_mut() {
            frame.fill(resvg::tiny_skia::Color::from_rgba8(255, 0, 0, 128));
        }
        let image = surface.to_image().unwrap();
        let px = image.get_pixel(0, 0).0;
        assert_eq!(px[3], 128);
        assert!(px[0] >= 254);
    }
}
