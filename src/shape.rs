//! Vector leaf content.

use resvg::tiny_skia as sk;

use crate::geometry::{Color, Rect};

/// Outline of a shape in the node's local space.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapePath {
    /// Axis-aligned box from the origin.
    Rect { width: f32, height: f32 },
    /// Ellipse inscribed in the box from the origin.
    Ellipse { width: f32, height: f32 },
    /// Closed polygon through the given points.
    Polygon(Vec<(f32, f32)>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub color: Color,
    pub width: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub path: ShapePath,
    pub fill: Option<Color>,
    pub stroke: Option<Stroke>,
}

impl Shape {
    pub fn new(path: ShapePath) -> Self {
        Self {
            path,
            fill: None,
            stroke: None,
        }
    }

    pub fn rect(width: f32, height: f32) -> Self {
        Self::new(ShapePath::Rect { width, height })
    }

    pub fn ellipse(width: f32, height: f32) -> Self {
        Self::new(ShapePath::Ellipse { width, height })
    }

    pub fn polygon(points: Vec<(f32, f32)>) -> Self {
        Self::new(ShapePath::Polygon(points))
    }

    pub fn fill(mut self, color: Color) -> Self {
        self.fill = Some(color);
        self
    }

    pub fn stroke(mut self, color: Color, width: f32) -> Self {
        self.stroke = Some(Stroke { color, width });
        self
    }

    /// Local bounds, inflated by half the stroke width.
    pub fn bounds(&self) -> Rect {
        let base = match &self.path {
            ShapePath::Rect { width, height } | ShapePath::Ellipse { width, height } => {
                Rect::from_size(*width, *height)
            }
            ShapePath::Polygon(points) => {
                let Some(&(x0, y0)) = points.first() else {
                    return Rect::default();
                };
                let (mut min_x, mut min_y, mut max_x, mut max_y) = (x0, y0, x0, y0);
                for &(x, y) in &points[1..] {
                    min_x = min_x.min(x);
                    min_y = min_y.min(y);
                    max_x = max_x.max(x);
                    max_y = max_y.max(y);
                }
                Rect::new(min_x, min_y, max_x - min_x, max_y - min_y)
            }
        };

        match self.stroke {
            Some(stroke) if stroke.width > 0.0 => {
                let half = stroke.width / 2.0;
                Rect::new(
                    base.x - half,
                    base.y - half,
                    base.width + stroke.width,
                    base.height + stroke.width,
                )
            }
            _ => base,
        }
    }

    fn to_path(&self) -> Option<sk::Path> {
        match &self.path {
            ShapePath::Rect { width, height } => {
                sk::Rect::from_xywh(0.0, 0.0, *width, *height).map(sk::PathBuilder::from_rect)
            }
            ShapePath::Ellipse { width, height } => {
                sk::Rect::from_xywh(0.0, 0.0, *width, *height).and_then(sk::PathBuilder::from_oval)
            }
            ShapePath::Polygon(points) => {
                if points.len() < 3 {
                    return None;
                }
                let mut pb = sk::PathBuilder::new();
                pb.move_to(points[0].0, points[0].1);
                for &(x, y) in &points[1..] {
                    pb.line_to(x, y);
                }
                pb.close();
                pb.finish()
            }
        }
    }

    /// Fill and stroke into `pixmap`. Returns the number of paint operations
    /// issued; degenerate outlines paint nothing.
    pub(crate) fn paint(&self, pixmap: &mut sk::Pixmap, transform: sk::Transform, alpha: f32) -> u32 {
        let Some(path) = self.to_path() else {
            return 0;
        };
        let mut ops = 0;

        if let Some(fill) = self.fill {
            let mut paint = sk::Paint::default();
            paint.set_color(fill.with_alpha(alpha).to_skia());
            paint.anti_alias = true;
            pixmap.fill_path(&path, &paint, sk::FillRule::Winding, transform, None);
            ops += 1;
        }

        if let Some(stroke) = self.stroke.filter(|s| s.width > 0.0) {
            let mut paint = sk::Paint::default();
            paint.set_color(stroke.color.with_alpha(alpha).to_skia());
            paint.anti_alias = true;
            let sk_stroke = sk::Stroke {
                width: stroke.width,
                ..Default::default()
            };
            pixmap.stroke_path(&path, &paint, &sk_stroke, transform, None);
            ops += 1;
        }

        ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_include_stroke() {
        let s = Shape::rect(10.0, 4.0).stroke(Color::BLACK, 2.0);
        assert_eq!(s.bounds(), Rect::new(-1.0, -1.0, 12.0, 6.0));
    }

    #[test]
    fn test_polygon_bounds() {
        let s = Shape::polygon(vec![(0.0, 0.0), (10.0, -5.0), (4.0, 8.0)]);
        assert_eq!(s.bounds(), Rect::new(0.0, -5.0, 10.0, 13.0));
    }

    #[test]
    fn test_degenerate_paths_paint_nothing() {
        let mut pixmap = sk::Pixmap::new(4, 4).unwrap();
        let inverted = Shape::rect(-3.0, -3.0).fill(Color::WHITE);
        assert_eq!(inverted.paint(&mut pixmap, sk::Transform::identity(), 1.0), 0);

        let zero = Shape::ellipse(0.0, 0.0).fill(Color::WHITE);
        zero.paint(&mut pixmap, sk::Transform::identity(), 1.0);
        assert!(pixmap.data().iter().all(|&b| b == 0));

        let line = Shape::polygon(vec![(0.0, 0.0), (1.0, 1.0)]).fill(Color::WHITE);
        assert_eq!(line.paint(&mut pixmap, sk::Transform::identity(), 1.0), 0);
    }

    #[test]
    fn test_fill_paints_pixels() {
        let mut pixmap = sk::Pixmap::new(4, 4).unwrap();
        let s = Shape::rect(4.0, 4.0).fill(Color::rgb(1.0, 0.0, 0.0));
        assert_eq!(s.paint(&mut pixmap, sk::Transform::identity(), 1.0), 1);
        assert_eq!(&pixmap.data()[..4], &[255, 0, 0, 255]);
    }
}
