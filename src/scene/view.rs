use crate::error::SceneError;
use crate::geometry::Rect;
use crate::matrix::Matrix;

use super::{NodeId, Scene};

/// Per-node visual properties.
///
/// Built with consuming setters before the node is created; afterwards
/// properties change through [`ViewMut`] so the world cache stays coherent.
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    x: f32,
    y: f32,
    scale_x: f32,
    scale_y: f32,
    /// Degrees, clockwise in a y-down space.
    rotation: f32,
    pivot_x: f32,
    pivot_y: f32,
    /// Stored as given; clamped to [0, 1] by the renderer.
    alpha: f32,
    visible: bool,
    width: f32,
    height: f32,
    name: Option<String>,
}

impl Default for View {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            rotation: 0.0,
            pivot_x: 0.0,
            pivot_y: 0.0,
            alpha: 1.0,
            visible: true,
            width: 0.0,
            height: 0.0,
            name: None,
        }
    }
}

impl View {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(mut self, x: f32, y: f32) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    pub fn scale(mut self, sx: f32, sy: f32) -> Self {
        self.scale_x = sx;
        self.scale_y = sy;
        self
    }

    pub fn rotation(mut self, degrees: f32) -> Self {
        self.rotation = degrees;
        self
    }

    /// Anchor point in local units; position, rotation and scale act about it.
    pub fn pivot(mut self, x: f32, y: f32) -> Self {
        self.pivot_x = x;
        self.pivot_y = y;
        self
    }

    pub fn alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn size(mut self, width: f32, height: f32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }

    pub fn scale_x(&self) -> f32 {
        self.scale_x
    }

    pub fn scale_y(&self) -> f32 {
        self.scale_y
    }

    pub fn rotation_degrees(&self) -> f32 {
        self.rotation
    }

    pub fn pivot_point(&self) -> (f32, f32) {
        (self.pivot_x, self.pivot_y)
    }

    /// Raw alpha as set, possibly outside [0, 1].
    pub fn raw_alpha(&self) -> f32 {
        self.alpha
    }

    pub fn effective_alpha(&self) -> f32 {
        self.alpha.clamp(0.0, 1.0)
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Local box in the view's own space.
    pub fn local_rect(&self) -> Rect {
        Rect::from_size(self.width, self.height)
    }

    /// Maps local space into the owner's space.
    ///
    /// Scale and rotation act about the pivot, which lands on `(x, y)`.
    pub fn local_matrix(&self) -> Matrix {
        let (mut a, mut b, mut c, mut d) = (self.scale_x, 0.0, 0.0, self.scale_y);
        if self.rotation % 360.0 != 0.0 {
            let (sin, cos) = self.rotation.to_radians().sin_cos();
            a = cos * self.scale_x;
            b = sin * self.scale_x;
            c = -sin * self.scale_y;
            d = cos * self.scale_y;
        }
        let tx = self.x - (self.pivot_x * a + self.pivot_y * c);
        let ty = self.y - (self.pivot_x * b + self.pivot_y * d);
        Matrix::new(a, b, c, d, tx, ty)
    }

    pub(crate) fn validate(&self) -> Result<(), SceneError> {
        let fields = [
            ("x", self.x),
            ("y", self.y),
            ("scale_x", self.scale_x),
            ("scale_y", self.scale_y),
            ("rotation", self.rotation),
            ("pivot_x", self.pivot_x),
            ("pivot_y", self.pivot_y),
            ("alpha", self.alpha),
            ("width", self.width),
            ("height", self.height),
        ];
        fields
            .into_iter()
            .try_for_each(|(field, value)| finite(field, value).map(|_| ()))
    }

    pub(crate) fn set_size_unchecked(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
    }
}

fn finite(field: &'static str, value: f32) -> Result<f32, SceneError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(SceneError::NonFinite { field, value })
    }
}

/// Mutable handle to one node's view properties.
///
/// Each setter validates its input first; a rejected value leaves the node
/// untouched.
pub struct ViewMut<'a> {
    scene: &'a mut Scene,
    id: NodeId,
}

impl<'a> ViewMut<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn get(&self) -> Option<&View> {
        self.scene.view(self.id)
    }

    fn edit(&mut self, transform: bool, f: impl FnOnce(&mut View)) -> Result<&mut Self, SceneError> {
        let node = self.scene.try_node_mut(self.id)?;
        let before = node.view.local_matrix();
        f(&mut node.view);
        if transform && node.view.local_matrix() != before {
            self.scene.invalidate_world(self.id);
        }
        Ok(self)
    }

    pub fn set_position(&mut self, x: f32, y: f32) -> Result<&mut Self, SceneError> {
        let (x, y) = (finite("x", x)?, finite("y", y)?);
        self.edit(true, |v| {
            v.x = x;
            v.y = y;
        })
    }

    pub fn set_x(&mut self, x: f32) -> Result<&mut Self, SceneError> {
        let x = finite("x", x)?;
        self.edit(true, |v| v.x = x)
    }

    pub fn set_y(&mut self, y: f32) -> Result<&mut Self, SceneError> {
        let y = finite("y", y)?;
        self.edit(true, |v| v.y = y)
    }

    pub fn set_scale(&mut self, sx: f32, sy: f32) -> Result<&mut Self, SceneError> {
        let (sx, sy) = (finite("scale_x", sx)?, finite("scale_y", sy)?);
        self.edit(true, |v| {
            v.scale_x = sx;
            v.scale_y = sy;
        })
    }

    pub fn set_rotation(&mut self, degrees: f32) -> Result<&mut Self, SceneError> {
        let degrees = finite("rotation", degrees)?;
        self.edit(true, |v| v.rotation = degrees)
    }

    pub fn set_pivot(&mut self, x: f32, y: f32) -> Result<&mut Self, SceneError> {
        let (x, y) = (finite("pivot_x", x)?, finite("pivot_y", y)?);
        self.edit(true, |v| {
            v.pivot_x = x;
            v.pivot_y = y;
        })
    }

    /// Out-of-range values are kept; only NaN and infinities are rejected.
    pub fn set_alpha(&mut self, alpha: f32) -> Result<&mut Self, SceneError> {
        let alpha = finite("alpha", alpha)?;
        self.edit(false, |v| v.alpha = alpha)
    }

    pub fn set_visible(&mut self, visible: bool) -> Result<&mut Self, SceneError> {
        self.edit(false, |v| v.visible = visible)
    }

    pub fn set_size(&mut self, width: f32, height: f32) -> Result<&mut Self, SceneError> {
        let (width, height) = (finite("width", width)?, finite("height", height)?);
        self.edit(false, |v| {
            v.width = width;
            v.height = height;
        })
    }

    pub fn set_name(&mut self, name: Option<String>) -> Result<&mut Self, SceneError> {
        self.edit(false, |v| v.name = name)
    }
}

impl Scene {
    pub fn view(&self, id: NodeId) -> Option<&View> {
        self.node(id).map(|n| &n.view)
    }

    pub fn view_mut(&mut self, id: NodeId) -> Result<ViewMut<'_>, SceneError> {
        self.try_node(id)?;
        Ok(ViewMut { scene: self, id })
    }

    /// World-space bounding box. A container's box is the union of its own
    /// box and the boxes of its visible children.
    pub fn bounds(&self, id: NodeId) -> Result<Rect, SceneError> {
        let node = self.try_node(id)?;
        let world = self.world_matrix(id)?;

        let own = node.view.local_rect();
        let mut bounds = if own.is_empty() {
            Rect::default()
        } else {
            own.transformed(&world)
        };

        for &child in &node.children {
            if self.view(child).is_some_and(View::is_visible) {
                bounds = bounds.union(&self.bounds(child)?);
            }
        }
        Ok(bounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_local_matrix_translate_scale() {
        let v = View::new().position(100.0, 100.0).scale(2.0, 2.0);
        assert_eq!(v.local_matrix(), Matrix::new(2.0, 0.0, 0.0, 2.0, 100.0, 100.0));
    }

    #[test]
    fn test_local_matrix_full_turn_is_exact() {
        let v = View::new().position(3.0, 4.0).rotation(720.0);
        assert_eq!(v.local_matrix(), Matrix::translation(3.0, 4.0));
    }

    #[test]
    fn test_pivot_lands_on_position() {
        let v = View::new()
            .position(50.0, 50.0)
            .pivot(10.0, 5.0)
            .rotation(37.0)
            .scale(-1.5, 3.0);
        let (x, y) = v.local_matrix().transform_point(10.0, 5.0);
        assert_abs_diff_eq!(x, 50.0, epsilon = 1e-4);
        assert_abs_diff_eq!(y, 50.0, epsilon = 1e-4);
    }

    #[test]
    fn test_rotation_90() {
        let m = View::new().rotation(90.0).local_matrix();
        let (x, y) = m.transform_point(1.0, 0.0);
        assert_abs_diff_eq!(x, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(y, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_non_finite_rejected_at_setter() {
        let mut scene = Scene::new();
        let id = scene.create_view(View::new().position(1.0, 2.0)).unwrap();

        let result = scene.view_mut(id).unwrap().set_position(f32::NAN, 0.0).map(|_| ());
        assert!(matches!(result, Err(SceneError::NonFinite { field: "x", .. })));
        assert_eq!(scene.view(id).unwrap().x(), 1.0);

        assert!(scene.view_mut(id).unwrap().set_scale(1.0, f32::INFINITY).is_err());
        assert!(scene.create_view(View::new().rotation(f32::NAN)).is_err());
    }

    #[test]
    fn test_alpha_tolerates_out_of_range() {
        let mut scene = Scene::new();
        let id = scene.create_view(View::new()).unwrap();
        scene.view_mut(id).unwrap().set_alpha(3.0).unwrap();
        let view = scene.view(id).unwrap();
        assert_eq!(view.raw_alpha(), 3.0);
        assert_eq!(view.effective_alpha(), 1.0);
    }

    #[test]
    fn test_non_transform_setter_keeps_cache() {
        let mut scene = Scene::new();
        let id = scene.create_view(View::new()).unwrap();
        scene.world_matrix(id).unwrap();
        scene.view_mut(id).unwrap().set_alpha(0.5).unwrap().set_visible(false).unwrap();
        assert!(!scene.is_world_dirty(id));
        scene.view_mut(id).unwrap().set_rotation(10.0).unwrap();
        assert!(scene.is_world_dirty(id));
    }

    #[test]
    fn test_container_bounds_union() {
        let mut scene = Scene::new();
        let group = scene.create_container(View::new().position(10.0, 10.0)).unwrap();
        let a = scene.create_view(View::new().size(5.0, 5.0)).unwrap();
        let b = scene
            .create_view(View::new().position(20.0, 0.0).size(5.0, 10.0))
            .unwrap();
        let hidden = scene
            .create_view(View::new().position(-100.0, 0.0).size(5.0, 5.0).visible(false))
            .unwrap();
        for child in [a, b, hidden] {
            scene.add_child(group, child).unwrap();
        }
        assert_eq!(scene.bounds(group).unwrap(), Rect::new(10.0, 10.0, 25.0, 10.0));
    }
}
