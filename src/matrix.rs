//! 2D affine matrix.
//!
//! A point `(x, y)` maps to:
//!
//! ```text
//! x' = a * x + c * y + tx
//! y' = b * x + d * y + ty
//! ```
//!
//! ## Composition order
//!
//! `m.append(n)` is the product `m × n`: it applies `m`'s frame, then `n`
//! inside it, exactly like calling `transform(m)` followed by `transform(n)`
//! on an immediate-mode 2D context. For points this means `n` maps first and
//! `m` second. A node's world matrix is therefore
//! `parent_world.append(local)`. Composition is associative.

use crate::error::SceneError;

/// Determinants with a smaller magnitude are treated as singular.
const DEGENERATE_EPSILON: f32 = 1e-12;

/// A 2D affine transform made of six scalars.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub tx: f32,
    pub ty: f32,
}

impl Matrix {
    /// Identity matrix (no transformation)
    pub const IDENTITY: Self = Self {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    pub const fn new(a: f32, b: f32, c: f32, d: f32, tx: f32, ty: f32) -> Self {
        Self { a, b, c, d, tx, ty }
    }

    pub fn identity() -> Self {
        Self::IDENTITY
    }

    /// Overwrite all six components.
    pub fn set(&mut self, a: f32, b: f32, c: f32, d: f32, tx: f32, ty: f32) -> &mut Self {
        *self = Self::new(a, b, c, d, tx, ty);
        self
    }

    pub fn translation(x: f32, y: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, x, y)
    }

    pub fn scaling(sx: f32, sy: f32) -> Self {
        Self::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    /// Rotation around the origin, positive angles turn +x towards +y.
    pub fn rotation(angle_radians: f32) -> Self {
        let (sin, cos) = angle_radians.sin_cos();
        Self::new(cos, sin, -sin, cos, 0.0, 0.0)
    }

    pub fn rotation_degrees(angle_degrees: f32) -> Self {
        Self::rotation(angle_degrees.to_radians())
    }

    /// `self × other`: `other` maps points first, then `self`.
    pub fn append(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.c * other.b,
            b: self.b * other.a + self.d * other.b,
            c: self.a * other.c + self.c * other.d,
            d: self.b * other.c + self.d * other.d,
            tx: self.a * other.tx + self.c * other.ty + self.tx,
            ty: self.b * other.tx + self.d * other.ty + self.ty,
        }
    }

    /// `other × self`: `self` maps points first, then `other`.
    pub fn prepend(&self, other: &Matrix) -> Matrix {
        other.append(self)
    }

    pub fn determinant(&self) -> f32 {
        self.a * self.d - self.b * self.c
    }

    /// Compute the inverse of this matrix.
    ///
    /// Fails with [`SceneError::DegenerateMatrix`] instead of producing NaNs
    /// when the determinant is numerically zero.
    pub fn invert(&self) -> Result<Matrix, SceneError> {
        let det = self.determinant();
        if !det.is_finite() || det.abs() < DEGENERATE_EPSILON {
            return Err(SceneError::DegenerateMatrix { determinant: det });
        }

        let inv_det = 1.0 / det;
        let inverse = Matrix {
            a: self.d * inv_det,
            b: -self.b * inv_det,
            c: -self.c * inv_det,
            d: self.a * inv_det,
            tx: (self.c * self.ty - self.d * self.tx) * inv_det,
            ty: (self.b * self.tx - self.a * self.ty) * inv_det,
        };

        if inverse.is_finite() {
            Ok(inverse)
        } else {
            Err(SceneError::DegenerateMatrix { determinant: det })
        }
    }

    /// Transform a 2D point by this matrix
    pub fn transform_point(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.tx,
            self.b * x + self.d * y + self.ty,
        )
    }

    /// Map the four corners of a `width` x `height` box at the origin.
    /// Order: top-left, top-right, bottom-left, bottom-right.
    pub fn transform_box(&self, width: f32, height: f32) -> [(f32, f32); 4] {
        [
            self.transform_point(0.0, 0.0),
            self.transform_point(width, 0.0),
            self.transform_point(0.0, height),
            self.transform_point(width, height),
        ]
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    pub fn is_finite(&self) -> bool {
        [self.a, self.b, self.c, self.d, self.tx, self.ty]
            .iter()
            .all(|v| v.is_finite())
    }

    /// Component-wise comparison within `epsilon`.
    pub fn approx_eq(&self, other: &Matrix, epsilon: f32) -> bool {
        (self.a - other.a).abs() <= epsilon
            && (self.b - other.b).abs() <= epsilon
            && (self.c - other.c).abs() <= epsilon
            && (self.d - other.d).abs() <= epsilon
            && (self.tx - other.tx).abs() <= epsilon
            && (self.ty - other.ty).abs() <= epsilon
    }

    /// The 2x3 column-major layout used by the GPU vertex path.
    pub fn to_cols_array(&self) -> [f32; 6] {
        [self.a, self.b, self.c, self.d, self.tx, self.ty]
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl std::ops::Mul for Matrix {
    type Output = Matrix;

    fn mul(self, rhs: Matrix) -> Matrix {
        self.append(&rhs)
    }
}
