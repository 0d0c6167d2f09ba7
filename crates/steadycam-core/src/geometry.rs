//! Poses and rigid 2D transformations.

use glam::{DAffine2, DMat2, DVec2};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::ops::{Add, Div, Mul, Sub};

/// Rigid 2D displacement: translation `(x, y)` in pixels and rotation `a` in radians.
///
/// Used both for single-frame deltas and for absolute accumulated trajectories.
/// All arithmetic is component-wise.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub a: f64,
}

impl Pose {
    /// All components zero.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// All components one.
    pub const ONE: Self = Self::new(1.0, 1.0, 1.0);

    #[inline]
    pub const fn new(x: f64, y: f64, a: f64) -> Self {
        Self { x, y, a }
    }

    /// Same value on every axis.
    #[inline]
    pub const fn splat(v: f64) -> Self {
        Self::new(v, v, v)
    }

    /// Largest absolute component.
    pub fn max_abs(self) -> f64 {
        self.x.abs().max(self.y.abs()).max(self.a.abs())
    }
}

impl Add for Pose {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.a + rhs.a)
    }
}

impl Sub for Pose {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.a - rhs.a)
    }
}

impl Mul for Pose {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Self) -> Self {
        Self::new(self.x * rhs.x, self.y * rhs.y, self.a * rhs.a)
    }
}

/// Component-wise division. Callers must not divide by a zero component.
impl Div for Pose {
    type Output = Self;

    #[inline]
    fn div(self, rhs: Self) -> Self {
        Self::new(self.x / rhs.x, self.y / rhs.y, self.a / rhs.a)
    }
}

/// 2x3 affine matrix restricted to rotation and translation.
///
/// Maps previous-frame coordinates to current-frame coordinates:
///
/// ```text
/// | cos(a)  -sin(a)  dx |
/// | sin(a)   cos(a)  dy |
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform {
    inner: DAffine2,
}

impl RigidTransform {
    /// Identity transform.
    pub const IDENTITY: Self = Self {
        inner: DAffine2::IDENTITY,
    };

    /// Build the matrix for a `(dx, dy, da)` delta.
    #[inline]
    pub fn from_pose(delta: Pose) -> Self {
        Self {
            inner: DAffine2::from_angle_translation(delta.a, DVec2::new(delta.x, delta.y)),
        }
    }

    /// Build from a rotation angle and a translation.
    #[inline]
    pub fn from_angle_translation(angle: f64, translation: DVec2) -> Self {
        Self {
            inner: DAffine2::from_angle_translation(angle, translation),
        }
    }

    /// Build from row-major 2x3 matrix entries.
    pub fn from_rows(rows: [[f64; 3]; 2]) -> Self {
        let m = DMat2::from_cols(
            DVec2::new(rows[0][0], rows[1][0]),
            DVec2::new(rows[0][1], rows[1][1]),
        );
        Self {
            inner: DAffine2::from_mat2_translation(m, DVec2::new(rows[0][2], rows[1][2])),
        }
    }

    /// Row-major 2x3 matrix entries.
    pub fn rows(&self) -> [[f64; 3]; 2] {
        let m = self.inner.matrix2;
        let t = self.inner.translation;
        [
            [m.x_axis.x, m.y_axis.x, t.x],
            [m.x_axis.y, m.y_axis.y, t.y],
        ]
    }

    /// Decompose into `(dx, dy, da)` with `da` in `(-π, π]`.
    pub fn to_pose(&self) -> Pose {
        let m = self.inner.matrix2;
        let mut da = m.x_axis.y.atan2(m.x_axis.x);
        if da <= -PI {
            da = PI;
        }
        Pose::new(self.inner.translation.x, self.inner.translation.y, da)
    }

    /// Translation column.
    #[inline]
    pub fn translation(&self) -> DVec2 {
        self.inner.translation
    }

    /// Map a point from the source to the destination frame.
    #[inline]
    pub fn transform_point(&self, p: DVec2) -> DVec2 {
        self.inner.transform_point2(p)
    }

    /// Inverse mapping (destination to source).
    #[inline]
    pub fn inverse(&self) -> Self {
        Self {
            inner: self.inner.inverse(),
        }
    }
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}
