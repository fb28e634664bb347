//! Matrix types
//!
//! [`Mat4`] is column-major, matching the engine's fixed-function upload
//! convention. [`Mat34`] is the row-major 3x4 rigid transform a tracking
//! runtime reports for each device.

use crate::quaternion::Quat;
use crate::vector::{Vec3, Vec4};
use core::ops::{Mul, MulAssign};

/// 4x4 matrix (column-major)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Mat4 {
    pub cols: [Vec4; 4],
}

impl Mat4 {
    pub const IDENTITY: Self = Self {
        cols: [Vec4::X, Vec4::Y, Vec4::Z, Vec4::W],
    };

    pub const ZERO: Self = Self {
        cols: [Vec4::ZERO, Vec4::ZERO, Vec4::ZERO, Vec4::ZERO],
    };

    #[inline]
    pub const fn from_cols(c0: Vec4, c1: Vec4, c2: Vec4, c3: Vec4) -> Self {
        Self { cols: [c0, c1, c2, c3] }
    }

    /// Interpret `m[i]` as column `i`
    #[inline]
    pub const fn from_cols_array_2d(m: &[[f32; 4]; 4]) -> Self {
        Self::from_cols(
            Vec4::from_array(m[0]),
            Vec4::from_array(m[1]),
            Vec4::from_array(m[2]),
            Vec4::from_array(m[3]),
        )
    }

    #[inline]
    pub fn to_cols_array_2d(&self) -> [[f32; 4]; 4] {
        [
            self.cols[0].to_array(),
            self.cols[1].to_array(),
            self.cols[2].to_array(),
            self.cols[3].to_array(),
        ]
    }

    /// Flat column-major array, ready for upload
    pub fn to_cols_array(&self) -> [f32; 16] {
        let mut out = [0.0; 16];
        for (i, col) in self.cols.iter().enumerate() {
            out[i * 4..i * 4 + 4].copy_from_slice(&col.to_array());
        }
        out
    }

    /// Element at `row`, `col`
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.cols[col].to_array()[row]
    }

    #[inline]
    pub fn from_translation(translation: Vec3) -> Self {
        Self::from_cols(Vec4::X, Vec4::Y, Vec4::Z, translation.extend(1.0))
    }

    #[inline]
    pub fn from_scale(scale: Vec3) -> Self {
        Self::from_cols(
            Vec4::new(scale.x, 0.0, 0.0, 0.0),
            Vec4::new(0.0, scale.y, 0.0, 0.0),
            Vec4::new(0.0, 0.0, scale.z, 0.0),
            Vec4::W,
        )
    }

    #[inline]
    pub fn from_rotation_x(angle: f32) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self::from_cols(
            Vec4::X,
            Vec4::new(0.0, cos, sin, 0.0),
            Vec4::new(0.0, -sin, cos, 0.0),
            Vec4::W,
        )
    }

    #[inline]
    pub fn from_rotation_y(angle: f32) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self::from_cols(
            Vec4::new(cos, 0.0, -sin, 0.0),
            Vec4::Y,
            Vec4::new(sin, 0.0, cos, 0.0),
            Vec4::W,
        )
    }

    #[inline]
    pub fn from_rotation_z(angle: f32) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self::from_cols(
            Vec4::new(cos, sin, 0.0, 0.0),
            Vec4::new(-sin, cos, 0.0, 0.0),
            Vec4::Z,
            Vec4::W,
        )
    }

    #[inline]
    pub fn transpose(&self) -> Self {
        let c = &self.cols;
        Self::from_cols(
            Vec4::new(c[0].x, c[1].x, c[2].x, c[3].x),
            Vec4::new(c[0].y, c[1].y, c[2].y, c[3].y),
            Vec4::new(c[0].z, c[1].z, c[2].z, c[3].z),
            Vec4::new(c[0].w, c[1].w, c[2].w, c[3].w),
        )
    }

    /// Transform a point (w=1)
    #[inline]
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        let v = *self * point.extend(1.0);
        v.truncate() * (1.0 / v.w)
    }

    /// Transform a direction (w=0)
    #[inline]
    pub fn transform_vector(&self, vector: Vec3) -> Vec3 {
        (*self * vector.extend(0.0)).truncate()
    }
}

impl Default for Mat4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Mat4 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self::from_cols(
            self * rhs.cols[0],
            self * rhs.cols[1],
            self * rhs.cols[2],
            self * rhs.cols[3],
        )
    }
}

impl Mul<Vec4> for Mat4 {
    type Output = Vec4;

    #[inline]
    fn mul(self, rhs: Vec4) -> Vec4 {
        self.cols[0] * rhs.x + self.cols[1] * rhs.y + self.cols[2] * rhs.z + self.cols[3] * rhs.w
    }
}

impl MulAssign for Mat4 {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

/// Row-major 3x4 rigid transform, `m[row][col]`, translation in column 3
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Mat34 {
    pub m: [[f32; 4]; 3],
}

impl Mat34 {
    pub const IDENTITY: Self = Self {
        m: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
        ],
    };

    #[inline]
    pub const fn from_rows(m: [[f32; 4]; 3]) -> Self {
        Self { m }
    }

    /// Build from a rotation and translation
    pub fn from_rotation_translation(q: Quat, t: Vec3) -> Self {
        let Quat { x, y, z, w } = q;
        let (xx, yy, zz) = (x * x, y * y, z * z);
        let (xy, xz, yz) = (x * y, x * z, y * z);
        let (wx, wy, wz) = (w * x, w * y, w * z);

        Self::from_rows([
            [1.0 - 2.0 * (yy + zz), 2.0 * (xy - wz), 2.0 * (xz + wy), t.x],
            [2.0 * (xy + wz), 1.0 - 2.0 * (xx + zz), 2.0 * (yz - wx), t.y],
            [2.0 * (xz - wy), 2.0 * (yz + wx), 1.0 - 2.0 * (xx + yy), t.z],
        ])
    }

    #[inline]
    pub fn from_translation(t: Vec3) -> Self {
        Self::from_rotation_translation(Quat::IDENTITY, t)
    }

    /// Translation column
    #[inline]
    pub fn translation(&self) -> Vec3 {
        Vec3::new(self.m[0][3], self.m[1][3], self.m[2][3])
    }

    /// Rotation part as a quaternion.
    ///
    /// Magnitudes come from the diagonal, clamped at zero so a slightly
    /// non-orthonormal runtime matrix cannot produce NaN. Signs come from
    /// the antisymmetric off-diagonal terms; `w` is always non-negative.
    pub fn rotation(&self) -> Quat {
        let m = &self.m;
        let w = (1.0 + m[0][0] + m[1][1] + m[2][2]).max(0.0).sqrt() / 2.0;
        let x = (1.0 + m[0][0] - m[1][1] - m[2][2]).max(0.0).sqrt() / 2.0;
        let y = (1.0 - m[0][0] + m[1][1] - m[2][2]).max(0.0).sqrt() / 2.0;
        let z = (1.0 - m[0][0] - m[1][1] + m[2][2]).max(0.0).sqrt() / 2.0;

        Quat::new(
            x.copysign(m[2][1] - m[1][2]),
            y.copysign(m[0][2] - m[2][0]),
            z.copysign(m[1][0] - m[0][1]),
            w,
        )
    }
}

impl Default for Mat34 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use core::f32::consts::FRAC_PI_2;

    #[test]
    fn test_transpose_swaps_rows_and_cols() {
        let raw = [
            [1.0, 2.0, 3.0, 4.0],
            [5.0, 6.0, 7.0, 8.0],
            [9.0, 10.0, 11.0, 12.0],
            [13.0, 14.0, 15.0, 16.0],
        ];
        let m = Mat4::from_cols_array_2d(&raw);
        let t = m.transpose();
        for r in 0..4 {
            for c in 0..4 {
                assert_eq!(t.get(r, c), m.get(c, r));
                // row-major source reads back by row after transposing
                assert_eq!(t.get(r, c), raw[r][c]);
            }
        }
        assert_eq!(t.transpose(), m);
    }

    #[test]
    fn test_rotation_z_matches_quat() {
        let m = Mat4::from_rotation_z(FRAC_PI_2);
        let p = m.transform_point(Vec3::X);
        assert_abs_diff_eq!(p.x, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(p.y, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_translation_then_point() {
        let m = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)) * Mat4::from_scale(Vec3::splat(2.0));
        let p = m.transform_point(Vec3::ONE);
        assert_eq!(p, Vec3::new(3.0, 4.0, 5.0));
        assert_eq!(m.transform_vector(Vec3::ONE), Vec3::splat(2.0));
    }

    #[test]
    fn test_mat34_rotation_roundtrip() {
        let q = Quat::from_axis_angle(Vec3::new(0.2, 1.0, -0.4), 2.1);
        let m = Mat34::from_rotation_translation(q, Vec3::new(0.1, 1.6, -0.3));
        let r = m.rotation();

        // q and -q are the same rotation; rotation() picks w >= 0
        let sign = if q.w < 0.0 { -1.0 } else { 1.0 };
        assert_abs_diff_eq!(r.x, q.x * sign, epsilon = 1e-5);
        assert_abs_diff_eq!(r.y, q.y * sign, epsilon = 1e-5);
        assert_abs_diff_eq!(r.z, q.z * sign, epsilon = 1e-5);
        assert_abs_diff_eq!(r.w, q.w * sign, epsilon = 1e-5);
        assert_eq!(m.translation(), Vec3::new(0.1, 1.6, -0.3));
    }

    #[test]
    fn test_mat34_identity() {
        assert_eq!(Mat34::IDENTITY.rotation(), Quat::IDENTITY);
        assert_eq!(Mat34::IDENTITY.translation(), Vec3::ZERO);
    }
}
