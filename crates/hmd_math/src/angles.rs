//! Euler angles and the two frames they are read in.
//!
//! Tracking runtimes report orientation in a right-handed Y-up frame
//! (X right, Y up, -Z forward). The engine uses Z-up angles in degrees,
//! ordered pitch/yaw/roll, where positive pitch looks down.
//!
//! Two independent conversion pairs exist:
//!
//! - [`Quat::to_tracking_angles`] / [`Quat::from_tracking_angles`] read a
//!   tracked device orientation as engine angles. Heading is taken about the
//!   tracking Y axis, attitude about Z and bank about X.
//! - [`Quat::to_engine_angles`] / [`Quat::from_engine_angles`] are the plain
//!   Z-up ZYX pair used to rotate engine-space vectors.

use crate::consts::{DEG_TO_RAD, METERS_TO_UNITS, RAD_TO_DEG};
use crate::quaternion::Quat;
use crate::vector::Vec3;
use core::ops::{Add, Sub};

/// Fraction of the quaternion norm past which the tracking conversion
/// treats the rotation as sitting on a pole.
pub const GIMBAL_THRESHOLD: f32 = 0.499;

/// Engine Euler angles in degrees
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Angles {
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
}

impl Angles {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    #[inline]
    pub const fn new(pitch: f32, yaw: f32, roll: f32) -> Self {
        Self { pitch, yaw, roll }
    }

    /// `[pitch, yaw, roll]`
    #[inline]
    pub const fn to_array(self) -> [f32; 3] {
        [self.pitch, self.yaw, self.roll]
    }

    #[inline]
    pub const fn from_array(a: [f32; 3]) -> Self {
        Self::new(a[0], a[1], a[2])
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.pitch.is_finite() && self.yaw.is_finite() && self.roll.is_finite()
    }

    /// Same angles with yaw wrapped into `[-180, 180)`
    #[inline]
    pub fn with_wrapped_yaw(self) -> Self {
        Self { yaw: wrap_degrees(self.yaw), ..self }
    }

    /// Forward, right and up unit vectors for these angles
    pub fn vectors(self) -> (Vec3, Vec3, Vec3) {
        angle_vectors(self)
    }

    /// Forward unit vector only
    #[inline]
    pub fn forward(self) -> Vec3 {
        angle_vectors(self).0
    }
}

impl Add for Angles {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.pitch + rhs.pitch, self.yaw + rhs.yaw, self.roll + rhs.roll)
    }
}

impl Sub for Angles {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.pitch - rhs.pitch, self.yaw - rhs.yaw, self.roll - rhs.roll)
    }
}

/// Wrap an angle in degrees into `[-180, 180)`
#[inline]
pub fn wrap_degrees(deg: f32) -> f32 {
    let wrapped = (deg + 180.0).rem_euclid(360.0) - 180.0;
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

/// Shortest signed difference `to - from`, in `[-180, 180)`
#[inline]
pub fn angle_delta(to: f32, from: f32) -> f32 {
    wrap_degrees(to - from)
}

/// Forward/right/up vectors for engine angles.
///
/// Z is up; yaw 0 faces +X and yaw 90 faces +Y. Positive pitch tilts the
/// forward vector down.
pub fn angle_vectors(a: Angles) -> (Vec3, Vec3, Vec3) {
    let (sy, cy) = (a.yaw * DEG_TO_RAD).sin_cos();
    let (sp, cp) = (a.pitch * DEG_TO_RAD).sin_cos();
    let (sr, cr) = (a.roll * DEG_TO_RAD).sin_cos();

    let forward = Vec3::new(cp * cy, cp * sy, -sp);
    let right = Vec3::new(
        -sr * sp * cy + cr * sy,
        -sr * sp * sy - cr * cy,
        -sr * cp,
    );
    let up = Vec3::new(
        cr * sp * cy + sr * sy,
        cr * sp * sy - sr * cy,
        cr * cp,
    );
    (forward, right, up)
}

/// Remap a tracking-space vector (meters, Y up, -Z forward) into engine
/// units and axes (Z up, X forward, Y left).
#[inline]
pub fn tracking_to_engine(v: Vec3) -> Vec3 {
    Vec3::new(-v.z, -v.x, v.y) * METERS_TO_UNITS
}

impl Quat {
    /// Read a tracking-space orientation as engine angles in degrees.
    ///
    /// When the rotation sits within [`GIMBAL_THRESHOLD`] of a pole the
    /// general formula loses a degree of freedom. Those cases pin roll to
    /// ∓90°, zero pitch and put the remaining rotation in yaw.
    pub fn to_tracking_angles(self) -> Angles {
        let Quat { x, y, z, w } = self;
        let sqw = w * w;
        let sqx = x * x;
        let sqy = y * y;
        let sqz = z * z;
        // 1 for a unit quaternion, otherwise a correction factor
        let unit = sqx + sqy + sqz + sqw;
        let test = x * y + z * w;

        if test > GIMBAL_THRESHOLD * unit {
            return Angles::new(0.0, 2.0 * x.atan2(w) * RAD_TO_DEG, -90.0);
        }
        if test < -GIMBAL_THRESHOLD * unit {
            return Angles::new(0.0, -2.0 * x.atan2(w) * RAD_TO_DEG, 90.0);
        }

        let heading = (2.0 * y * w - 2.0 * x * z).atan2(sqx - sqy - sqz + sqw);
        let attitude = (2.0 * test / unit).clamp(-1.0, 1.0).asin();
        let bank = (2.0 * x * w - 2.0 * y * z).atan2(-sqx + sqy - sqz + sqw);

        Angles::new(-bank * RAD_TO_DEG, heading * RAD_TO_DEG, -attitude * RAD_TO_DEG)
    }

    /// Inverse of [`Quat::to_tracking_angles`] away from the poles
    pub fn from_tracking_angles(a: Angles) -> Self {
        let heading = a.yaw * DEG_TO_RAD;
        let attitude = -a.roll * DEG_TO_RAD;
        let bank = -a.pitch * DEG_TO_RAD;

        let (s1, c1) = (heading * 0.5).sin_cos();
        let (s2, c2) = (attitude * 0.5).sin_cos();
        let (s3, c3) = (bank * 0.5).sin_cos();

        Self::new(
            s1 * s2 * c3 + c1 * c2 * s3,
            s1 * c2 * c3 + c1 * s2 * s3,
            c1 * s2 * c3 - s1 * c2 * s3,
            c1 * c2 * c3 - s1 * s2 * s3,
        )
    }

    /// Engine angles (Z-up, yaw then pitch then roll) to a quaternion
    pub fn from_engine_angles(a: Angles) -> Self {
        let (sp, cp) = (a.pitch * DEG_TO_RAD * 0.5).sin_cos();
        let (sy, cy) = (a.yaw * DEG_TO_RAD * 0.5).sin_cos();
        let (sr, cr) = (a.roll * DEG_TO_RAD * 0.5).sin_cos();

        let cpcy = cp * cy;
        let spsy = sp * sy;
        Self::new(
            sr * cpcy - cr * spsy,
            cr * sp * cy + sr * cp * sy,
            cr * cp * sy - sr * sp * cy,
            cr * cpcy + sr * spsy,
        )
    }

    /// Inverse of [`Quat::from_engine_angles`]
    pub fn to_engine_angles(self) -> Angles {
        let Quat { x, y, z, w } = self;
        let (ww, xx, yy, zz) = (w * w, x * x, y * y, z * z);

        let roll = (2.0 * (y * z + x * w)).atan2(-xx - yy + zz + ww);
        let pitch = (-2.0 * (x * z - y * w)).clamp(-1.0, 1.0).asin();
        let yaw = (2.0 * (x * y + z * w)).atan2(xx - yy - zz + ww);

        Angles::new(pitch * RAD_TO_DEG, yaw * RAD_TO_DEG, roll * RAD_TO_DEG)
    }
}
