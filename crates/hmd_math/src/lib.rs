//! # hmd_math - HMD / Engine Math
//!
//! Small, allocation-free math primitives for moving tracked-device poses
//! between a tracking runtime's frame and the engine's frame:
//!
//! - [`Vec3`], [`Vec4`], column-major [`Mat4`] and the runtime's row-major [`Mat34`]
//! - [`Quat`] with the Hamilton product and sandwich rotation
//! - [`Angles`] plus the gimbal-aware tracking conversion and the engine ZYX pair
//!
//! Angles are degrees at every public boundary. Trigonometry is done in
//! radians through the fixed [`consts::DEG_TO_RAD`] factor.

pub mod angles;
pub mod matrix;
pub mod quaternion;
pub mod vector;

pub use angles::*;
pub use matrix::*;
pub use quaternion::*;
pub use vector::*;

/// Common math constants
pub mod consts {
    pub const PI: f32 = core::f32::consts::PI;
    pub const DEG_TO_RAD: f32 = PI / 180.0;
    pub const RAD_TO_DEG: f32 = 180.0 / PI;

    /// Engine units per meter (one unit is 1.5 inches)
    pub const METERS_TO_UNITS: f32 = 1.0 / (1.5 * 0.0254);
}

/// Convert degrees to radians
#[inline]
pub fn radians(degrees: f32) -> f32 {
    degrees * consts::DEG_TO_RAD
}

/// Convert radians to degrees
#[inline]
pub fn degrees(radians: f32) -> f32 {
    radians * consts::RAD_TO_DEG
}

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::angles::{angle_delta, angle_vectors, tracking_to_engine, wrap_degrees, Angles};
    pub use crate::consts::{DEG_TO_RAD, METERS_TO_UNITS, RAD_TO_DEG};
    pub use crate::matrix::{Mat34, Mat4};
    pub use crate::quaternion::Quat;
    pub use crate::vector::{Vec3, Vec4};
    pub use crate::{degrees, radians};
}
