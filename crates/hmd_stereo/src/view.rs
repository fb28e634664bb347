//! Game-side view state and the per-eye view transforms.
//!
//! The modelview is built in the engine's Z-up frame:
//!
//! ```text
//!   Rx(-90) · Rz(90)             Z-up world to GL eye axes
//!   · Ry(-pitch) · Rx(-roll) · Rz(-yaw)
//!   · T(-(view_origin + eye_offset))
//! ```
//!
//! `eye_offset` is the tracked eye position in engine units, turned about Z
//! from the headset's yaw into the game's current view yaw.

use hmd_math::{radians, tracking_to_engine, Angles, Mat4, Vec3};
use hmd_xr::{Eye, EyePose, RawMatrix44};

/// Near clip plane for eye projections, engine units
pub const NEAR_CLIP: f32 = 4.0;
/// Engine eye height above the player origin with no headset
pub const DEFAULT_VIEW_HEIGHT: f32 = 22.0;

/// Orientation and body state shared with game code.
///
/// The aim modes write this every frame. Game code may also write `view`
/// and `aim` between frames from mouse input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    /// Camera orientation
    pub view: Angles,
    /// Weapon and interaction orientation
    pub aim: Angles,
    /// Eye height above the player origin
    pub view_height: f32,
    /// World position of each hand (off-hand, weapon hand)
    pub hand_positions: [Vec3; 2],
    /// Orientation of each hand
    pub hand_rotations: [Angles; 2],
    /// Viewmodel offset from the weapon hand
    pub weapon_offset: Vec3,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            view: Angles::ZERO,
            aim: Angles::ZERO,
            view_height: DEFAULT_VIEW_HEIGHT,
            hand_positions: [Vec3::ZERO; 2],
            hand_rotations: [Angles::ZERO; 2],
            weapon_offset: Vec3::ZERO,
        }
    }
}

/// Everything the scene renderer needs to draw one eye
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeView {
    pub eye: Eye,
    pub projection: Mat4,
    pub modelview: Mat4,
    /// Horizontal field of view, degrees
    pub fov_x: f32,
    /// Vertical field of view, degrees
    pub fov_y: f32,
    /// World position of this eye
    pub origin: Vec3,
}

/// Runtime row-major projection to an engine matrix
#[inline]
pub fn projection_from_raw(raw: &RawMatrix44) -> Mat4 {
    Mat4::from_cols_array_2d(raw).transpose()
}

/// Tracked eye position in engine units, re-expressed in the game's facing
pub fn eye_offset(pose: &EyePose, view_yaw: f32) -> Vec3 {
    let tracked = pose.orientation.to_tracking_angles();
    tracking_to_engine(pose.position).rotate_z(radians(view_yaw - tracked.yaw))
}

/// World-to-eye transform for the given view angles and eye position
pub fn modelview(view: Angles, eye_origin: Vec3) -> Mat4 {
    Mat4::from_rotation_x(radians(-90.0))
        * Mat4::from_rotation_z(radians(90.0))
        * Mat4::from_rotation_y(radians(-view.pitch))
        * Mat4::from_rotation_x(radians(-view.roll))
        * Mat4::from_rotation_z(radians(-view.yaw))
        * Mat4::from_translation(-eye_origin)
}

/// Inputs for composing one eye's view
#[derive(Debug, Clone, Copy)]
pub struct EyeViewInput<'a> {
    pub eye: Eye,
    pub pose: &'a EyePose,
    /// Runtime projection for this eye at `NEAR_CLIP` and the engine far clip
    pub projection: &'a RawMatrix44,
    pub fov: (f32, f32),
    pub view: Angles,
    pub view_origin: Vec3,
}

/// Build the projection and modelview for one eye
pub fn compose_eye_view(input: &EyeViewInput<'_>) -> EyeView {
    let origin = input.view_origin + eye_offset(input.pose, input.view.yaw);
    EyeView {
        eye: input.eye,
        projection: projection_from_raw(input.projection),
        modelview: modelview(input.view, origin),
        fov_x: input.fov.0,
        fov_y: input.fov.1,
        origin,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use hmd_math::consts::METERS_TO_UNITS;
    use hmd_math::Quat;
    use hmd_xr::ProjectionRaw;

    fn assert_vec_eq(a: Vec3, b: Vec3) {
        assert_abs_diff_eq!(a.x, b.x, epsilon = 1e-3);
        assert_abs_diff_eq!(a.y, b.y, epsilon = 1e-3);
        assert_abs_diff_eq!(a.z, b.z, epsilon = 1e-3);
    }

    #[test]
    fn test_projection_transposed_into_engine_order() {
        let raw = ProjectionRaw::new(-1.0, 1.0, -1.0, 1.0).to_projection_matrix(NEAR_CLIP, 4096.0);
        let p = projection_from_raw(&raw);
        for (row, values) in raw.iter().enumerate() {
            for (col, value) in values.iter().enumerate() {
                assert_eq!(p.get(row, col), *value);
            }
        }
        assert_eq!(p.get(3, 2), -1.0);
    }

    #[test]
    fn test_modelview_forward_is_minus_z() {
        let m = modelview(Angles::ZERO, Vec3::ZERO);
        assert_vec_eq(m.transform_point(Vec3::new(10.0, 0.0, 0.0)), Vec3::new(0.0, 0.0, -10.0));
        // engine +Y is to the left, engine +Z is up
        assert_vec_eq(m.transform_point(Vec3::new(0.0, 10.0, 0.0)), Vec3::new(-10.0, 0.0, 0.0));
        assert_vec_eq(m.transform_point(Vec3::new(0.0, 0.0, 10.0)), Vec3::new(0.0, 10.0, 0.0));
    }

    #[test]
    fn test_modelview_yaw_and_origin() {
        let origin = Vec3::new(100.0, 50.0, 20.0);
        let m = modelview(Angles::new(0.0, 90.0, 0.0), origin);
        let ahead = origin + Vec3::new(0.0, 10.0, 0.0);
        assert_vec_eq(m.transform_point(ahead), Vec3::new(0.0, 0.0, -10.0));
        assert_vec_eq(m.transform_point(origin), Vec3::ZERO);
    }

    #[test]
    fn test_eye_offset_follows_view_yaw() {
        // right eye 3.2cm to the right of an unrotated head
        let pose = EyePose {
            position: Vec3::new(0.032, 0.0, 0.0),
            orientation: Quat::IDENTITY,
        };
        let facing_x = eye_offset(&pose, 0.0);
        assert_vec_eq(facing_x, Vec3::new(0.0, -0.032 * METERS_TO_UNITS, 0.0));

        // same head, game turned to face +Y: right is now +X
        let facing_y = eye_offset(&pose, 90.0);
        assert_vec_eq(facing_y, Vec3::new(0.032 * METERS_TO_UNITS, 0.0, 0.0));
    }

    #[test]
    fn test_compose_eye_view() {
        let pose = EyePose {
            position: Vec3::new(-0.032, 0.0, 0.0),
            orientation: Quat::IDENTITY,
        };
        let raw = ProjectionRaw::new(-1.0, 1.0, -1.0, 1.0).to_projection_matrix(NEAR_CLIP, 4096.0);
        let view = compose_eye_view(&EyeViewInput {
            eye: Eye::Left,
            pose: &pose,
            projection: &raw,
            fov: (90.0, 90.0),
            view: Angles::ZERO,
            view_origin: Vec3::new(0.0, 0.0, 22.0),
        });
        assert_eq!(view.eye, Eye::Left);
        assert_vec_eq(view.origin, Vec3::new(0.0, 0.032 * METERS_TO_UNITS, 22.0));
        assert_vec_eq(view.modelview.transform_point(view.origin), Vec3::ZERO);
        assert_eq!(view.fov_x, 90.0);
    }
}
