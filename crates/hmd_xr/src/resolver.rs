//! Per-frame device pose resolution.
//!
//! Turns the runtime's pose list into eye and hand state:
//!
//! ```text
//!   wait_get_poses ──► [TrackedDevicePose] ──► PoseResolver::resolve
//!                                                 │
//!                  ┌──────────────────────────────┼───────────────────────┐
//!                  ▼                              ▼                       ▼
//!        HMD: head + R(head)·eye_offset   controller role ──► slot   invalid: skipped
//!             eyes share head rotation    tracking ──► engine axes
//! ```
//!
//! State only advances for valid poses; a frame with nothing valid leaves
//! the previous values in place.

use crate::types::{ControllerRole, DeviceClass, Eye, TrackedDevicePose};
use hmd_math::{tracking_to_engine, Angles, Mat34, Quat, Vec3};

/// Logical hand slot that holds the off-hand
pub const OFF_HAND: usize = 0;
/// Logical hand slot that holds the weapon hand
pub const WEAPON_HAND: usize = 1;

/// Resolved pose of one eye, tracking space
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EyePose {
    /// Meters
    pub position: Vec3,
    pub orientation: Quat,
}

/// Resolved state of one logical hand
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControllerState {
    /// Tracking-space position, meters
    pub raw_position: Vec3,
    pub raw_orientation: Quat,
    /// Position relative to the tracking origin in engine axes and units
    pub position: Vec3,
    /// Orientation as engine angles
    pub orientation: Angles,
    /// Set once the slot has received at least one valid pose
    pub tracked: bool,
}

/// Everything the resolver produces, overwritten frame by frame
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrackedState {
    pub eyes: [EyePose; 2],
    pub controllers: [ControllerState; 2],
    /// Set once the HMD has reported at least one valid pose
    pub hmd_tracked: bool,
}

impl TrackedState {
    #[inline]
    pub fn eye(&self, eye: Eye) -> &EyePose {
        &self.eyes[eye.index()]
    }

    /// Head orientation as engine angles, read from the right eye
    pub fn head_angles(&self) -> Angles {
        self.eyes[Eye::Right.index()].orientation.to_tracking_angles()
    }
}

/// What changed during one `resolve` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResolveSummary {
    pub hmd_updated: bool,
    pub controllers_updated: usize,
    pub skipped_invalid: usize,
}

impl ResolveSummary {
    /// Nothing valid arrived this frame
    pub fn is_empty(&self) -> bool {
        !self.hmd_updated && self.controllers_updated == 0
    }
}

/// Map a runtime controller role to a logical hand slot
pub fn hand_slot(role: ControllerRole, left_handed: bool) -> Option<usize> {
    let slot = match role {
        ControllerRole::LeftHand => OFF_HAND,
        ControllerRole::RightHand => WEAPON_HAND,
        ControllerRole::Invalid => return None,
    };
    Some(if left_handed { 1 - slot } else { slot })
}

/// Converts raw device poses into eye and hand state
#[derive(Debug, Clone, Default)]
pub struct PoseResolver {
    eye_to_head: [Mat34; 2],
    left_handed: bool,
    state: TrackedState,
}

impl PoseResolver {
    pub fn new(eye_to_head: [Mat34; 2]) -> Self {
        Self {
            eye_to_head,
            left_handed: false,
            state: TrackedState::default(),
        }
    }

    /// Cache the fixed eye-to-head transforms
    pub fn set_eye_to_head(&mut self, eye_to_head: [Mat34; 2]) {
        self.eye_to_head = eye_to_head;
    }

    /// Swap which physical controller feeds which hand slot
    pub fn set_left_handed(&mut self, left_handed: bool) {
        self.left_handed = left_handed;
    }

    pub fn left_handed(&self) -> bool {
        self.left_handed
    }

    pub fn state(&self) -> &TrackedState {
        &self.state
    }

    /// Forget all tracked state
    pub fn reset(&mut self) {
        self.state = TrackedState::default();
    }

    /// Apply one frame of poses
    pub fn resolve(&mut self, poses: &[TrackedDevicePose]) -> ResolveSummary {
        let mut summary = ResolveSummary::default();

        for pose in poses {
            if !pose.valid {
                if pose.class != DeviceClass::Other {
                    summary.skipped_invalid += 1;
                }
                continue;
            }

            match pose.class {
                DeviceClass::Hmd => {
                    self.apply_hmd(&pose.device_to_tracking);
                    summary.hmd_updated = true;
                }
                DeviceClass::Controller => {
                    if self.apply_controller(pose.role, &pose.device_to_tracking) {
                        summary.controllers_updated += 1;
                    }
                }
                DeviceClass::Other => {}
            }
        }

        if summary.is_empty() {
            log::trace!("No valid poses this frame, holding previous state");
        }
        summary
    }

    fn apply_hmd(&mut self, device_to_tracking: &Mat34) {
        let head_pos = device_to_tracking.translation();
        let head_rot = device_to_tracking.rotation();

        for eye in Eye::BOTH {
            let offset = self.eye_to_head[eye.index()].translation();
            self.state.eyes[eye.index()] = EyePose {
                position: head_pos + head_rot.rotate(offset),
                orientation: head_rot,
            };
        }
        self.state.hmd_tracked = true;
    }

    fn apply_controller(&mut self, role: ControllerRole, device_to_tracking: &Mat34) -> bool {
        let Some(slot) = hand_slot(role, self.left_handed) else {
            return false;
        };

        let raw_position = device_to_tracking.translation();
        let raw_orientation = device_to_tracking.rotation();
        self.state.controllers[slot] = ControllerState {
            raw_position,
            raw_orientation,
            position: tracking_to_engine(raw_position),
            orientation: raw_orientation.to_tracking_angles(),
            tracked: true,
        };
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use hmd_math::consts::{DEG_TO_RAD, METERS_TO_UNITS};

    fn eye_offsets() -> [Mat34; 2] {
        [
            Mat34::from_translation(Vec3::new(-0.032, 0.0, 0.0)),
            Mat34::from_translation(Vec3::new(0.032, 0.0, 0.0)),
        ]
    }

    fn assert_vec_eq(a: Vec3, b: Vec3) {
        assert_abs_diff_eq!(a.x, b.x, epsilon = 1e-4);
        assert_abs_diff_eq!(a.y, b.y, epsilon = 1e-4);
        assert_abs_diff_eq!(a.z, b.z, epsilon = 1e-4);
    }

    #[test]
    fn test_hmd_places_eyes() {
        let mut resolver = PoseResolver::new(eye_offsets());
        // head turned 90 degrees left about the up axis, 1.6m high
        let q = Quat::from_rotation_y(90.0 * DEG_TO_RAD);
        let head = Mat34::from_rotation_translation(q, Vec3::new(0.0, 1.6, 0.0));

        let summary = resolver.resolve(&[TrackedDevicePose::hmd(head)]);
        assert!(summary.hmd_updated);

        let state = resolver.state();
        // the left eye offset (-x) now points along +z
        assert_vec_eq(state.eye(Eye::Left).position, Vec3::new(0.0, 1.6, 0.032));
        assert_vec_eq(state.eye(Eye::Right).position, Vec3::new(0.0, 1.6, -0.032));
        assert_eq!(state.eyes[0].orientation, state.eyes[1].orientation);
        assert_abs_diff_eq!(state.head_angles().yaw, 90.0, epsilon = 1e-3);
    }

    #[test]
    fn test_invalid_pose_keeps_previous_state() {
        let mut resolver = PoseResolver::new(eye_offsets());
        let first = Mat34::from_translation(Vec3::new(0.0, 1.5, 0.0));
        resolver.resolve(&[TrackedDevicePose::hmd(first)]);
        let before = *resolver.state();

        let moved = Mat34::from_translation(Vec3::new(3.0, 0.0, 0.0));
        let summary = resolver.resolve(&[
            TrackedDevicePose::hmd(moved).invalid(),
            TrackedDevicePose::controller(ControllerRole::RightHand, moved).invalid(),
        ]);

        assert!(summary.is_empty());
        assert_eq!(summary.skipped_invalid, 2);
        assert_eq!(*resolver.state(), before);
    }

    #[test]
    fn test_empty_frame_is_noop() {
        let mut resolver = PoseResolver::new(eye_offsets());
        resolver.resolve(&[TrackedDevicePose::controller(
            ControllerRole::LeftHand,
            Mat34::from_translation(Vec3::X),
        )]);
        let before = *resolver.state();
        assert!(resolver.resolve(&[]).is_empty());
        assert_eq!(*resolver.state(), before);
    }

    #[test]
    fn test_controller_axis_remap() {
        let mut resolver = PoseResolver::new(eye_offsets());
        let raw = Vec3::new(0.1, 1.2, -0.5);
        resolver.resolve(&[TrackedDevicePose::controller(
            ControllerRole::RightHand,
            Mat34::from_translation(raw),
        )]);

        let hand = &resolver.state().controllers[WEAPON_HAND];
        assert!(hand.tracked);
        assert_eq!(hand.raw_position, raw);
        assert_vec_eq(
            hand.position,
            Vec3::new(0.5 * METERS_TO_UNITS, -0.1 * METERS_TO_UNITS, 1.2 * METERS_TO_UNITS),
        );
    }

    #[test]
    fn test_left_handed_swaps_slots_only() {
        let raw = Mat34::from_rotation_translation(
            Quat::from_tracking_angles(Angles::new(15.0, -30.0, 5.0)),
            Vec3::new(0.2, 1.1, -0.4),
        );
        let poses = [TrackedDevicePose::controller(ControllerRole::LeftHand, raw)];

        let mut right_handed = PoseResolver::new(eye_offsets());
        right_handed.resolve(&poses);

        let mut left_handed = PoseResolver::new(eye_offsets());
        left_handed.set_left_handed(true);
        left_handed.resolve(&poses);

        let normal = right_handed.state().controllers[OFF_HAND];
        let swapped = left_handed.state().controllers[WEAPON_HAND];
        assert_eq!(normal, swapped);
        assert!(!left_handed.state().controllers[OFF_HAND].tracked);
        assert!(!right_handed.state().controllers[WEAPON_HAND].tracked);
    }

    #[test]
    fn test_both_hands_scaled_identically() {
        let raw = Mat34::from_translation(Vec3::new(0.3, 1.0, -0.2));
        for left_handed in [false, true] {
            let mut resolver = PoseResolver::new(eye_offsets());
            resolver.set_left_handed(left_handed);
            resolver.resolve(&[
                TrackedDevicePose::controller(ControllerRole::LeftHand, raw),
                TrackedDevicePose::controller(ControllerRole::RightHand, raw),
            ]);
            let [a, b] = resolver.state().controllers;
            assert_eq!(a.position, b.position);
            assert_eq!(a.orientation, b.orientation);
        }
    }

    #[test]
    fn test_unassigned_controller_ignored() {
        let mut resolver = PoseResolver::new(eye_offsets());
        let summary = resolver.resolve(&[TrackedDevicePose::controller(
            ControllerRole::Invalid,
            Mat34::IDENTITY,
        )]);
        assert_eq!(summary.controllers_updated, 0);
        assert_eq!(hand_slot(ControllerRole::Invalid, true), None);
        assert_eq!(hand_slot(ControllerRole::LeftHand, true), Some(WEAPON_HAND));
        assert_eq!(hand_slot(ControllerRole::RightHand, true), Some(OFF_HAND));
    }
}
