//! Aim-mode state machine.
//!
//! Once per frame, after pose resolution, the head orientation is folded
//! into the game's view and aim angles according to the active [`AimMode`].
//! The previous head orientation and aim are cached at the end of every
//! pass so the next frame can work in deltas.
//!
//! Yaw deltas and view/aim divergence are wrapped differences, and both yaws
//! are wrapped into `[-180, 180)` when the pass ends.

use crate::config::AimMode;
use crate::view::ViewState;
use hmd_math::{angle_delta, wrap_degrees, Angles, Quat, Vec3};
use hmd_xr::{ControllerState, WEAPON_HAND};

/// Viewmodel offset from the weapon hand before rotation
pub const GUN_OFFSET: Vec3 = Vec3::new(-5.0, 0.0, 8.0);

/// Per-frame inputs to [`AimState::resolve`]
#[derive(Debug, Clone, Copy)]
pub struct AimInput<'a> {
    pub mode: AimMode,
    /// Yaw deadzone, degrees
    pub deadzone: f32,
    /// Pitch trim for controller aiming, degrees
    pub gun_angle: f32,
    /// Head orientation this frame
    pub head: Angles,
    pub controllers: &'a [ControllerState; 2],
    /// World origin of the player entity
    pub player_origin: Vec3,
}

/// Last-frame cache
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AimState {
    last_orientation: Angles,
    last_aim: Angles,
}

impl AimState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Head orientation seen by the previous pass
    pub fn last_orientation(&self) -> Angles {
        self.last_orientation
    }

    /// Aim angles left by the previous pass
    pub fn last_aim(&self) -> Angles {
        self.last_aim
    }

    /// Rebase the aim delta, e.g. after a teleport or recenter
    pub fn set_last_aim(&mut self, aim: Angles) {
        self.last_aim = aim;
    }

    /// Fold this frame's head orientation into `state`
    pub fn resolve(&mut self, input: &AimInput<'_>, state: &mut ViewState) {
        let head = input.head;
        if !head.is_finite() {
            log::warn!("Non-finite head orientation {:?}, skipping aim pass", head);
            return;
        }

        state.aim.roll = 0.0;

        let d_yaw = angle_delta(head.yaw, self.last_orientation.yaw);
        let d_pitch = head.pitch - self.last_orientation.pitch;

        match input.mode {
            AimMode::HeadMouseYaw => {
                state.aim.pitch = head.pitch;
                state.view.pitch = head.pitch;
                state.aim.yaw += d_yaw;
                state.view.yaw = state.aim.yaw;
            }
            AimMode::HeadMouseYawPitch => {
                state.aim.pitch += d_pitch;
                state.view.pitch = state.aim.pitch;
                state.aim.yaw += d_yaw;
                state.view.yaw = state.aim.yaw;
            }
            AimMode::MouseYaw => {
                state.view.pitch = head.pitch;
                state.view.yaw = state.aim.yaw + head.yaw;
            }
            AimMode::MouseYawPitch => {
                state.view.pitch = state.aim.pitch + head.pitch;
                state.view.yaw = state.aim.yaw + head.yaw;
            }
            AimMode::Blended | AimMode::BlendedNoPitch => {
                let d_aim_yaw = angle_delta(state.aim.yaw, self.last_aim.yaw);

                state.view.yaw += d_yaw;
                let divergence = angle_delta(state.view.yaw, state.aim.yaw);
                if divergence.abs() > input.deadzone / 2.0 {
                    log::trace!("View {:.1} deg from aim, recoupling", divergence);
                    state.aim.yaw += d_yaw;
                    state.view.yaw += d_aim_yaw;
                }
                if input.mode == AimMode::Blended {
                    state.aim.pitch += d_pitch;
                }
                state.view.pitch = head.pitch;
            }
            AimMode::Controller => {
                self.apply_controller(input, state);
            }
        }

        state.view.roll = head.roll;
        state.view.yaw = wrap_degrees(state.view.yaw);
        state.aim.yaw = wrap_degrees(state.aim.yaw);

        self.last_orientation = head;
        self.last_aim = state.aim;
    }

    fn apply_controller(&self, input: &AimInput<'_>, state: &mut ViewState) {
        let head = input.head;
        let weapon = input.controllers[WEAPON_HAND].orientation;

        state.view.pitch = head.pitch;
        state.view.yaw = head.yaw;

        state.aim = Angles::new(weapon.pitch + input.gun_angle, weapon.yaw, weapon.roll);
        state.weapon_offset = Quat::from_engine_angles(state.aim).rotate(GUN_OFFSET);

        let mut body = input.player_origin;
        body.z += state.view_height;
        for (slot, controller) in input.controllers.iter().enumerate() {
            state.hand_positions[slot] = controller.position + body;
            state.hand_rotations[slot] = controller.orientation;
        }
    }
}
