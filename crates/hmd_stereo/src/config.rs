//! Session configuration

use crate::error::Result;
use hmd_hud::CrosshairConfig;
use serde::{Deserialize, Deserializer, Serialize};

/// Largest allowed yaw deadzone, degrees
pub const MAX_DEADZONE: f32 = 70.0;
pub const DEFAULT_DEADZONE: f32 = 30.0;
/// Default pitch trim between controller and weapon, degrees
pub const DEFAULT_GUN_ANGLE: f32 = 32.0;

/// How head tracking, mouse and controllers combine into view and aim.
///
/// Stored and serialized as its integer selector. Unknown selectors fall
/// back to [`AimMode::HeadMouseYaw`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum AimMode {
    /// Aim follows the head. Mouse turns yaw, head pitch is absolute.
    #[default]
    HeadMouseYaw = 1,
    /// Aim follows the head. Mouse turns yaw and pitch.
    HeadMouseYawPitch = 2,
    /// Mouse aims. View yaw is mouse yaw plus head yaw, view pitch is head pitch.
    MouseYaw = 3,
    /// Mouse aims. View is mouse plus head on both axes.
    MouseYawPitch = 4,
    /// View and aim drift apart inside the deadzone, pitch follows the head
    Blended = 5,
    /// As `Blended`, but head pitch does not move aim
    BlendedNoPitch = 6,
    /// Weapon hand controller aims, head only looks
    Controller = 7,
}

impl AimMode {
    pub const ALL: [AimMode; 7] = [
        AimMode::HeadMouseYaw,
        AimMode::HeadMouseYawPitch,
        AimMode::MouseYaw,
        AimMode::MouseYawPitch,
        AimMode::Blended,
        AimMode::BlendedNoPitch,
        AimMode::Controller,
    ];

    pub fn from_selector(value: i32) -> Self {
        match value {
            2 => AimMode::HeadMouseYawPitch,
            3 => AimMode::MouseYaw,
            4 => AimMode::MouseYawPitch,
            5 => AimMode::Blended,
            6 => AimMode::BlendedNoPitch,
            7 => AimMode::Controller,
            _ => AimMode::HeadMouseYaw,
        }
    }

    #[inline]
    pub fn selector(self) -> i32 {
        self as i32
    }

    /// Modes where menus and the status bar stay level instead of
    /// following aim pitch
    pub fn levels_overlay(self) -> bool {
        matches!(self, AimMode::HeadMouseYaw | AimMode::HeadMouseYawPitch)
    }
}

impl From<i32> for AimMode {
    fn from(value: i32) -> Self {
        Self::from_selector(value)
    }
}

impl From<AimMode> for i32 {
    fn from(mode: AimMode) -> Self {
        mode.selector()
    }
}

/// Clamp a deadzone to `0..=MAX_DEADZONE`. NaN becomes zero.
pub fn clamp_deadzone(degrees: f32) -> f32 {
    if degrees.is_nan() {
        return 0.0;
    }
    degrees.clamp(0.0, MAX_DEADZONE)
}

fn deserialize_deadzone<'de, D>(deserializer: D) -> std::result::Result<f32, D::Error>
where
    D: Deserializer<'de>,
{
    f32::deserialize(deserializer).map(clamp_deadzone)
}

/// Every option the stereo session recognizes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VrConfig {
    /// Drives session start and stop
    pub enabled: bool,
    pub crosshair: CrosshairConfig,
    pub aim_mode: AimMode,
    /// Yaw deadzone in degrees, always within `0..=70`
    #[serde(deserialize_with = "deserialize_deadzone")]
    deadzone: f32,
    /// Swap which physical controller is the weapon hand
    pub left_handed: bool,
    /// Pitch trim added to the controller when aiming with it, degrees
    pub gun_angle: f32,
}

impl Default for VrConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            crosshair: CrosshairConfig::default(),
            aim_mode: AimMode::default(),
            deadzone: DEFAULT_DEADZONE,
            left_handed: false,
            gun_angle: DEFAULT_GUN_ANGLE,
        }
    }
}

impl VrConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    #[inline]
    pub fn deadzone(&self) -> f32 {
        self.deadzone
    }

    /// Set the deadzone, clamped. Returns the value actually stored.
    pub fn set_deadzone(&mut self, degrees: f32) -> f32 {
        self.deadzone = clamp_deadzone(degrees);
        if self.deadzone != degrees {
            log::debug!("Deadzone {} clamped to {}", degrees, self.deadzone);
        }
        self.deadzone
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_aim_mode(mut self, mode: AimMode) -> Self {
        self.aim_mode = mode;
        self
    }

    pub fn with_deadzone(mut self, degrees: f32) -> Self {
        self.set_deadzone(degrees);
        self
    }

    pub fn with_left_handed(mut self, left_handed: bool) -> Self {
        self.left_handed = left_handed;
        self
    }

    pub fn with_gun_angle(mut self, degrees: f32) -> Self {
        self.gun_angle = degrees;
        self
    }

    pub fn with_crosshair(mut self, crosshair: CrosshairConfig) -> Self {
        self.crosshair = crosshair;
        self
    }
}
