//! Tracked-device and per-eye data exchanged with a runtime

use hmd_math::consts::RAD_TO_DEG;
use hmd_math::Mat34;

/// Row-major 4x4 matrix as reported by a runtime, `m[row][col]`
pub type RawMatrix44 = [[f32; 4]; 4];

/// Eye identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Eye {
    Left,
    Right,
}

impl Eye {
    /// Both eyes in render order
    pub const BOTH: [Eye; 2] = [Eye::Left, Eye::Right];

    /// Array index (left = 0)
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Eye::Left => 0,
            Eye::Right => 1,
        }
    }
}

/// Kind of tracked device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceClass {
    Hmd,
    Controller,
    /// Base stations, trackers and anything else we ignore
    Other,
}

/// Which hand a controller is assigned to by the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControllerRole {
    LeftHand,
    RightHand,
    /// Not yet assigned
    Invalid,
}

/// One device's pose for the current frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedDevicePose {
    pub class: DeviceClass,
    /// Only meaningful for controllers
    pub role: ControllerRole,
    /// False when the runtime lost tracking for this device
    pub valid: bool,
    /// Device to tracking-space transform, meters
    pub device_to_tracking: Mat34,
}

impl TrackedDevicePose {
    pub fn hmd(device_to_tracking: Mat34) -> Self {
        Self {
            class: DeviceClass::Hmd,
            role: ControllerRole::Invalid,
            valid: true,
            device_to_tracking,
        }
    }

    pub fn controller(role: ControllerRole, device_to_tracking: Mat34) -> Self {
        Self {
            class: DeviceClass::Controller,
            role,
            valid: true,
            device_to_tracking,
        }
    }

    /// Same pose, flagged invalid
    pub fn invalid(self) -> Self {
        Self { valid: false, ..self }
    }
}

/// Raw projection half-extents as tangents of the view-frustum angles.
///
/// `left` and `top` are negative for a frustum that contains the view axis;
/// `top` points toward screen-up with an inverted sign.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionRaw {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl ProjectionRaw {
    pub const fn new(left: f32, right: f32, top: f32, bottom: f32) -> Self {
        Self { left, right, top, bottom }
    }

    /// Horizontal field of view in degrees
    pub fn fov_x(&self) -> f32 {
        ((-self.left).atan() + self.right.atan()) * RAD_TO_DEG
    }

    /// Vertical field of view in degrees
    pub fn fov_y(&self) -> f32 {
        ((-self.top).atan() + self.bottom.atan()) * RAD_TO_DEG
    }

    /// OpenGL-style off-axis projection, row-major
    pub fn to_projection_matrix(&self, near: f32, far: f32) -> RawMatrix44 {
        let idx = 1.0 / (self.right - self.left);
        let idy = 1.0 / (self.bottom - self.top);
        let sx = self.right + self.left;
        let sy = self.bottom + self.top;
        let depth = far - near;

        [
            [2.0 * idx, 0.0, sx * idx, 0.0],
            [0.0, 2.0 * idy, sy * idy, 0.0],
            [0.0, 0.0, -(far + near) / depth, -2.0 * far * near / depth],
            [0.0, 0.0, -1.0, 0.0],
        ]
    }
}

/// Render target dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Graphics-API texture name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextureId(pub u32);

/// Color space of a submitted texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorSpace {
    Auto,
    #[default]
    Gamma,
    Linear,
}

/// Texture handed to the compositor for one eye
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EyeTexture {
    pub texture: TextureId,
    pub color_space: ColorSpace,
}

impl EyeTexture {
    pub fn gamma(texture: TextureId) -> Self {
        Self {
            texture,
            color_space: ColorSpace::Gamma,
        }
    }
}

/// Tracking universe the runtime reports poses in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TrackingSpace {
    /// Origin at the recentered seated head position
    #[default]
    Seated,
    /// Origin on the floor of the play area
    Standing,
    /// Uncalibrated driver space
    Raw,
}
