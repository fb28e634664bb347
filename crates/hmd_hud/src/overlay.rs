//! World-space placement of the 2D layers
//!
//! Menus, the console and the status bar are drawn by the engine onto a
//! fixed virtual canvas. These functions produce the model transform that
//! hangs that canvas in front of the player so it can be seen in stereo.

use hmd_math::{radians, Angles, Mat4, Vec3};

/// Virtual canvas the engine draws 2D layers onto, pixels
pub const CANVAS_WIDTH: f32 = 320.0;
pub const CANVAS_HEIGHT: f32 = 200.0;

/// Menu/console canvas scale, units per canvas pixel
pub const OVERLAY_SCALE: f32 = 0.13;
/// Distance of the menu/console canvas from the view origin
pub const OVERLAY_DISTANCE: f32 = 48.0;

/// Status bar scale, units per canvas pixel
pub const STATUS_BAR_SCALE: f32 = 0.025;
/// Distance of the status bar from its anchor
pub const STATUS_BAR_DISTANCE: f32 = 1.0;
/// Extra tilt of the status bar toward the viewer, degrees
pub const STATUS_BAR_TILT: f32 = 45.0;
/// How far the status bar hangs below its anchor, canvas units
pub const STATUS_BAR_DROP: f32 = 10.0;

fn placement_angles(aim: Angles, level_pitch: bool) -> Angles {
    if level_pitch {
        Angles { pitch: 0.0, ..aim }
    } else {
        aim
    }
}

/// Upright canvas facing back along `forward`, tilted by `tilt` degrees
fn billboard(target: Vec3, angles: Angles, tilt: f32) -> Mat4 {
    Mat4::from_translation(target)
        * Mat4::from_rotation_z(radians(angles.yaw - 90.0))
        * Mat4::from_rotation_x(radians(-(tilt + angles.pitch)))
}

/// Transform for the menu and console canvas.
///
/// The canvas is centred `OVERLAY_DISTANCE` units along the aim direction.
/// With `level_pitch` the canvas ignores aim pitch and stays at eye level.
pub fn overlay_transform(view_origin: Vec3, aim: Angles, level_pitch: bool) -> Mat4 {
    let angles = placement_angles(aim, level_pitch);
    let target = view_origin.mul_add(OVERLAY_DISTANCE, angles.forward());

    billboard(target, angles, 90.0)
        * Mat4::from_translation(Vec3::new(
            -(CANVAS_WIDTH * OVERLAY_SCALE / 2.0),
            -(CANVAS_HEIGHT * OVERLAY_SCALE / 2.0),
            0.0,
        ))
        * Mat4::from_scale(Vec3::splat(OVERLAY_SCALE))
}

/// Transform for the status bar.
///
/// `anchor` is the off-hand in controller aim mode, otherwise the view
/// entity origin.
pub fn status_bar_transform(anchor: Vec3, aim: Angles, level_pitch: bool) -> Mat4 {
    let angles = placement_angles(aim, level_pitch);
    let target = anchor.mul_add(STATUS_BAR_DISTANCE, angles.forward());

    billboard(target, angles, 90.0 + STATUS_BAR_TILT)
        * Mat4::from_translation(Vec3::new(-(CANVAS_WIDTH * STATUS_BAR_SCALE / 2.0), 0.0, 0.0))
        * Mat4::from_translation(Vec3::new(0.0, 0.0, STATUS_BAR_DROP))
        * Mat4::from_scale(Vec3::splat(STATUS_BAR_SCALE))
}
