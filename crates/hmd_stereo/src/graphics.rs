//! Graphics driver and scene renderer collaborators.
//!
//! The stereo cycle never issues draw calls itself. It drives an engine
//! supplied [`GraphicsDevice`] for render targets and a [`SceneRenderer`]
//! for everything that ends up in them.

use crate::error::GraphicsError;
use crate::view::EyeView;
use hmd_xr::{Extent, Eye, ProjectionRaw, TextureId};

/// Offscreen color and depth target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTarget {
    /// Framebuffer object name
    pub framebuffer: u32,
    pub color: TextureId,
    pub depth: TextureId,
    pub size: Extent,
}

/// Render target operations the stereo cycle needs.
///
/// `supports_offscreen_targets` is probed once before any target is
/// created. A device that answers `false` keeps the session disabled.
pub trait GraphicsDevice {
    /// Framebuffer objects and framebuffer blits are available
    fn supports_offscreen_targets(&self) -> bool;

    fn create_render_target(&mut self, size: Extent) -> Result<RenderTarget, GraphicsError>;

    fn destroy_render_target(&mut self, target: &RenderTarget);

    /// Bind `target` for drawing. `None` binds the backbuffer.
    fn bind_render_target(&mut self, target: Option<&RenderTarget>);

    /// Attach `color` as the color buffer of `target`, with its own depth
    fn attach_color(&mut self, target: &RenderTarget, color: TextureId);

    fn set_viewport(&mut self, width: u32, height: u32);

    /// Clear color and depth of the bound target
    fn clear(&mut self);

    /// Copy `source` onto the backbuffer, stretched to `dest`
    fn blit_to_backbuffer(&mut self, source: &RenderTarget, dest: Extent, flip_y: bool);
}

/// Engine-side rendering entry points
pub trait SceneRenderer {
    /// Size the engine currently renders at
    fn viewport_size(&self) -> Extent;

    fn set_viewport_size(&mut self, size: Extent);

    /// Reseed the engine's pseudo-random source
    fn seed_random(&mut self, seed: u32);

    /// Draw the world, HUD and crosshair through `view`
    fn render_eye(&mut self, view: &EyeView);
}

/// Random seed shared by both eyes of a frame, from the simulation clock
#[inline]
pub fn frame_seed(time: f64) -> u32 {
    (time * 1000.0) as i32 as u32
}

/// One eye's render target and field of view
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VrEye {
    pub eye: Eye,
    pub target: RenderTarget,
    /// Degrees
    pub fov_x: f32,
    /// Degrees
    pub fov_y: f32,
}

impl VrEye {
    pub fn new(eye: Eye, target: RenderTarget, projection: &ProjectionRaw) -> Self {
        let mut vr_eye = Self {
            eye,
            target,
            fov_x: 0.0,
            fov_y: 0.0,
        };
        vr_eye.update_fov(projection);
        vr_eye
    }

    pub fn update_fov(&mut self, projection: &ProjectionRaw) {
        self.fov_x = projection.fov_x();
        self.fov_y = projection.fov_y();
    }
}

/// Create both eye targets, releasing any already created if one fails
pub fn create_eye_targets(
    device: &mut dyn GraphicsDevice,
    size: Extent,
    projections: [ProjectionRaw; 2],
) -> Result<[VrEye; 2], GraphicsError> {
    if !device.supports_offscreen_targets() {
        return Err(GraphicsError::Unsupported("offscreen framebuffer objects".into()));
    }

    let left = device.create_render_target(size)?;
    let right = match device.create_render_target(size) {
        Ok(target) => target,
        Err(e) => {
            device.destroy_render_target(&left);
            return Err(e);
        }
    };

    Ok([
        VrEye::new(Eye::Left, left, &projections[0]),
        VrEye::new(Eye::Right, right, &projections[1]),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[derive(Default)]
    struct Device {
        unsupported: bool,
        fail_after: Option<usize>,
        created: Vec<RenderTarget>,
        destroyed: Vec<RenderTarget>,
    }

    impl GraphicsDevice for Device {
        fn supports_offscreen_targets(&self) -> bool {
            !self.unsupported
        }

        fn create_render_target(&mut self, size: Extent) -> Result<RenderTarget, GraphicsError> {
            if self.fail_after == Some(self.created.len()) {
                return Err(GraphicsError::RenderTarget {
                    width: size.width,
                    height: size.height,
                    reason: "out of memory".into(),
                });
            }
            let n = self.created.len() as u32 * 3;
            let target = RenderTarget {
                framebuffer: n + 1,
                color: TextureId(n + 2),
                depth: TextureId(n + 3),
                size,
            };
            self.created.push(target);
            Ok(target)
        }

        fn destroy_render_target(&mut self, target: &RenderTarget) {
            self.destroyed.push(*target);
        }

        fn bind_render_target(&mut self, _target: Option<&RenderTarget>) {}
        fn attach_color(&mut self, _target: &RenderTarget, _color: TextureId) {}
        fn set_viewport(&mut self, _width: u32, _height: u32) {}
        fn clear(&mut self) {}
        fn blit_to_backbuffer(&mut self, _source: &RenderTarget, _dest: Extent, _flip_y: bool) {}
    }

    fn projections() -> [ProjectionRaw; 2] {
        [
            ProjectionRaw::new(-1.0, 1.0, -1.0, 1.0),
            ProjectionRaw::new(-1.0, 1.0, -2.0, 2.0),
        ]
    }

    #[test]
    fn test_create_eye_targets() {
        let mut device = Device::default();
        let eyes = create_eye_targets(&mut device, Extent::new(1024, 1024), projections()).unwrap();
        assert_eq!(eyes[0].eye, Eye::Left);
        assert_eq!(eyes[1].eye, Eye::Right);
        assert_ne!(eyes[0].target, eyes[1].target);
        assert_abs_diff_eq!(eyes[0].fov_x, 90.0, epsilon = 1e-4);
        assert_abs_diff_eq!(eyes[1].fov_y, 2.0 * 2.0f32.atan().to_degrees(), epsilon = 1e-4);
    }

    #[test]
    fn test_capability_probe_blocks_creation() {
        let mut device = Device {
            unsupported: true,
            ..Device::default()
        };
        let err = create_eye_targets(&mut device, Extent::new(64, 64), projections()).unwrap_err();
        assert!(matches!(err, GraphicsError::Unsupported(_)));
        assert!(device.created.is_empty());
    }

    #[test]
    fn test_partial_creation_rolls_back() {
        let mut device = Device {
            fail_after: Some(1),
            ..Device::default()
        };
        let err = create_eye_targets(&mut device, Extent::new(64, 64), projections()).unwrap_err();
        assert!(matches!(err, GraphicsError::RenderTarget { .. }));
        assert_eq!(device.destroyed, device.created);
    }

    #[test]
    fn test_frame_seed_is_clock_millis() {
        assert_eq!(frame_seed(12.3456), 12345);
        assert_eq!(frame_seed(0.0), 0);
    }
}
