//! HMD runtime capability interface

use crate::error::Result;
use crate::types::{
    Extent, Eye, EyeTexture, ProjectionRaw, RawMatrix44, TextureId, TrackedDevicePose, TrackingSpace,
};
use hmd_math::Mat34;

/// Capability interface over an HMD tracking/compositor runtime.
///
/// One adapter exists per SDK. Everything the stereo pipeline needs from the
/// headset goes through this trait so the session can be driven by a
/// simulated runtime in tests. Calls come from the engine's frame thread only.
pub trait HmdRuntime {
    /// Backend name
    fn name(&self) -> &str;

    /// Connect to the runtime and find a headset
    fn initialize(&mut self) -> Result<()>;

    /// Release the runtime. Safe to call when not initialized.
    fn shutdown(&mut self);

    fn is_initialized(&self) -> bool;

    /// Per-eye render target size the runtime wants
    fn recommended_render_target_size(&self) -> Extent;

    /// Raw frustum tangents for an eye
    fn projection_raw(&self, eye: Eye) -> ProjectionRaw;

    /// Projection matrix for an eye, row-major
    fn projection_matrix(&self, eye: Eye, near: f32, far: f32) -> RawMatrix44 {
        self.projection_raw(eye).to_projection_matrix(near, far)
    }

    /// Fixed eye-to-head transform, meters
    fn eye_to_head(&self, eye: Eye) -> Mat34;

    /// Block until the compositor is ready for a new frame, then report
    /// every device pose. `poses` is cleared first.
    fn wait_get_poses(&mut self, poses: &mut Vec<TrackedDevicePose>) -> Result<()>;

    /// A runtime-owned image to render this eye into, if the runtime
    /// manages its own swapchain
    fn acquire_eye_texture(&mut self, _eye: Eye) -> Result<Option<TextureId>> {
        Ok(None)
    }

    /// Hand a finished eye image to the compositor
    fn submit(&mut self, eye: Eye, texture: &EyeTexture) -> Result<()>;

    /// Called once after both eyes are submitted
    fn end_frame(&mut self) -> Result<()> {
        Ok(())
    }

    fn set_tracking_space(&mut self, space: TrackingSpace) -> Result<()>;

    /// Make the current head pose the seated origin
    fn reset_seated_zero_pose(&mut self) -> Result<()>;
}

impl<R: HmdRuntime + ?Sized> HmdRuntime for Box<R> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn initialize(&mut self) -> Result<()> {
        (**self).initialize()
    }

    fn shutdown(&mut self) {
        (**self).shutdown()
    }

    fn is_initialized(&self) -> bool {
        (**self).is_initialized()
    }

    fn recommended_render_target_size(&self) -> Extent {
        (**self).recommended_render_target_size()
    }

    fn projection_raw(&self, eye: Eye) -> ProjectionRaw {
        (**self).projection_raw(eye)
    }

    fn projection_matrix(&self, eye: Eye, near: f32, far: f32) -> RawMatrix44 {
        (**self).projection_matrix(eye, near, far)
    }

    fn eye_to_head(&self, eye: Eye) -> Mat34 {
        (**self).eye_to_head(eye)
    }

    fn wait_get_poses(&mut self, poses: &mut Vec<TrackedDevicePose>) -> Result<()> {
        (**self).wait_get_poses(poses)
    }

    fn acquire_eye_texture(&mut self, eye: Eye) -> Result<Option<TextureId>> {
        (**self).acquire_eye_texture(eye)
    }

    fn submit(&mut self, eye: Eye, texture: &EyeTexture) -> Result<()> {
        (**self).submit(eye, texture)
    }

    fn end_frame(&mut self) -> Result<()> {
        (**self).end_frame()
    }

    fn set_tracking_space(&mut self, space: TrackingSpace) -> Result<()> {
        (**self).set_tracking_space(space)
    }

    fn reset_seated_zero_pose(&mut self) -> Result<()> {
        (**self).reset_seated_zero_pose()
    }
}
