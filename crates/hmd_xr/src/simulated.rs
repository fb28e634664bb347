//! Deterministic in-process runtime.
//!
//! Reports fixed headset parameters modelled on a first-generation
//! room-scale HMD and whatever device poses were scripted last. Every call
//! that would reach the compositor is recorded so tests can inspect it.

use crate::error::{Result, RuntimeError};
use crate::runtime::HmdRuntime;
use crate::types::{
    ControllerRole, Extent, Eye, EyeTexture, ProjectionRaw, TextureId, TrackedDevicePose, TrackingSpace,
};
use hmd_math::{Angles, Mat34, Quat, Vec3};

/// Default interpupillary distance, meters
pub const DEFAULT_IPD: f32 = 0.0719;

/// Scriptable runtime used for tests and headless runs
#[derive(Debug, Clone)]
pub struct SimulatedRuntime {
    initialized: bool,
    fail_initialize: Option<String>,
    render_size: Extent,
    projection: [ProjectionRaw; 2],
    eye_to_head: [Mat34; 2],
    poses: Vec<TrackedDevicePose>,
    eye_textures: [Option<TextureId>; 2],
    tracking_space: TrackingSpace,
    submissions: Vec<(Eye, EyeTexture)>,
    wait_count: u64,
    frames_ended: u64,
    recenter_count: u32,
}

impl Default for SimulatedRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedRuntime {
    /// Headset with no devices tracked yet
    pub fn new() -> Self {
        Self {
            initialized: false,
            fail_initialize: None,
            render_size: Extent::new(1512, 1680),
            projection: [
                ProjectionRaw::new(-1.3953, 1.2396, -1.4690, 1.4663),
                ProjectionRaw::new(-1.2396, 1.3953, -1.4690, 1.4663),
            ],
            eye_to_head: Self::ipd_offsets(DEFAULT_IPD),
            poses: Vec::new(),
            eye_textures: [None, None],
            tracking_space: TrackingSpace::Seated,
            submissions: Vec::new(),
            wait_count: 0,
            frames_ended: 0,
            recenter_count: 0,
        }
    }

    /// Make `initialize` fail with the given reason
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            fail_initialize: Some(reason.into()),
            ..Self::new()
        }
    }

    pub fn with_render_target_size(mut self, width: u32, height: u32) -> Self {
        self.render_size = Extent::new(width, height);
        self
    }

    pub fn with_projection(mut self, left: ProjectionRaw, right: ProjectionRaw) -> Self {
        self.projection = [left, right];
        self
    }

    pub fn with_ipd(mut self, ipd: f32) -> Self {
        self.eye_to_head = Self::ipd_offsets(ipd);
        self
    }

    /// Supply runtime-owned eye images, as a swapchain-based runtime would
    pub fn with_eye_textures(mut self, left: TextureId, right: TextureId) -> Self {
        self.eye_textures = [Some(left), Some(right)];
        self
    }

    fn ipd_offsets(ipd: f32) -> [Mat34; 2] {
        let half = ipd * 0.5;
        [
            Mat34::from_translation(Vec3::new(-half, 0.0, 0.0)),
            Mat34::from_translation(Vec3::new(half, 0.0, 0.0)),
        ]
    }

    /// Clear every scripted pose
    pub fn clear_poses(&mut self) {
        self.poses.clear();
    }

    /// Script an arbitrary device pose
    pub fn push_pose(&mut self, pose: TrackedDevicePose) {
        self.poses.push(pose);
    }

    /// Replace the HMD pose. `orientation` is read as engine angles.
    pub fn set_hmd_pose(&mut self, orientation: Angles, position: Vec3) {
        let q = Quat::from_tracking_angles(orientation);
        let pose = TrackedDevicePose::hmd(Mat34::from_rotation_translation(q, position));
        self.replace(|p| p.class == crate::DeviceClass::Hmd, pose);
    }

    /// Replace the pose of the controller holding `role`
    pub fn set_controller_pose(&mut self, role: ControllerRole, orientation: Angles, position: Vec3) {
        let q = Quat::from_tracking_angles(orientation);
        let pose = TrackedDevicePose::controller(role, Mat34::from_rotation_translation(q, position));
        self.replace(|p| p.class == crate::DeviceClass::Controller && p.role == role, pose);
    }

    /// Flag every scripted pose as lost
    pub fn lose_tracking(&mut self) {
        for pose in &mut self.poses {
            pose.valid = false;
        }
    }

    fn replace(&mut self, matches: impl Fn(&TrackedDevicePose) -> bool, pose: TrackedDevicePose) {
        match self.poses.iter_mut().find(|p| matches(p)) {
            Some(slot) => *slot = pose,
            None => self.poses.push(pose),
        }
    }

    pub fn submissions(&self) -> &[(Eye, EyeTexture)] {
        &self.submissions
    }

    pub fn take_submissions(&mut self) -> Vec<(Eye, EyeTexture)> {
        std::mem::take(&mut self.submissions)
    }

    pub fn wait_count(&self) -> u64 {
        self.wait_count
    }

    pub fn frames_ended(&self) -> u64 {
        self.frames_ended
    }

    pub fn recenter_count(&self) -> u32 {
        self.recenter_count
    }

    pub fn tracking_space(&self) -> TrackingSpace {
        self.tracking_space
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(RuntimeError::NotInitialized)
        }
    }
}

impl HmdRuntime for SimulatedRuntime {
    fn name(&self) -> &str {
        "simulated"
    }

    fn initialize(&mut self) -> Result<()> {
        if let Some(reason) = &self.fail_initialize {
            return Err(RuntimeError::Unavailable(reason.clone()));
        }
        self.initialized = true;
        log::debug!("Simulated HMD runtime initialized ({}x{})", self.render_size.width, self.render_size.height);
        Ok(())
    }

    fn shutdown(&mut self) {
        self.initialized = false;
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn recommended_render_target_size(&self) -> Extent {
        self.render_size
    }

    fn projection_raw(&self, eye: Eye) -> ProjectionRaw {
        self.projection[eye.index()]
    }

    fn eye_to_head(&self, eye: Eye) -> Mat34 {
        self.eye_to_head[eye.index()]
    }

    fn wait_get_poses(&mut self, poses: &mut Vec<TrackedDevicePose>) -> Result<()> {
        self.ensure_initialized()?;
        self.wait_count += 1;
        poses.clear();
        poses.extend_from_slice(&self.poses);
        Ok(())
    }

    fn acquire_eye_texture(&mut self, eye: Eye) -> Result<Option<TextureId>> {
        Ok(self.eye_textures[eye.index()])
    }

    fn submit(&mut self, eye: Eye, texture: &EyeTexture) -> Result<()> {
        self.ensure_initialized()?;
        self.submissions.push((eye, *texture));
        Ok(())
    }

    fn end_frame(&mut self) -> Result<()> {
        self.ensure_initialized()?;
        self.frames_ended += 1;
        Ok(())
    }

    fn set_tracking_space(&mut self, space: TrackingSpace) -> Result<()> {
        self.tracking_space = space;
        Ok(())
    }

    fn reset_seated_zero_pose(&mut self) -> Result<()> {
        self.ensure_initialized()?;
        self.recenter_count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DeviceClass;

    #[test]
    fn test_failing_initialize() {
        let mut rt = SimulatedRuntime::failing("no headset");
        assert!(matches!(rt.initialize(), Err(RuntimeError::Unavailable(_))));
        assert!(!rt.is_initialized());
    }

    #[test]
    fn test_wait_requires_initialize() {
        let mut rt = SimulatedRuntime::new();
        let mut poses = Vec::new();
        assert!(matches!(rt.wait_get_poses(&mut poses), Err(RuntimeError::NotInitialized)));
        rt.initialize().unwrap();
        rt.wait_get_poses(&mut poses).unwrap();
        assert!(poses.is_empty());
        assert_eq!(rt.wait_count(), 1);
    }

    #[test]
    fn test_set_pose_replaces_existing() {
        let mut rt = SimulatedRuntime::new();
        rt.initialize().unwrap();
        rt.set_hmd_pose(Angles::ZERO, Vec3::ZERO);
        rt.set_hmd_pose(Angles::new(0.0, 10.0, 0.0), Vec3::Y);
        rt.set_controller_pose(ControllerRole::LeftHand, Angles::ZERO, Vec3::ZERO);
        rt.set_controller_pose(ControllerRole::RightHand, Angles::ZERO, Vec3::ZERO);
        rt.set_controller_pose(ControllerRole::RightHand, Angles::ZERO, Vec3::X);

        let mut poses = vec![TrackedDevicePose::hmd(Mat34::IDENTITY)];
        rt.wait_get_poses(&mut poses).unwrap();
        assert_eq!(poses.len(), 3);
        assert_eq!(poses.iter().filter(|p| p.class == DeviceClass::Hmd).count(), 1);
        assert_eq!(poses[0].device_to_tracking.translation(), Vec3::Y);
    }

    #[test]
    fn test_lose_tracking() {
        let mut rt = SimulatedRuntime::new();
        rt.initialize().unwrap();
        rt.set_hmd_pose(Angles::ZERO, Vec3::ZERO);
        rt.lose_tracking();
        let mut poses = Vec::new();
        rt.wait_get_poses(&mut poses).unwrap();
        assert!(poses.iter().all(|p| !p.valid));
    }

    #[test]
    fn test_eye_offsets_follow_ipd() {
        let rt = SimulatedRuntime::new().with_ipd(0.064);
        assert_eq!(rt.eye_to_head(Eye::Left).translation().x, -0.032);
        assert_eq!(rt.eye_to_head(Eye::Right).translation().x, 0.032);
    }

    #[test]
    fn test_records_submissions() {
        let mut rt = SimulatedRuntime::new();
        rt.initialize().unwrap();
        rt.submit(Eye::Left, &EyeTexture::gamma(TextureId(3))).unwrap();
        rt.submit(Eye::Right, &EyeTexture::gamma(TextureId(4))).unwrap();
        rt.reset_seated_zero_pose().unwrap();
        assert_eq!(rt.submissions().len(), 2);
        assert_eq!(rt.take_submissions()[1].0, Eye::Right);
        assert!(rt.submissions().is_empty());
        assert_eq!(rt.recenter_count(), 1);
    }
}
