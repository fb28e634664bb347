//! OpenXR runtime adapter
//!
//! Maps the OpenXR frame loop onto [`HmdRuntime`]:
//!
//! | HmdRuntime               | OpenXR                                                   |
//! |--------------------------|----------------------------------------------------------|
//! | `wait_get_poses`         | poll events, `xrWaitFrame`, `xrBeginFrame`, locate spaces |
//! | `acquire_eye_texture`    | acquire + wait a swapchain image                         |
//! | `submit`                 | release the swapchain image                              |
//! | `end_frame`              | `xrEndFrame` with one projection layer                   |
//! | `reset_seated_zero_pose` | rebase the LOCAL space on the current head yaw           |
//!
//! The OpenGL graphics binding is supplied by the caller, since the context
//! belongs to the engine's window.

use crate::error::{Result, RuntimeError};
use crate::runtime::HmdRuntime;
use crate::types::{
    ControllerRole, Extent, Eye, EyeTexture, ProjectionRaw, TextureId, TrackedDevicePose, TrackingSpace,
};
use hmd_math::{Mat34, Quat, Vec3};
use openxr as xr;

const VIEW_TYPE: xr::ViewConfigurationType = xr::ViewConfigurationType::PRIMARY_STEREO;

/// GL_SRGB8_ALPHA8
const DEFAULT_COLOR_FORMAT: u32 = 0x8C43;

/// OpenXR adapter configuration
#[derive(Debug, Clone)]
pub struct OpenXrConfig {
    pub application_name: String,
    pub application_version: u32,
    pub engine_name: String,
    pub engine_version: u32,
    /// GL internal format for eye swapchains
    pub color_format: u32,
}

impl Default for OpenXrConfig {
    fn default() -> Self {
        Self {
            application_name: "hmd_stereo".to_string(),
            application_version: 1,
            engine_name: "hmd_stereo".to_string(),
            engine_version: 1,
            color_format: DEFAULT_COLOR_FORMAT,
        }
    }
}

struct EyeSwapchain {
    handle: xr::Swapchain<xr::OpenGL>,
    images: Vec<u32>,
    acquired: bool,
}

struct HandInput {
    action_set: xr::ActionSet,
    _grip_pose: xr::Action<xr::Posef>,
    grip_spaces: [xr::Space; 2],
}

struct FrameState {
    display_time: xr::Time,
    should_render: bool,
    views: Vec<xr::View>,
}

/// OpenXR-backed HMD runtime
pub struct OpenXrRuntime {
    config: OpenXrConfig,
    graphics: xr::opengl::SessionCreateInfo,

    instance: Option<xr::Instance>,
    system: Option<xr::SystemId>,
    session: Option<xr::Session<xr::OpenGL>>,
    frame_waiter: Option<xr::FrameWaiter>,
    frame_stream: Option<xr::FrameStream<xr::OpenGL>>,
    blend_mode: xr::EnvironmentBlendMode,

    view_space: Option<xr::Space>,
    seated_space: Option<xr::Space>,
    stage_space: Option<xr::Space>,
    tracking_space: TrackingSpace,

    swapchains: Vec<EyeSwapchain>,
    hands: Option<HandInput>,

    render_size: Extent,
    projection: [ProjectionRaw; 2],
    eye_to_head: [Mat34; 2],

    session_running: bool,
    frame: Option<FrameState>,
    last_display_time: xr::Time,
}

impl OpenXrRuntime {
    /// # Safety
    ///
    /// `graphics` must describe a live OpenGL context that stays current on
    /// the calling thread for every call made on this runtime.
    pub unsafe fn new(graphics: xr::opengl::SessionCreateInfo) -> Self {
        Self::with_config(graphics, OpenXrConfig::default())
    }

    /// # Safety
    ///
    /// See [`OpenXrRuntime::new`].
    pub unsafe fn with_config(graphics: xr::opengl::SessionCreateInfo, config: OpenXrConfig) -> Self {
        let half_ipd = 0.0315;
        Self {
            config,
            graphics,
            instance: None,
            system: None,
            session: None,
            frame_waiter: None,
            frame_stream: None,
            blend_mode: xr::EnvironmentBlendMode::OPAQUE,
            view_space: None,
            seated_space: None,
            stage_space: None,
            tracking_space: TrackingSpace::Seated,
            swapchains: Vec::new(),
            hands: None,
            render_size: Extent::default(),
            projection: [ProjectionRaw::new(-1.0, 1.0, -1.0, 1.0); 2],
            eye_to_head: [
                Mat34::from_translation(Vec3::new(-half_ipd, 0.0, 0.0)),
                Mat34::from_translation(Vec3::new(half_ipd, 0.0, 0.0)),
            ],
            session_running: false,
            frame: None,
            last_display_time: xr::Time::from_nanos(0),
        }
    }

    fn backend_err(context: &str, e: impl std::fmt::Debug) -> RuntimeError {
        RuntimeError::Backend(format!("{}: {:?}", context, e))
    }

    fn create_instance(&mut self) -> Result<()> {
        let entry = unsafe { xr::Entry::load() }
            .map_err(|e| RuntimeError::Unavailable(format!("Failed to load OpenXR loader: {:?}", e)))?;

        let available = entry
            .enumerate_extensions()
            .map_err(|e| Self::backend_err("Failed to enumerate extensions", e))?;
        if !available.khr_opengl_enable {
            return Err(RuntimeError::Unsupported("XR_KHR_opengl_enable".into()));
        }

        let mut extensions = xr::ExtensionSet::default();
        extensions.khr_opengl_enable = true;

        let instance = entry
            .create_instance(
                &xr::ApplicationInfo {
                    application_name: &self.config.application_name,
                    application_version: self.config.application_version,
                    engine_name: &self.config.engine_name,
                    engine_version: self.config.engine_version,
                    api_version: xr::Version::new(1, 0, 0),
                },
                &extensions,
                &[],
            )
            .map_err(|e| RuntimeError::Unavailable(format!("Failed to create instance: {:?}", e)))?;

        if let Ok(props) = instance.properties() {
            log::info!("OpenXR Runtime: {} version {}", props.runtime_name, props.runtime_version);
        }

        self.instance = Some(instance);
        Ok(())
    }

    fn discover_system(&mut self) -> Result<()> {
        let instance = self.instance.as_ref().ok_or(RuntimeError::NotInitialized)?;

        let system = instance
            .system(xr::FormFactor::HEAD_MOUNTED_DISPLAY)
            .map_err(|_| RuntimeError::NoHmd)?;

        let views = instance
            .enumerate_view_configuration_views(system, VIEW_TYPE)
            .map_err(|e| Self::backend_err("Failed to enumerate view configurations", e))?;
        let first = views
            .first()
            .ok_or_else(|| RuntimeError::Unsupported("stereo view configuration".into()))?;
        self.render_size = Extent::new(first.recommended_image_rect_width, first.recommended_image_rect_height);
        log::info!(
            "Eye recommended resolution: {}x{}",
            self.render_size.width,
            self.render_size.height
        );

        self.blend_mode = instance
            .enumerate_environment_blend_modes(system, VIEW_TYPE)
            .ok()
            .and_then(|modes| modes.first().copied())
            .unwrap_or(xr::EnvironmentBlendMode::OPAQUE);

        // Required before session creation
        instance
            .graphics_requirements::<xr::OpenGL>(system)
            .map_err(|e| Self::backend_err("Failed to query OpenGL requirements", e))?;

        self.system = Some(system);
        Ok(())
    }

    fn create_session(&mut self) -> Result<()> {
        let instance = self.instance.as_ref().ok_or(RuntimeError::NotInitialized)?;
        let system = self.system.ok_or(RuntimeError::NotInitialized)?;

        let (session, frame_waiter, frame_stream) = unsafe {
            instance
                .create_session::<xr::OpenGL>(system, &self.graphics)
                .map_err(|e| Self::backend_err("Failed to create session", e))?
        };

        let view_space = session
            .create_reference_space(xr::ReferenceSpaceType::VIEW, xr::Posef::IDENTITY)
            .map_err(|e| Self::backend_err("Failed to create view space", e))?;
        let seated_space = session
            .create_reference_space(xr::ReferenceSpaceType::LOCAL, xr::Posef::IDENTITY)
            .map_err(|e| Self::backend_err("Failed to create local space", e))?;
        let stage_space = match session.create_reference_space(xr::ReferenceSpaceType::STAGE, xr::Posef::IDENTITY) {
            Ok(space) => Some(space),
            Err(e) => {
                log::warn!("STAGE space not available: {:?}", e);
                None
            }
        };

        let mut swapchains = Vec::with_capacity(2);
        for _ in Eye::BOTH {
            let handle = session
                .create_swapchain(&xr::SwapchainCreateInfo {
                    create_flags: xr::SwapchainCreateFlags::EMPTY,
                    usage_flags: xr::SwapchainUsageFlags::COLOR_ATTACHMENT | xr::SwapchainUsageFlags::SAMPLED,
                    format: self.config.color_format,
                    sample_count: 1,
                    width: self.render_size.width,
                    height: self.render_size.height,
                    face_count: 1,
                    array_size: 1,
                    mip_count: 1,
                })
                .map_err(|e| Self::backend_err("Failed to create swapchain", e))?;
            let images = handle
                .enumerate_images()
                .map_err(|e| Self::backend_err("Failed to enumerate swapchain images", e))?;
            swapchains.push(EyeSwapchain {
                handle,
                images,
                acquired: false,
            });
        }

        self.hands = Some(Self::create_hand_input(instance, &session)?);
        self.view_space = Some(view_space);
        self.seated_space = Some(seated_space);
        self.stage_space = stage_space;
        self.swapchains = swapchains;
        self.frame_waiter = Some(frame_waiter);
        self.frame_stream = Some(frame_stream);
        self.session = Some(session);
        Ok(())
    }

    fn create_hand_input(instance: &xr::Instance, session: &xr::Session<xr::OpenGL>) -> Result<HandInput> {
        let path = |p: &str| {
            instance
                .string_to_path(p)
                .map_err(|e| Self::backend_err("Failed to create path", e))
        };
        let hands = [path("/user/hand/left")?, path("/user/hand/right")?];

        let action_set = instance
            .create_action_set("tracking", "Tracking", 0)
            .map_err(|e| Self::backend_err("Failed to create action set", e))?;
        let grip_pose = action_set
            .create_action::<xr::Posef>("grip_pose", "Grip Pose", &hands)
            .map_err(|e| Self::backend_err("Failed to create action", e))?;

        for profile in [
            "/interaction_profiles/valve/index_controller",
            "/interaction_profiles/htc/vive_controller",
            "/interaction_profiles/oculus/touch_controller",
            "/interaction_profiles/khr/simple_controller",
        ] {
            let bindings = [
                xr::Binding::new(&grip_pose, path("/user/hand/left/input/grip/pose")?),
                xr::Binding::new(&grip_pose, path("/user/hand/right/input/grip/pose")?),
            ];
            if let Err(e) = instance.suggest_interaction_profile_bindings(path(profile)?, &bindings) {
                log::debug!("Bindings rejected for {}: {:?}", profile, e);
            }
        }

        session
            .attach_action_sets(&[&action_set])
            .map_err(|e| Self::backend_err("Failed to attach action sets", e))?;

        let space = |hand: xr::Path| {
            grip_pose
                .create_space(session.clone(), hand, xr::Posef::IDENTITY)
                .map_err(|e| Self::backend_err("Failed to create hand space", e))
        };
        let grip_spaces = [space(hands[0])?, space(hands[1])?];

        Ok(HandInput {
            action_set,
            _grip_pose: grip_pose,
            grip_spaces,
        })
    }

    fn poll_events(&mut self) -> Result<()> {
        let instance = self.instance.as_ref().ok_or(RuntimeError::NotInitialized)?;
        let mut buffer = xr::EventDataBuffer::new();

        while let Some(event) = instance
            .poll_event(&mut buffer)
            .map_err(|e| Self::backend_err("Failed to poll events", e))?
        {
            match event {
                xr::Event::SessionStateChanged(change) => {
                    log::info!("OpenXR session state: {:?}", change.state());
                    let session = self.session.as_ref().ok_or(RuntimeError::NotInitialized)?;
                    match change.state() {
                        xr::SessionState::READY => {
                            session
                                .begin(VIEW_TYPE)
                                .map_err(|e| Self::backend_err("Failed to begin session", e))?;
                            self.session_running = true;
                        }
                        xr::SessionState::STOPPING => {
                            session
                                .end()
                                .map_err(|e| Self::backend_err("Failed to end session", e))?;
                            self.session_running = false;
                        }
                        xr::SessionState::EXITING | xr::SessionState::LOSS_PENDING => {
                            self.session_running = false;
                            return Err(RuntimeError::Unavailable("OpenXR session lost".into()));
                        }
                        _ => {}
                    }
                }
                xr::Event::InstanceLossPending(_) => {
                    log::warn!("OpenXR instance loss pending");
                    self.session_running = false;
                    return Err(RuntimeError::Unavailable("OpenXR instance lost".into()));
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn locate(space: &xr::Space, base: &xr::Space, time: xr::Time) -> Option<(Mat34, bool)> {
        let location = space.locate(base, time).ok()?;
        let valid = location.location_flags.contains(
            xr::SpaceLocationFlags::ORIENTATION_VALID | xr::SpaceLocationFlags::POSITION_VALID,
        );
        Some((pose_to_mat34(&location.pose), valid))
    }

    fn collect_poses(&mut self, time: xr::Time, poses: &mut Vec<TrackedDevicePose>) -> Result<()> {
        let session = self.session.as_ref().ok_or(RuntimeError::NotInitialized)?;
        let view_space = self.view_space.as_ref().ok_or(RuntimeError::NotInitialized)?;
        let base = base_space(self.tracking_space, &self.seated_space, &self.stage_space)
            .ok_or(RuntimeError::NotInitialized)?;

        // Eye poses relative to the head give the eye-to-head offsets
        let (_, head_views) = session
            .locate_views(VIEW_TYPE, time, view_space)
            .map_err(|e| RuntimeError::Tracking(format!("Failed to locate views: {:?}", e)))?;
        for (i, view) in head_views.iter().take(2).enumerate() {
            self.eye_to_head[i] = pose_to_mat34(&view.pose);
            self.projection[i] = fov_to_raw(&view.fov);
        }

        let (_, views) = session
            .locate_views(VIEW_TYPE, time, base)
            .map_err(|e| RuntimeError::Tracking(format!("Failed to locate views: {:?}", e)))?;
        if let Some(frame) = self.frame.as_mut() {
            frame.views = views;
        }

        if let Some((m, valid)) = Self::locate(view_space, base, time) {
            let pose = TrackedDevicePose::hmd(m);
            poses.push(if valid { pose } else { pose.invalid() });
        }

        if let Some(hands) = &self.hands {
            session
                .sync_actions(&[xr::ActiveActionSet::new(&hands.action_set)])
                .map_err(|e| RuntimeError::Tracking(format!("Failed to sync actions: {:?}", e)))?;
            let roles = [ControllerRole::LeftHand, ControllerRole::RightHand];
            for (space, role) in hands.grip_spaces.iter().zip(roles) {
                if let Some((m, valid)) = Self::locate(space, base, time) {
                    let pose = TrackedDevicePose::controller(role, m);
                    poses.push(if valid { pose } else { pose.invalid() });
                }
            }
        }
        Ok(())
    }
}

impl HmdRuntime for OpenXrRuntime {
    fn name(&self) -> &str {
        "OpenXR"
    }

    fn initialize(&mut self) -> Result<()> {
        log::info!("Initializing OpenXR runtime...");
        let result = self
            .create_instance()
            .and_then(|_| self.discover_system())
            .and_then(|_| self.create_session());
        if result.is_err() {
            self.shutdown();
        }
        result
    }

    fn shutdown(&mut self) {
        if self.instance.is_none() {
            return;
        }
        if self.session_running {
            if let Some(session) = &self.session {
                let _ = session.request_exit();
            }
        }
        self.frame = None;
        self.hands = None;
        self.swapchains.clear();
        self.view_space = None;
        self.seated_space = None;
        self.stage_space = None;
        self.frame_stream = None;
        self.frame_waiter = None;
        self.session = None;
        self.system = None;
        self.instance = None;
        self.session_running = false;
        log::info!("OpenXR runtime shut down");
    }

    fn is_initialized(&self) -> bool {
        self.session.is_some()
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
        poses.clear();
        self.poll_events()?;
        if !self.session_running {
            return Ok(());
        }

        let waiter = self.frame_waiter.as_mut().ok_or(RuntimeError::NotInitialized)?;
        let state = waiter
            .wait()
            .map_err(|e| Self::backend_err("Failed to wait for frame", e))?;
        self.frame_stream
            .as_mut()
            .ok_or(RuntimeError::NotInitialized)?
            .begin()
            .map_err(|e| Self::backend_err("Failed to begin frame", e))?;

        self.last_display_time = state.predicted_display_time;
        self.frame = Some(FrameState {
            display_time: state.predicted_display_time,
            should_render: state.should_render,
            views: Vec::new(),
        });

        self.collect_poses(state.predicted_display_time, poses)
    }

    fn acquire_eye_texture(&mut self, eye: Eye) -> Result<Option<TextureId>> {
        let rendering = self.frame.as_ref().map_or(false, |f| f.should_render);
        let Some(swapchain) = self.swapchains.get_mut(eye.index()).filter(|_| rendering) else {
            return Ok(None);
        };

        let index = swapchain
            .handle
            .acquire_image()
            .map_err(|e| Self::backend_err("Failed to acquire swapchain image", e))?;
        swapchain
            .handle
            .wait_image(xr::Duration::INFINITE)
            .map_err(|e| Self::backend_err("Failed to wait for swapchain image", e))?;
        swapchain.acquired = true;
        Ok(swapchain.images.get(index as usize).map(|&name| TextureId(name)))
    }

    fn submit(&mut self, eye: Eye, _texture: &EyeTexture) -> Result<()> {
        if let Some(swapchain) = self.swapchains.get_mut(eye.index()) {
            if swapchain.acquired {
                swapchain.acquired = false;
                swapchain.handle.release_image().map_err(|e| RuntimeError::Submit {
                    eye,
                    reason: format!("{:?}", e),
                })?;
            }
        }
        Ok(())
    }

    fn end_frame(&mut self) -> Result<()> {
        let Some(frame) = self.frame.take() else {
            return Ok(());
        };
        let stream = self.frame_stream.as_mut().ok_or(RuntimeError::NotInitialized)?;

        let base = base_space(self.tracking_space, &self.seated_space, &self.stage_space);

        let layer_ready = frame.should_render && frame.views.len() >= 2 && self.swapchains.len() >= 2;
        match base.filter(|_| layer_ready) {
            Some(base) => {
                let rect = xr::Rect2Di {
                    offset: xr::Offset2Di { x: 0, y: 0 },
                    extent: xr::Extent2Di {
                        width: self.render_size.width as i32,
                        height: self.render_size.height as i32,
                    },
                };
                let views = [0, 1].map(|i| {
                    xr::CompositionLayerProjectionView::new()
                        .pose(frame.views[i].pose)
                        .fov(frame.views[i].fov)
                        .sub_image(
                            xr::SwapchainSubImage::new()
                                .swapchain(&self.swapchains[i].handle)
                                .image_array_index(0)
                                .image_rect(rect),
                        )
                });
                stream
                    .end(
                        frame.display_time,
                        self.blend_mode,
                        &[&xr::CompositionLayerProjection::new().space(base).views(&views)],
                    )
                    .map_err(|e| Self::backend_err("Failed to end frame", e))
            }
            None => stream
                .end(frame.display_time, self.blend_mode, &[])
                .map_err(|e| Self::backend_err("Failed to end frame", e)),
        }
    }

    fn set_tracking_space(&mut self, space: TrackingSpace) -> Result<()> {
        match space {
            TrackingSpace::Raw => Err(RuntimeError::Unsupported("raw tracking space".into())),
            TrackingSpace::Standing if self.stage_space.is_none() && self.session.is_some() => {
                Err(RuntimeError::Unsupported("STAGE reference space".into()))
            }
            _ => {
                self.tracking_space = space;
                Ok(())
            }
        }
    }

    fn reset_seated_zero_pose(&mut self) -> Result<()> {
        let session = self.session.as_ref().ok_or(RuntimeError::NotInitialized)?;
        let view_space = self.view_space.as_ref().ok_or(RuntimeError::NotInitialized)?;

        // Locate the head in the unmodified LOCAL space
        let local = session
            .create_reference_space(xr::ReferenceSpaceType::LOCAL, xr::Posef::IDENTITY)
            .map_err(|e| Self::backend_err("Failed to create local space", e))?;
        let Some((head, true)) = Self::locate(view_space, &local, self.last_display_time) else {
            // Nothing to recenter on yet
            self.seated_space = Some(local);
            return Ok(());
        };

        let yaw = head.rotation().to_tracking_angles().yaw;
        let q = Quat::from_rotation_y(hmd_math::radians(yaw));
        let p = head.translation();
        let origin = xr::Posef {
            orientation: xr::Quaternionf { x: q.x, y: q.y, z: q.z, w: q.w },
            position: xr::Vector3f { x: p.x, y: p.y, z: p.z },
        };
        self.seated_space = Some(
            session
                .create_reference_space(xr::ReferenceSpaceType::LOCAL, origin)
                .map_err(|e| Self::backend_err("Failed to recenter local space", e))?,
        );
        Ok(())
    }
}

fn base_space<'a>(
    tracking: TrackingSpace,
    seated: &'a Option<xr::Space>,
    stage: &'a Option<xr::Space>,
) -> Option<&'a xr::Space> {
    match tracking {
        TrackingSpace::Standing => stage.as_ref().or(seated.as_ref()),
        TrackingSpace::Seated | TrackingSpace::Raw => seated.as_ref(),
    }
}

fn pose_to_mat34(pose: &xr::Posef) -> Mat34 {
    let o = pose.orientation;
    let p = pose.position;
    Mat34::from_rotation_translation(Quat::new(o.x, o.y, o.z, o.w), Vec3::new(p.x, p.y, p.z))
}

/// OpenXR angles are signed radians; `angle_up` is positive upward
fn fov_to_raw(fov: &xr::Fovf) -> ProjectionRaw {
    ProjectionRaw::new(
        fov.angle_left.tan(),
        fov.angle_right.tan(),
        -fov.angle_up.tan(),
        -fov.angle_down.tan(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_fov_to_raw_matches_angles() {
        let fov = xr::Fovf {
            angle_left: -0.8,
            angle_right: 0.7,
            angle_up: 0.75,
            angle_down: -0.85,
        };
        let raw = fov_to_raw(&fov);
        assert_abs_diff_eq!(raw.fov_x(), hmd_math::degrees(1.5), epsilon = 1e-3);
        assert_abs_diff_eq!(raw.fov_y(), hmd_math::degrees(1.6), epsilon = 1e-3);
    }

    #[test]
    fn test_pose_conversion() {
        let pose = xr::Posef {
            orientation: xr::Quaternionf::IDENTITY,
            position: xr::Vector3f { x: 0.1, y: 1.7, z: -0.2 },
        };
        let m = pose_to_mat34(&pose);
        assert_eq!(m.translation(), Vec3::new(0.1, 1.7, -0.2));
        assert_eq!(m.rotation(), Quat::IDENTITY);
    }
}
