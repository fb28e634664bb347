//! VR session: lifecycle and the per-frame stereo cycle.
//!
//! ```text
//!  update_screen_content
//!    ├─ lazy enable (failure: clear `enabled`, fall back)
//!    ├─ wait_get_poses ──► PoseResolver::resolve
//!    ├─ AimState::resolve ──► ViewState
//!    ├─ for Left, Right:
//!    │     viewport = eye target · bind · attach · clear
//!    │     seed_random(frame_seed(time)) · render_eye · submit
//!    │     restore viewport · unbind
//!    ├─ end_frame
//!    └─ blit left eye to backbuffer, flipped
//! ```

use crate::aim::{AimInput, AimState};
use crate::config::{AimMode, VrConfig};
use crate::error::Result;
use crate::graphics::{create_eye_targets, frame_seed, GraphicsDevice, SceneRenderer, VrEye};
use crate::view::{compose_eye_view, EyeViewInput, ViewState, DEFAULT_VIEW_HEIGHT, NEAR_CLIP};
use hmd_hud::{
    compute_crosshair, crosshair_origin, overlay_transform, status_bar_transform, CrosshairInput, CrosshairPrimitive,
    Tracer,
};
use hmd_math::{Angles, Mat4, Vec3};
use hmd_xr::{
    Eye, EyeTexture, HmdRuntime, PoseResolver, TrackedDevicePose, TrackedState, TrackingSpace, OFF_HAND,
    WEAPON_HAND,
};

/// What happened to a frame handed to [`VrSession::update_screen_content`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Both eyes were rendered and submitted
    Rendered,
    /// VR is inactive; the engine should draw its normal view
    Fallback,
}

impl FrameOutcome {
    pub fn is_rendered(self) -> bool {
        self == FrameOutcome::Rendered
    }
}

/// Per-frame engine values the stereo cycle reads
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInput {
    /// Simulation clock, seconds
    pub time: f64,
    /// Camera origin before eye offsets
    pub view_origin: Vec3,
    /// Origin of the entity the player views from
    pub player_origin: Vec3,
    /// Engine far clip distance
    pub far_clip: f32,
}

/// Stereo rendering session over one HMD runtime
pub struct VrSession<R: HmdRuntime = Box<dyn HmdRuntime>> {
    runtime: R,
    config: VrConfig,
    resolver: PoseResolver,
    aim: AimState,
    eyes: Option<[VrEye; 2]>,
    poses: Vec<TrackedDevicePose>,
    frame_index: u64,
}

impl<R: HmdRuntime> VrSession<R> {
    pub fn new(runtime: R, config: VrConfig) -> Self {
        let mut resolver = PoseResolver::default();
        resolver.set_left_handed(config.left_handed);
        Self {
            runtime,
            config,
            resolver,
            aim: AimState::new(),
            eyes: None,
            poses: Vec::new(),
            frame_index: 0,
        }
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut R {
        &mut self.runtime
    }

    pub fn config(&self) -> &VrConfig {
        &self.config
    }

    /// Mutable options. `enabled` is better changed with [`Self::set_enabled`].
    pub fn config_mut(&mut self) -> &mut VrConfig {
        &mut self.config
    }

    /// Runtime and eye targets are up
    pub fn is_active(&self) -> bool {
        self.eyes.is_some()
    }

    pub fn eyes(&self) -> Option<&[VrEye; 2]> {
        self.eyes.as_ref()
    }

    pub fn tracked_state(&self) -> &TrackedState {
        self.resolver.state()
    }

    pub fn aim_state(&self) -> &AimState {
        &self.aim
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Change the enable option. Always tears down first; a failed enable
    /// clears the option again.
    pub fn set_enabled(&mut self, enabled: bool, gfx: &mut dyn GraphicsDevice, view: &mut ViewState) -> Result<()> {
        self.disable(gfx, view);
        self.config.enabled = enabled;
        if !enabled {
            return Ok(());
        }

        if let Err(e) = self.enable(gfx, view) {
            log::error!("Failed to enable VR: {}", e);
            self.config.enabled = false;
            return Err(e);
        }
        Ok(())
    }

    /// Bring up the runtime and eye targets, select seated tracking and
    /// recenter. Does nothing when already active.
    pub fn enable(&mut self, gfx: &mut dyn GraphicsDevice, view: &mut ViewState) -> Result<()> {
        if self.is_active() {
            return Ok(());
        }

        self.runtime.initialize()?;
        log::info!("HMD runtime '{}' initialized", self.runtime.name());

        if let Err(e) = self.create_eyes(gfx) {
            self.runtime.shutdown();
            return Err(e);
        }

        self.resolver.reset();
        self.refresh_eye_to_head();

        if let Err(e) = self.runtime.set_tracking_space(TrackingSpace::Seated) {
            log::warn!("Could not select seated tracking: {}", e);
        }
        self.reset_orientation(view);

        if let Some(eyes) = &self.eyes {
            log::info!(
                "VR enabled: {}x{} per eye, fov {:.1}x{:.1}",
                eyes[0].target.size.width,
                eyes[0].target.size.height,
                eyes[0].fov_x,
                eyes[0].fov_y
            );
        }
        Ok(())
    }

    fn create_eyes(&mut self, gfx: &mut dyn GraphicsDevice) -> Result<()> {
        let size = self.runtime.recommended_render_target_size();
        let projections = [
            self.runtime.projection_raw(Eye::Left),
            self.runtime.projection_raw(Eye::Right),
        ];
        self.eyes = Some(create_eye_targets(gfx, size, projections)?);
        Ok(())
    }

    /// Shut the runtime down, release eye targets and restore the default
    /// view height. Safe to call when inactive.
    pub fn disable(&mut self, gfx: &mut dyn GraphicsDevice, view: &mut ViewState) {
        let Some(eyes) = self.eyes.take() else {
            return;
        };

        self.runtime.shutdown();
        view.view_height = DEFAULT_VIEW_HEIGHT;

        for eye in &eyes {
            gfx.destroy_render_target(&eye.target);
        }
        log::info!("VR disabled");
    }

    /// Disable and clear the enable option
    pub fn shutdown(&mut self, gfx: &mut dyn GraphicsDevice, view: &mut ViewState) {
        self.disable(gfx, view);
        self.config.enabled = false;
    }

    /// Per-frame entry point: resolve poses and aim, then render and
    /// submit both eyes. Never fails; problems degrade to
    /// [`FrameOutcome::Fallback`] or are logged.
    pub fn update_screen_content(
        &mut self,
        gfx: &mut dyn GraphicsDevice,
        scene: &mut dyn SceneRenderer,
        frame: &FrameInput,
        view: &mut ViewState,
    ) -> FrameOutcome {
        if !self.config.enabled {
            return FrameOutcome::Fallback;
        }

        if !self.is_active() {
            if let Err(e) = self.enable(gfx, view) {
                log::error!("VR initialization failed, falling back to desktop view: {}", e);
                self.config.enabled = false;
                return FrameOutcome::Fallback;
            }
        }

        self.update_poses();
        self.update_aim(frame, view);
        self.render_eyes(gfx, scene, frame, view);
        self.frame_index += 1;
        FrameOutcome::Rendered
    }

    fn update_poses(&mut self) {
        self.resolver.set_left_handed(self.config.left_handed);

        if let Err(e) = self.runtime.wait_get_poses(&mut self.poses) {
            log::warn!("Waiting for poses failed, holding last state: {}", e);
            return;
        }
        self.refresh_eye_to_head();

        let summary = self.resolver.resolve(&self.poses);
        log::trace!(
            "Frame {}: hmd={} controllers={} invalid={}",
            self.frame_index,
            summary.hmd_updated,
            summary.controllers_updated,
            summary.skipped_invalid
        );
    }

    /// Runtimes may change eye offsets and frustums between frames
    fn refresh_eye_to_head(&mut self) {
        self.resolver
            .set_eye_to_head([self.runtime.eye_to_head(Eye::Left), self.runtime.eye_to_head(Eye::Right)]);
        if let Some(eyes) = &mut self.eyes {
            for vr_eye in eyes.iter_mut() {
                vr_eye.update_fov(&self.runtime.projection_raw(vr_eye.eye));
            }
        }
    }

    fn update_aim(&mut self, frame: &FrameInput, view: &mut ViewState) {
        let state = self.resolver.state();
        let input = AimInput {
            mode: self.config.aim_mode,
            deadzone: self.config.deadzone(),
            gun_angle: self.config.gun_angle,
            head: state.head_angles(),
            controllers: &state.controllers,
            player_origin: frame.player_origin,
        };
        self.aim.resolve(&input, view);
    }

    fn render_eyes(
        &mut self,
        gfx: &mut dyn GraphicsDevice,
        scene: &mut dyn SceneRenderer,
        frame: &FrameInput,
        view: &ViewState,
    ) {
        let Some(eyes) = self.eyes else {
            return;
        };
        let backbuffer = scene.viewport_size();
        let seed = frame_seed(frame.time);

        for vr_eye in &eyes {
            let eye = vr_eye.eye;
            let target = &vr_eye.target;

            scene.set_viewport_size(target.size);
            gfx.bind_render_target(Some(target));

            let color = match self.runtime.acquire_eye_texture(eye) {
                Ok(Some(texture)) => texture,
                Ok(None) => target.color,
                Err(e) => {
                    log::warn!("No runtime image for {:?} eye, using own target: {}", eye, e);
                    target.color
                }
            };
            gfx.attach_color(target, color);
            gfx.set_viewport(target.size.width, target.size.height);
            gfx.clear();

            scene.seed_random(seed);

            let projection = self.runtime.projection_matrix(eye, NEAR_CLIP, frame.far_clip);
            let eye_view = compose_eye_view(&EyeViewInput {
                eye,
                pose: self.resolver.state().eye(eye),
                projection: &projection,
                fov: (vr_eye.fov_x, vr_eye.fov_y),
                view: view.view,
                view_origin: frame.view_origin,
            });
            scene.render_eye(&eye_view);

            if let Err(e) = self.runtime.submit(eye, &EyeTexture::gamma(color)) {
                log::warn!("Submit failed: {}", e);
            }

            scene.set_viewport_size(backbuffer);
            gfx.bind_render_target(None);
        }

        if let Err(e) = self.runtime.end_frame() {
            log::warn!("Ending HMD frame failed: {}", e);
        }

        gfx.blit_to_backbuffer(&eyes[0].target, backbuffer, true);
    }

    /// Add the head orientation to `angles` for HUD and weapon code.
    /// Pitch and yaw are added, roll is replaced.
    pub fn add_orientation_to_view_angles(&self, angles: &mut Angles) {
        let head = self.resolver.state().head_angles();
        angles.pitch += head.pitch;
        angles.yaw += head.yaw;
        angles.roll = head.roll;
    }

    /// Snap view and aim to `angles` and rebase the aim delta, e.g. on
    /// respawn or teleport
    pub fn set_angles(&mut self, view: &mut ViewState, angles: Angles) {
        view.aim = angles;
        view.view = angles;
        self.aim.set_last_aim(angles);
    }

    /// Bring aim back in line with the view and recenter the seated pose
    pub fn reset_orientation(&mut self, view: &mut ViewState) {
        view.aim.yaw = view.view.yaw;
        view.aim.pitch = view.view.pitch;

        if self.is_active() {
            if let Err(e) = self.runtime.reset_seated_zero_pose() {
                log::warn!("Recenter failed: {}", e);
            }
            self.aim.set_last_aim(view.aim);
        }
    }

    pub fn set_tracking_space(&mut self, space: TrackingSpace) -> Result<()> {
        self.runtime.set_tracking_space(space)?;
        Ok(())
    }

    /// Set the deadzone, clamped. Returns the stored value.
    pub fn set_deadzone(&mut self, degrees: f32) -> f32 {
        self.config.set_deadzone(degrees)
    }

    pub fn set_aim_mode(&mut self, mode: AimMode) {
        self.config.aim_mode = mode;
    }

    pub fn set_left_handed(&mut self, left_handed: bool) {
        self.config.left_handed = left_handed;
        self.resolver.set_left_handed(left_handed);
    }

    pub fn set_gun_angle(&mut self, degrees: f32) {
        self.config.gun_angle = degrees;
    }

    /// Place the crosshair for this frame.
    ///
    /// `view_entity_origin` is the viewmodel entity origin. `suppressed`
    /// hides the crosshair, e.g. for melee weapons.
    pub fn crosshair(
        &self,
        view: &ViewState,
        view_entity_origin: Vec3,
        render_width: u32,
        screen_width: u32,
        suppressed: bool,
        tracer: &mut dyn Tracer,
    ) -> Option<CrosshairPrimitive> {
        let weapon_hand = (self.config.aim_mode == AimMode::Controller).then(|| view.hand_positions[WEAPON_HAND]);
        let input = CrosshairInput {
            origin: crosshair_origin(weapon_hand, view_entity_origin, view.view_height),
            aim: view.aim,
            render_width,
            screen_width,
            suppressed,
        };
        compute_crosshair(&self.config.crosshair, &input, tracer)
    }

    /// Model transform for the menu and console canvas
    pub fn overlay_transform(&self, view: &ViewState, view_origin: Vec3) -> Mat4 {
        overlay_transform(view_origin, view.aim, self.config.aim_mode.levels_overlay())
    }

    /// Model transform for the status bar
    pub fn status_bar_transform(&self, view: &ViewState, view_entity_origin: Vec3) -> Mat4 {
        let anchor = if self.config.aim_mode == AimMode::Controller {
            view.hand_positions[OFF_HAND]
        } else {
            view_entity_origin
        };
        status_bar_transform(anchor, view.aim, self.config.aim_mode.levels_overlay())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{GraphicsError, VrError};
    use crate::graphics::RenderTarget;
    use crate::view::EyeView;
    use hmd_xr::{Extent, RuntimeError, SimulatedRuntime, TextureId};

    #[derive(Default)]
    struct NullDevice {
        next: u32,
        live: usize,
    }

    impl GraphicsDevice for NullDevice {
        fn supports_offscreen_targets(&self) -> bool {
            true
        }

        fn create_render_target(&mut self, size: Extent) -> std::result::Result<RenderTarget, GraphicsError> {
            self.next += 3;
            self.live += 1;
            Ok(RenderTarget {
                framebuffer: self.next,
                color: TextureId(self.next + 1),
                depth: TextureId(self.next + 2),
                size,
            })
        }

        fn destroy_render_target(&mut self, _target: &RenderTarget) {
            self.live -= 1;
        }

        fn bind_render_target(&mut self, _target: Option<&RenderTarget>) {}
        fn attach_color(&mut self, _target: &RenderTarget, _color: TextureId) {}
        fn set_viewport(&mut self, _width: u32, _height: u32) {}
        fn clear(&mut self) {}
        fn blit_to_backbuffer(&mut self, _source: &RenderTarget, _dest: Extent, _flip_y: bool) {}
    }

    #[derive(Default)]
    struct CountingScene {
        size: Extent,
        rendered: usize,
    }

    impl SceneRenderer for CountingScene {
        fn viewport_size(&self) -> Extent {
            self.size
        }
        fn set_viewport_size(&mut self, size: Extent) {
            self.size = size;
        }
        fn seed_random(&mut self, _seed: u32) {}
        fn render_eye(&mut self, _view: &EyeView) {
            self.rendered += 1;
        }
    }

    fn frame() -> FrameInput {
        FrameInput {
            time: 1.0,
            view_origin: Vec3::ZERO,
            player_origin: Vec3::ZERO,
            far_clip: 4096.0,
        }
    }

    #[test]
    fn test_disabled_falls_back() {
        let mut session = VrSession::new(SimulatedRuntime::new(), VrConfig::default());
        let mut gfx = NullDevice::default();
        let mut scene = CountingScene::default();
        let mut view = ViewState::default();

        let outcome = session.update_screen_content(&mut gfx, &mut scene, &frame(), &mut view);
        assert_eq!(outcome, FrameOutcome::Fallback);
        assert!(!session.runtime().is_initialized());
        assert_eq!(scene.rendered, 0);
    }

    #[test]
    fn test_set_enabled_failure_reverts_option() {
        let mut session = VrSession::new(SimulatedRuntime::failing("no headset"), VrConfig::default());
        let mut gfx = NullDevice::default();
        let mut view = ViewState::default();

        let err = session.set_enabled(true, &mut gfx, &mut view).unwrap_err();
        assert!(matches!(err, VrError::Runtime(RuntimeError::Unavailable(_))));
        assert!(!session.config().enabled);
        assert!(!session.is_active());
        assert_eq!(gfx.live, 0);
    }

    #[test]
    fn test_enable_disable_cycle() {
        let mut session = VrSession::new(SimulatedRuntime::new(), VrConfig::default());
        let mut gfx = NullDevice::default();
        let mut view = ViewState {
            view: Angles::new(10.0, 45.0, 0.0),
            view_height: 40.0,
            ..ViewState::default()
        };

        session.set_enabled(true, &mut gfx, &mut view).unwrap();
        assert!(session.is_active());
        assert_eq!(gfx.live, 2);
        assert_eq!(session.runtime().tracking_space(), TrackingSpace::Seated);
        assert_eq!(session.runtime().recenter_count(), 1);
        // recenter pulls aim onto the view
        assert_eq!(view.aim, Angles::new(10.0, 45.0, 0.0));
        assert_eq!(session.aim_state().last_aim(), view.aim);

        // re-enabling tears down first
        session.set_enabled(true, &mut gfx, &mut view).unwrap();
        assert_eq!(gfx.live, 2);

        session.set_enabled(false, &mut gfx, &mut view).unwrap();
        assert!(!session.is_active());
        assert!(!session.runtime().is_initialized());
        assert_eq!(gfx.live, 0);
        assert_eq!(view.view_height, DEFAULT_VIEW_HEIGHT);
    }

    #[test]
    fn test_set_angles_rebases_delta() {
        let mut session = VrSession::new(SimulatedRuntime::new(), VrConfig::default());
        let mut view = ViewState::default();
        let angles = Angles::new(5.0, 90.0, 0.0);
        session.set_angles(&mut view, angles);
        assert_eq!(view.view, angles);
        assert_eq!(view.aim, angles);
        assert_eq!(session.aim_state().last_aim(), angles);
    }

    #[test]
    fn test_reset_orientation_inactive_skips_recenter() {
        let mut session = VrSession::new(SimulatedRuntime::new(), VrConfig::default());
        let mut view = ViewState {
            view: Angles::new(3.0, 70.0, 1.0),
            aim: Angles::new(0.0, 10.0, 0.0),
            ..ViewState::default()
        };
        session.reset_orientation(&mut view);
        assert_eq!(view.aim, Angles::new(3.0, 70.0, 0.0));
        assert_eq!(session.runtime().recenter_count(), 0);
        assert_eq!(session.aim_state().last_aim(), Angles::ZERO);
    }

    #[test]
    fn test_add_orientation_replaces_roll() {
        let mut runtime = SimulatedRuntime::new();
        runtime.set_hmd_pose(Angles::new(10.0, 20.0, 5.0), Vec3::new(0.0, 1.6, 0.0));
        let mut session = VrSession::new(runtime, VrConfig::default().with_enabled(true));
        let mut gfx = NullDevice::default();
        let mut scene = CountingScene::default();
        let mut view = ViewState::default();
        session.update_screen_content(&mut gfx, &mut scene, &frame(), &mut view);

        let mut angles = Angles::new(1.0, 2.0, 30.0);
        session.add_orientation_to_view_angles(&mut angles);
        approx::assert_abs_diff_eq!(angles.pitch, 11.0, epsilon = 1e-3);
        approx::assert_abs_diff_eq!(angles.yaw, 22.0, epsilon = 1e-3);
        approx::assert_abs_diff_eq!(angles.roll, 5.0, epsilon = 1e-3);
    }

    #[test]
    fn test_deadzone_and_handedness_setters() {
        let mut session = VrSession::new(SimulatedRuntime::new(), VrConfig::default());
        assert_eq!(session.set_deadzone(85.0), 70.0);
        assert_eq!(session.config().deadzone(), 70.0);
        session.set_left_handed(true);
        assert!(session.config().left_handed);
        session.set_aim_mode(AimMode::Blended);
        session.set_gun_angle(10.0);
        assert_eq!(session.config().aim_mode, AimMode::Blended);
        assert_eq!(session.config().gun_angle, 10.0);
    }

    #[test]
    fn test_boxed_runtime_session() {
        let runtime: Box<dyn HmdRuntime> = Box::new(SimulatedRuntime::new());
        let mut session: VrSession = VrSession::new(runtime, VrConfig::default().with_enabled(true));
        let mut gfx = NullDevice::default();
        let mut scene = CountingScene::default();
        let mut view = ViewState::default();
        let outcome = session.update_screen_content(&mut gfx, &mut scene, &frame(), &mut view);
        assert!(outcome.is_rendered());
        assert_eq!(scene.rendered, 2);
        assert_eq!(session.frame_index(), 1);
    }
}
