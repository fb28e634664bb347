//! # hmd_stereo - Stereo Rendering for Head-Mounted Displays
//!
//! Sits between an HMD runtime and a first-person engine's renderer. Once
//! per displayed frame it:
//!
//! 1. reads HMD and controller poses ([`hmd_xr::PoseResolver`])
//! 2. folds head orientation into the game's view and aim angles according
//!    to the active [`AimMode`]
//! 3. renders the scene once per eye into offscreen targets with per-eye
//!    projection and modelview, submits both, and mirrors the left eye to
//!    the desktop
//!
//! Everything runs on the engine's frame thread. Failures never cross the
//! frame boundary: a session that cannot start reports
//! [`FrameOutcome::Fallback`] and the engine draws its normal view.
//!
//! ## Example
//!
//! ```ignore
//! use hmd_stereo::prelude::*;
//!
//! let config = VrConfig::from_json(&std::fs::read_to_string("vr.json")?)?;
//! let mut session = VrSession::new(SimulatedRuntime::new(), config);
//!
//! loop {
//!     let frame = FrameInput { time, view_origin, player_origin, far_clip: 4096.0 };
//!     if !session.update_screen_content(&mut gfx, &mut scene, &frame, &mut view).is_rendered() {
//!         scene.render_desktop();
//!     }
//! }
//! ```

pub mod aim;
pub mod config;
pub mod error;
pub mod graphics;
pub mod session;
pub mod view;

pub use aim::{AimInput, AimState, GUN_OFFSET};
pub use config::{clamp_deadzone, AimMode, VrConfig, DEFAULT_DEADZONE, DEFAULT_GUN_ANGLE, MAX_DEADZONE};
pub use error::{GraphicsError, Result, VrError};
pub use graphics::{create_eye_targets, frame_seed, GraphicsDevice, RenderTarget, SceneRenderer, VrEye};
pub use session::{FrameInput, FrameOutcome, VrSession};
pub use view::{
    compose_eye_view, eye_offset, modelview, projection_from_raw, EyeView, EyeViewInput, ViewState,
    DEFAULT_VIEW_HEIGHT, NEAR_CLIP,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::{AimMode, VrConfig};
    pub use crate::error::{GraphicsError, Result, VrError};
    pub use crate::graphics::{GraphicsDevice, RenderTarget, SceneRenderer};
    pub use crate::session::{FrameInput, FrameOutcome, VrSession};
    pub use crate::view::{EyeView, ViewState};

    pub use hmd_hud::prelude::*;
    pub use hmd_math::prelude::*;
    pub use hmd_xr::prelude::*;
}
