//! # hmd_xr - HMD Runtime Abstraction
//!
//! One capability interface over head-mounted display runtimes, plus the
//! per-frame resolution of tracked-device poses into eye and hand state.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 HmdRuntime                    │
//! │  poses · projection · eye offsets · submit    │
//! │  recommended size · tracking space · recenter │
//! └──────────────────────────────────────────────┘
//!        ▲                         ▲
//!        │                         │
//!  SimulatedRuntime          OpenXrRuntime
//!  (always built)      (feature "openxr-backend")
//!
//!  [TrackedDevicePose] ──► PoseResolver ──► TrackedState
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use hmd_xr::prelude::*;
//!
//! let mut runtime = SimulatedRuntime::new();
//! runtime.initialize()?;
//!
//! let mut resolver = PoseResolver::new([
//!     runtime.eye_to_head(Eye::Left),
//!     runtime.eye_to_head(Eye::Right),
//! ]);
//!
//! let mut poses = Vec::new();
//! runtime.wait_get_poses(&mut poses)?;
//! resolver.resolve(&poses);
//! ```

pub mod error;
pub mod resolver;
pub mod runtime;
pub mod simulated;
pub mod types;

#[cfg(feature = "openxr-backend")]
pub mod openxr_backend;

pub use error::{Result, RuntimeError};
pub use resolver::{
    hand_slot, ControllerState, EyePose, PoseResolver, ResolveSummary, TrackedState, OFF_HAND, WEAPON_HAND,
};
pub use runtime::HmdRuntime;
pub use simulated::SimulatedRuntime;
pub use types::*;

#[cfg(feature = "openxr-backend")]
pub use openxr_backend::{OpenXrConfig, OpenXrRuntime};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{Result, RuntimeError};
    pub use crate::resolver::{PoseResolver, TrackedState, OFF_HAND, WEAPON_HAND};
    pub use crate::runtime::HmdRuntime;
    pub use crate::simulated::SimulatedRuntime;
    pub use crate::types::{
        ControllerRole, DeviceClass, Extent, Eye, EyeTexture, ProjectionRaw, TextureId, TrackedDevicePose,
        TrackingSpace,
    };

    #[cfg(feature = "openxr-backend")]
    pub use crate::openxr_backend::OpenXrRuntime;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boxed_runtime_dispatch() {
        let mut runtime: Box<dyn HmdRuntime> = Box::new(SimulatedRuntime::new());
        assert_eq!(runtime.name(), "simulated");
        assert!(!runtime.is_initialized());
        runtime.initialize().unwrap();
        assert!(runtime.is_initialized());
        assert_eq!(runtime.recommended_render_target_size(), Extent::new(1512, 1680));
        assert_eq!(runtime.acquire_eye_texture(Eye::Left).unwrap(), None);
        runtime.shutdown();
        assert!(!runtime.is_initialized());
    }
}
