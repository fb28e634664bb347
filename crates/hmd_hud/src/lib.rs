//! HMD HUD - World-Space UI Placement
//!
//! Screen-space HUD elements do not work inside a headset, so this crate
//! places them in the world instead.
//!
//! # Features
//!
//! - Crosshair as a traced point or a laser line
//! - Menu and console canvas hung in front of the view
//! - Status bar anchored to the body or the off-hand
//!
//! # Example
//!
//! ```ignore
//! use hmd_hud::prelude::*;
//!
//! let config = CrosshairConfig::default().with_style(CrosshairStyle::Line);
//! let input = CrosshairInput {
//!     origin: crosshair_origin(None, player_origin, view_height),
//!     aim,
//!     render_width: 1512,
//!     screen_width: 320,
//!     suppressed: false,
//! };
//! if let Some(prim) = compute_crosshair(&config, &input, &mut world) {
//!     draw(prim);
//! }
//! ```

pub mod crosshair;
pub mod overlay;

pub mod prelude {
    pub use crate::crosshair::{
        compute_crosshair, crosshair_origin, CrosshairConfig, CrosshairInput, CrosshairPrimitive, CrosshairStyle,
        Tracer,
    };
    pub use crate::overlay::{overlay_transform, status_bar_transform, CANVAS_HEIGHT, CANVAS_WIDTH};
}

pub use prelude::*;
