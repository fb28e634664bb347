//! World-space crosshair
//!
//! A flat screen-space crosshair is meaningless in a stereo view, so the
//! crosshair is placed in the world along the aim direction and drawn by the
//! engine as a point or a line.

use hmd_math::consts::METERS_TO_UNITS;
use hmd_math::{Angles, Vec3};
use serde::{Deserialize, Serialize};

/// Trace distance for wall and entity hits, engine units
pub const TRACE_DISTANCE: f32 = 4096.0;
/// Largest point size / line width before scaling
pub const MAX_SIZE: f32 = 32.0;
/// Height above the view entity's feet offset the crosshair starts from
pub const EYE_LINE_OFFSET: f32 = 10.0;

/// Crosshair style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrosshairStyle {
    /// Dot at the aim target
    #[default]
    Point,
    /// Laser from the weapon to the first entity hit
    Line,
}

/// Crosshair options
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrosshairConfig {
    pub style: CrosshairStyle,
    /// Fixed distance in meters. Zero or less traces to the first wall.
    pub depth: f32,
    /// Point size or line width, clamped to `0..=32` when drawn
    pub size: f32,
    /// Opacity, clamped to `0..=1` when drawn
    pub alpha: f32,
}

impl Default for CrosshairConfig {
    fn default() -> Self {
        Self {
            style: CrosshairStyle::Point,
            depth: 0.0,
            size: 3.0,
            alpha: 0.25,
        }
    }
}

impl CrosshairConfig {
    pub fn with_style(mut self, style: CrosshairStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_depth(mut self, meters: f32) -> Self {
        self.depth = meters;
        self
    }

    pub fn with_size(mut self, size: f32) -> Self {
        self.size = size;
        self
    }

    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    /// Size after clamping
    pub fn effective_size(&self) -> f32 {
        self.size.clamp(0.0, MAX_SIZE)
    }

    /// Alpha after clamping
    pub fn effective_alpha(&self) -> f32 {
        self.alpha.clamp(0.0, 1.0)
    }
}

/// World collision queries the crosshair needs
pub trait Tracer {
    /// First solid-world impact between `start` and `end`, or `end`
    fn trace_line(&mut self, start: Vec3, end: Vec3) -> Vec3;

    /// First entity or world impact between `start` and `end`, or `end`
    fn trace_to_entity(&mut self, start: Vec3, end: Vec3) -> Vec3;
}

/// Per-frame inputs for placing the crosshair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrosshairInput {
    /// Where the aim ray starts
    pub origin: Vec3,
    pub aim: Angles,
    /// Width of the target being rendered into, pixels
    pub render_width: u32,
    /// Width of the engine's virtual screen, pixels
    pub screen_width: u32,
    /// Engine asked for no crosshair (melee weapon and the like)
    pub suppressed: bool,
}

/// What the engine should draw
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CrosshairPrimitive {
    Point {
        position: Vec3,
        size: f32,
        color: [f32; 4],
    },
    Line {
        start: Vec3,
        end: Vec3,
        width: f32,
        color: [f32; 4],
    },
}

/// Where the aim ray starts.
///
/// With a tracked weapon hand the ray leaves the hand. Otherwise it leaves
/// the view entity, lowered from eye level by `view_height - 10`.
pub fn crosshair_origin(weapon_hand: Option<Vec3>, view_entity_origin: Vec3, view_height: f32) -> Vec3 {
    match weapon_hand {
        Some(hand) => hand,
        None => {
            let mut start = view_entity_origin;
            start.z -= view_height - EYE_LINE_OFFSET;
            start
        }
    }
}

/// Place the crosshair, or `None` if nothing should be drawn
pub fn compute_crosshair(
    config: &CrosshairConfig,
    input: &CrosshairInput,
    tracer: &mut dyn Tracer,
) -> Option<CrosshairPrimitive> {
    if input.suppressed {
        return None;
    }

    let size = config.effective_size();
    let alpha = config.effective_alpha();
    if size <= 0.0 || alpha <= 0.0 {
        return None;
    }

    let scale = if input.screen_width > 0 {
        input.render_width as f32 / input.screen_width as f32
    } else {
        1.0
    };
    let color = [1.0, 0.0, 0.0, alpha];
    let start = input.origin;
    let forward = input.aim.forward();

    let primitive = match config.style {
        CrosshairStyle::Point => {
            let position = if config.depth <= 0.0 {
                tracer.trace_line(start, start.mul_add(TRACE_DISTANCE, forward))
            } else {
                start.mul_add(config.depth * METERS_TO_UNITS, forward)
            };
            CrosshairPrimitive::Point {
                position,
                size: size * scale,
                color,
            }
        }
        CrosshairStyle::Line => {
            let end = tracer.trace_to_entity(start, start.mul_add(TRACE_DISTANCE, forward));
            CrosshairPrimitive::Line {
                start,
                end,
                width: size * scale,
                color,
            }
        }
    };
    Some(primitive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// Wall at a fixed X, entities never hit
    struct WallAt {
        x: f32,
        line_calls: usize,
        entity_calls: usize,
    }

    impl WallAt {
        fn new(x: f32) -> Self {
            Self {
                x,
                line_calls: 0,
                entity_calls: 0,
            }
        }
    }

    impl Tracer for WallAt {
        fn trace_line(&mut self, start: Vec3, end: Vec3) -> Vec3 {
            self.line_calls += 1;
            if end.x <= self.x {
                return end;
            }
            let t = (self.x - start.x) / (end.x - start.x);
            start + (end - start) * t
        }

        fn trace_to_entity(&mut self, start: Vec3, end: Vec3) -> Vec3 {
            self.entity_calls += 1;
            self.trace_line(start, end)
        }
    }

    fn input() -> CrosshairInput {
        CrosshairInput {
            origin: Vec3::new(0.0, 0.0, 32.0),
            aim: Angles::ZERO,
            render_width: 640,
            screen_width: 320,
            suppressed: false,
        }
    }

    #[test]
    fn test_point_traces_to_wall() {
        let mut tracer = WallAt::new(200.0);
        let hit = compute_crosshair(&CrosshairConfig::default(), &input(), &mut tracer);
        match hit {
            Some(CrosshairPrimitive::Point { position, size, color }) => {
                assert_abs_diff_eq!(position.x, 200.0, epsilon = 1e-3);
                assert_eq!(position.z, 32.0);
                assert_eq!(size, 6.0);
                assert_eq!(color, [1.0, 0.0, 0.0, 0.25]);
            }
            other => panic!("expected point, got {:?}", other),
        }
        assert_eq!(tracer.line_calls, 1);
    }

    #[test]
    fn test_point_fixed_depth_skips_trace() {
        let mut tracer = WallAt::new(1.0);
        let config = CrosshairConfig::default().with_depth(2.0);
        let Some(CrosshairPrimitive::Point { position, .. }) = compute_crosshair(&config, &input(), &mut tracer)
        else {
            panic!("expected point");
        };
        assert_abs_diff_eq!(position.x, 2.0 * METERS_TO_UNITS, epsilon = 1e-3);
        assert_eq!(tracer.line_calls, 0);
    }

    #[test]
    fn test_line_traces_to_entity() {
        let mut tracer = WallAt::new(100.0);
        let config = CrosshairConfig::default().with_style(CrosshairStyle::Line).with_size(4.0);
        let Some(CrosshairPrimitive::Line { start, end, width, .. }) =
            compute_crosshair(&config, &input(), &mut tracer)
        else {
            panic!("expected line");
        };
        assert_eq!(start, input().origin);
        assert_abs_diff_eq!(end.x, 100.0, epsilon = 1e-3);
        assert_eq!(width, 8.0);
        assert_eq!(tracer.entity_calls, 1);
    }

    #[test]
    fn test_hidden_when_zero_or_suppressed() {
        let mut tracer = WallAt::new(100.0);
        let none_size = CrosshairConfig::default().with_size(0.0);
        assert!(compute_crosshair(&none_size, &input(), &mut tracer).is_none());

        let none_alpha = CrosshairConfig::default().with_alpha(-1.0);
        assert!(compute_crosshair(&none_alpha, &input(), &mut tracer).is_none());

        let suppressed = CrosshairInput { suppressed: true, ..input() };
        assert!(compute_crosshair(&CrosshairConfig::default(), &suppressed, &mut tracer).is_none());
        assert_eq!(tracer.line_calls, 0);
    }

    #[test]
    fn test_size_and_alpha_clamped() {
        let config = CrosshairConfig::default().with_size(100.0).with_alpha(5.0);
        assert_eq!(config.effective_size(), MAX_SIZE);
        assert_eq!(config.effective_alpha(), 1.0);
    }

    #[test]
    fn test_origin_selection() {
        let hand = Vec3::new(5.0, 6.0, 7.0);
        assert_eq!(crosshair_origin(Some(hand), Vec3::ZERO, 22.0), hand);
        let body = crosshair_origin(None, Vec3::new(1.0, 2.0, 40.0), 22.0);
        assert_eq!(body, Vec3::new(1.0, 2.0, 28.0));
    }

    #[test]
    fn test_config_serde_defaults() {
        let config: CrosshairConfig = serde_json::from_str(r#"{"style":"line"}"#).unwrap();
        assert_eq!(config.style, CrosshairStyle::Line);
        assert_eq!(config.size, 3.0);
        assert_eq!(config.alpha, 0.25);
    }
}
