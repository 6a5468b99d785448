//! Chart Geometry and Animation
//!
//! Everything needed to decide *what* to draw, kept apart from *when* to
//! draw it:
//!
//! - `projection`: series → viewport points, cubic smoothing
//! - `scene`: points → grid, line and area geometry for a frame
//! - `animation`: reveal and value-transition state machines
//! - `hover`: pointer X → nearest sample with hysteresis
//! - `style`: colours and stroke settings

/// Series to viewport projection and smoothing.
pub mod projection;

/// Frame geometry built from projected points.
pub mod scene;

/// Reveal and transition animation state machines.
pub mod animation;

/// Pointer to sample resolution.
pub mod hover;

/// Chart colours and strokes.
pub mod style;

pub use animation::{
    ChartAnimator, FrameValues, REVEAL_STEP, RevealState, SeriesKey, TRANSITION_DURATION,
    TransitionState,
};
pub use hover::{HOVER_HYSTERESIS_PX, HoverResolver, HoverSample};
pub use projection::{
    CubicSegment, PADDING_RATIO, Point, ValueScale, Viewport, project, smooth_segments,
    visible_count,
};
pub use scene::{ChartScene, build_scene};
pub use style::{ChartStyle, Rgba};

/// Chart construction errors.
///
/// Only programming-invariant violations are raised; degenerate data is
/// handled inline by drawing nothing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChartError {
    /// Viewport width or height is not a positive finite number.
    #[error("invalid viewport dimensions: {width}x{height}")]
    InvalidViewport {
        /// Requested width.
        width: f64,
        /// Requested height.
        height: f64,
    },
}
