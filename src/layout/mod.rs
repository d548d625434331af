pub mod geometry;

pub use geometry::{
    compute_fullscreen_rect, compute_transition_delta, fullscreen_rect_for, lerp,
    normalize_source_rect, ScreenRect, TransitionDelta, Viewport,
};
