//! Fullscreen target rectangles and thumbnail-to-fullscreen affine deltas.
//!
//! Everything here is pure: the same inputs always give the same rectangle.

/// A rectangle in device-independent screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScreenRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ScreenRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center_x(&self) -> f64 {
        self.x + self.width / 2.0
    }

    pub fn center_y(&self) -> f64 {
        self.y + self.height / 2.0
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Height over width, the convention used for media aspect ratios.
    pub fn aspect_ratio(&self) -> Option<f64> {
        (self.width > 0.0 && self.height > 0.0).then(|| self.height / self.width)
    }

    pub fn approx_eq(&self, other: &ScreenRect, epsilon: f64) -> bool {
        (self.x - other.x).abs() <= epsilon
            && (self.y - other.y).abs() <= epsilon
            && (self.width - other.width).abs() <= epsilon
            && (self.height - other.height).abs() <= epsilon
    }
}

/// Window size plus the safe-area insets the viewer must respect.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub top_inset: f64,
    pub bottom_inset: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            top_inset: 0.0,
            bottom_inset: 0.0,
        }
    }

    pub fn with_insets(mut self, top: f64, bottom: f64) -> Self {
        self.top_inset = top;
        self.bottom_inset = bottom;
        self
    }
}

/// Computes where a media item of `aspect_ratio` (height / width) sits once
/// fullscreen.
///
/// The width always spans the viewport; only the height follows the ratio.
/// The rectangle is centered vertically inside the safe area, so tall media
/// may extend above the top inset.
pub fn compute_fullscreen_rect(
    aspect_ratio: f64,
    viewport_width: f64,
    viewport_height: f64,
    top_inset: f64,
    bottom_inset: f64,
) -> ScreenRect {
    let ratio = if aspect_ratio.is_finite() && aspect_ratio > 0.0 {
        aspect_ratio
    } else {
        1.0
    };
    let width = viewport_width;
    let height = width * ratio;
    let available = (viewport_height - top_inset - bottom_inset).max(0.0);
    let y = top_inset + (available - height) / 2.0;
    ScreenRect::new(0.0, y, width, height)
}

/// Convenience wrapper over [`compute_fullscreen_rect`].
pub fn fullscreen_rect_for(aspect_ratio: f64, viewport: &Viewport) -> ScreenRect {
    compute_fullscreen_rect(
        aspect_ratio,
        viewport.width,
        viewport.height,
        viewport.top_inset,
        viewport.bottom_inset,
    )
}

/// Affine parameters applied to a fullscreen-sized view around its center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionDelta {
    pub scale_x: f64,
    pub scale_y: f64,
    pub translate_x: f64,
    pub translate_y: f64,
}

impl TransitionDelta {
    pub const IDENTITY: TransitionDelta = TransitionDelta {
        scale_x: 1.0,
        scale_y: 1.0,
        translate_x: 0.0,
        translate_y: 0.0,
    };

    /// Applies the delta to `rect`, scaling around the rectangle's center.
    pub fn apply(&self, rect: &ScreenRect) -> ScreenRect {
        let width = rect.width * self.scale_x;
        let height = rect.height * self.scale_y;
        let cx = rect.center_x() + self.translate_x;
        let cy = rect.center_y() + self.translate_y;
        ScreenRect::new(cx - width / 2.0, cy - height / 2.0, width, height)
    }

    /// The delta that undoes this one.
    pub fn inverse(&self) -> TransitionDelta {
        TransitionDelta {
            scale_x: 1.0 / self.scale_x,
            scale_y: 1.0 / self.scale_y,
            translate_x: -self.translate_x,
            translate_y: -self.translate_y,
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

/// Delta that makes a view laid out at `fullscreen` coincide with `source`.
///
/// This is the start of the mount transition and the end of the unmount one.
/// Degenerate rectangles give the identity so callers fall back to a fade.
pub fn compute_transition_delta(source: &ScreenRect, fullscreen: &ScreenRect) -> TransitionDelta {
    if fullscreen.is_empty() || source.is_empty() {
        return TransitionDelta::IDENTITY;
    }
    TransitionDelta {
        scale_x: source.width / fullscreen.width,
        scale_y: source.height / fullscreen.height,
        translate_x: source.center_x() - fullscreen.center_x(),
        translate_y: source.center_y() - fullscreen.center_y(),
    }
}

/// Cleans up a measured thumbnail rectangle before it is used as a
/// transition source.
///
/// A rect measured at the origin means the thumbnail has no on-screen layout;
/// it is parked just above the viewport when `from_above` (the item precedes
/// the previously focused one), otherwise just below it. Other rects keep
/// their position but never start more than one height above the screen.
pub fn normalize_source_rect(rect: ScreenRect, viewport: &Viewport, from_above: bool) -> ScreenRect {
    if rect.x + rect.y == 0.0 {
        let x = (viewport.width - rect.width) / 2.0;
        let y = if from_above {
            -rect.height
        } else {
            viewport.height
        };
        return ScreenRect::new(x, y, rect.width, rect.height);
    }
    ScreenRect::new(rect.x, rect.y.max(-rect.height), rect.width, rect.height)
}

pub fn lerp(from: f64, to: f64, t: f64) -> f64 {
    from + (to - from) * t
}
