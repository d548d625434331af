//! Zoom, pan, dismiss and mount/unmount state for the focused item.
//!
//! The machine owns every animated value the renderer needs and is advanced
//! by `tick`. Gesture handlers run synchronously on the caller's thread; no
//! lock is held and nothing here awaits.
//!
//! Pinch translation keeps the focal point fixed: with `offset_scale` the
//! scale at the first update of a pinch and `origin` the focal point,
//! `translate = prev_translate - (scale - offset_scale) * (origin - center)`.

use tracing::{debug, trace};

use crate::animation::AnimatedValue;
use crate::config::ViewerConfig;
use crate::error::ViewerError;
use crate::gesture::recognizer::{GestureEvent, PanArbiter};
use crate::layout::{lerp, ScreenRect, TransitionDelta};

const SCALE_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Not mounted; the frame shows the source pose.
    Idle,
    TransitioningIn,
    Settled,
    Zoomed,
    TransitioningOut,
}

impl Phase {
    pub fn is_transitioning(self) -> bool {
        matches!(self, Phase::TransitioningIn | Phase::TransitioningOut)
    }
}

/// Plain snapshot of the transform values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformState {
    pub scale: f64,
    pub translate_x: f64,
    pub translate_y: f64,
    pub origin_x: f64,
    pub origin_y: f64,
    pub is_pinching: bool,
    pub is_zoomed: bool,
    pub transition_offset: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformEvent {
    Mounted,
    /// A downward drag was released past the threshold. The owner measures
    /// the thumbnail and calls `begin_unmount`.
    DismissRequested,
    Closed,
    ZoomChanged(bool),
    ChromeToggled,
}

/// Everything the renderer needs for one frame of the focused item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub translate_x: f64,
    pub translate_y: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub border_radius: f64,
    pub content_opacity: f64,
    pub backdrop_opacity: f64,
    pub scroll_enabled: bool,
    pub gestures_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PanMode {
    None,
    Dismiss,
    Reposition,
}

pub struct TransformMachine {
    config: ViewerConfig,
    phase: Phase,
    view: ScreenRect,
    viewport_height: f64,
    /// Pose of the source thumbnail relative to the fullscreen rect. `None`
    /// fades in place.
    source: Option<TransitionDelta>,

    scale: AnimatedValue,
    translate_x: AnimatedValue,
    translate_y: AnimatedValue,
    transition_offset: AnimatedValue,
    backdrop: AnimatedValue,

    origin_x: f64,
    origin_y: f64,
    prev_scale: f64,
    offset_scale: f64,
    prev_translate_x: f64,
    prev_translate_y: f64,
    is_pinching: bool,
    is_zoomed: bool,
    pan: PanMode,
    dismiss_pending: bool,

    events: Vec<TransformEvent>,
}

impl TransformMachine {
    pub fn new(config: ViewerConfig) -> Self {
        Self {
            config,
            phase: Phase::Idle,
            view: ScreenRect::default(),
            viewport_height: 0.0,
            source: None,
            scale: AnimatedValue::new(1.0),
            translate_x: AnimatedValue::new(0.0),
            translate_y: AnimatedValue::new(0.0),
            transition_offset: AnimatedValue::new(0.0),
            backdrop: AnimatedValue::new(0.0),
            origin_x: 0.0,
            origin_y: 0.0,
            prev_scale: 1.0,
            offset_scale: 1.0,
            prev_translate_x: 0.0,
            prev_translate_y: 0.0,
            is_pinching: false,
            is_zoomed: false,
            pan: PanMode::None,
            dismiss_pending: false,
            events: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> TransformState {
        TransformState {
            scale: self.scale.get(),
            translate_x: self.translate_x.get(),
            translate_y: self.translate_y.get(),
            origin_x: self.origin_x,
            origin_y: self.origin_y,
            is_pinching: self.is_pinching,
            is_zoomed: self.is_zoomed,
            transition_offset: self.transition_offset.get(),
        }
    }

    pub fn gestures_enabled(&self) -> bool {
        matches!(self.phase, Phase::Settled | Phase::Zoomed) && !self.dismiss_pending
    }

    /// Whether the pager may scroll. Locked while zoomed, pinching,
    /// dragging to dismiss, or transitioning.
    pub fn scroll_enabled(&self) -> bool {
        self.phase == Phase::Settled
            && !self.dismiss_pending
            && !self.is_pinching
            && self.pan != PanMode::Dismiss
    }

    /// Sets the fullscreen rect of the focused item and the viewport height
    /// used for the dismiss fade. Translation is re-clamped to the new bounds.
    pub fn set_view_size(&mut self, view: ScreenRect, viewport_height: f64) {
        self.view = view;
        self.viewport_height = viewport_height;
        if self.is_zoomed && !self.is_pinching {
            let (tx, ty) = self.clamp_translation(
                self.translate_x.get(),
                self.translate_y.get(),
                self.scale.get(),
            );
            self.translate_x.set(tx);
            self.translate_y.set(ty);
        }
    }

    pub fn begin_mount(&mut self, source: Option<TransitionDelta>) {
        match self.phase {
            Phase::Settled | Phase::Zoomed | Phase::TransitioningIn => {
                trace!(phase = ?self.phase, "Mount already in progress");
                return;
            }
            Phase::TransitioningOut => {
                debug!(error = %ViewerError::AnimationInterrupted, "Mount supersedes unmount");
                self.dismiss_pending = false;
            }
            Phase::Idle => {}
        }

        self.source = source.filter(|d| !d.is_identity());
        self.phase = Phase::TransitioningIn;
        self.transition_offset
            .spring_to(1.0, self.config.transition_spring);
        self.backdrop.spring_to(1.0, self.config.backdrop_spring);
        debug!(has_source = self.source.is_some(), "Mount transition started");
    }

    /// Replaces the source pose of a running transition, e.g. once the true
    /// aspect ratio of the focused item is known.
    pub fn set_source(&mut self, source: Option<TransitionDelta>) {
        if self.phase.is_transitioning() {
            self.source = source.filter(|d| !d.is_identity());
        }
    }

    /// Starts the reverse transition toward `target`, or a fade in place
    /// when the thumbnail could not be measured.
    pub fn begin_unmount(&mut self, target: Option<TransitionDelta>) {
        match self.phase {
            Phase::Idle => return,
            Phase::TransitioningOut => {
                self.source = target;
                return;
            }
            Phase::TransitioningIn => {
                debug!(error = %ViewerError::AnimationInterrupted, "Unmount supersedes mount");
            }
            Phase::Settled | Phase::Zoomed => {}
        }

        self.cancel_gesture_animations();
        self.is_pinching = false;
        self.pan = PanMode::None;
        self.dismiss_pending = false;
        self.source = target;
        self.phase = Phase::TransitioningOut;
        self.transition_offset
            .spring_to(0.0, self.config.transition_spring);
        self.backdrop.spring_to(0.0, self.config.transition_spring);
        debug!(has_target = self.source.is_some(), "Unmount transition started");
    }

    /// Stops every gesture-driven animation where it is. A dismiss drag in
    /// progress springs back.
    pub fn interrupt(&mut self) {
        self.cancel_gesture_animations();
        self.is_pinching = false;
        self.prev_translate_x = self.translate_x.get();
        self.prev_translate_y = self.translate_y.get();
        if self.pan == PanMode::Dismiss {
            self.spring_back();
        }
        self.pan = PanMode::None;
        trace!("Gesture interrupted");
    }

    pub fn handle_gesture(&mut self, event: GestureEvent) -> Vec<TransformEvent> {
        if matches!(event, GestureEvent::Interrupted) {
            self.interrupt();
            return self.take_events();
        }
        if !self.gestures_enabled() {
            trace!(?event, phase = ?self.phase, "Gesture ignored while locked");
            return self.take_events();
        }

        match event {
            GestureEvent::PinchStart { .. } => self.on_pinch_start(),
            GestureEvent::PinchUpdate {
                scale,
                focal_x,
                focal_y,
            } => self.on_pinch_update(scale, focal_x, focal_y),
            GestureEvent::PinchEnd => self.on_pinch_end(),
            GestureEvent::PanStart { .. } => self.on_pan_start(),
            GestureEvent::PanUpdate {
                translation_x,
                translation_y,
                ..
            } => self.on_pan_update(translation_x, translation_y),
            GestureEvent::PanEnd {
                translation_y,
                velocity_y,
                ..
            } => self.on_pan_end(translation_y, velocity_y),
            GestureEvent::PanCancel => {
                if self.pan == PanMode::Dismiss {
                    self.spring_back();
                }
                self.pan = PanMode::None;
            }
            GestureEvent::DoubleTap { x, y } => self.on_double_tap(x, y),
            GestureEvent::Tap { .. } => self.events.push(TransformEvent::ChromeToggled),
            GestureEvent::Interrupted => {}
        }

        self.reconcile_zoom();
        self.take_events()
    }

    pub fn tick(&mut self, dt: std::time::Duration) -> Vec<TransformEvent> {
        self.scale.tick(dt);
        self.translate_x.tick(dt);
        self.translate_y.tick(dt);
        self.backdrop.tick(dt);

        if let Some(settled) = self.transition_offset.tick(dt) {
            match self.phase {
                Phase::TransitioningIn if settled.target >= 1.0 => {
                    self.phase = Phase::Settled;
                    debug!("Mount transition finished");
                    self.events.push(TransformEvent::Mounted);
                }
                Phase::TransitioningOut if settled.target <= 0.0 => {
                    self.reset_values();
                    self.phase = Phase::Idle;
                    debug!("Unmount transition finished");
                    self.events.push(TransformEvent::Closed);
                }
                _ => {}
            }
        }

        self.reconcile_zoom();
        self.take_events()
    }

    pub fn is_animating(&self) -> bool {
        self.scale.is_animating()
            || self.translate_x.is_animating()
            || self.translate_y.is_animating()
            || self.transition_offset.is_animating()
            || self.backdrop.is_animating()
    }

    pub fn frame(&self) -> Frame {
        let scale = self.scale.get();
        let tx = self.translate_x.get();
        let ty = self.translate_y.get();
        let t = self.transition_offset.get();

        let in_transition = matches!(
            self.phase,
            Phase::Idle | Phase::TransitioningIn | Phase::TransitioningOut
        );

        let (translate_x, translate_y, scale_x, scale_y, border_radius, content_opacity) =
            match (in_transition, self.source) {
                (true, Some(delta)) => (
                    lerp(delta.translate_x, tx, t),
                    lerp(delta.translate_y, ty, t),
                    lerp(delta.scale_x, scale, t),
                    lerp(delta.scale_y, scale, t),
                    lerp(self.config.corner_radius, 0.0, t),
                    1.0,
                ),
                (true, None) => (tx, ty, scale, scale, 0.0, t.clamp(0.0, 1.0)),
                (false, _) => (tx, ty, scale, scale, 0.0, 1.0),
            };

        Frame {
            translate_x,
            translate_y,
            scale_x,
            scale_y,
            border_radius,
            content_opacity,
            backdrop_opacity: self.backdrop.get().clamp(0.0, 1.0),
            scroll_enabled: self.scroll_enabled(),
            gestures_enabled: self.gestures_enabled(),
        }
    }

    fn take_events(&mut self) -> Vec<TransformEvent> {
        std::mem::take(&mut self.events)
    }

    fn on_pinch_start(&mut self) {
        if self.pan == PanMode::Dismiss {
            let error = ViewerError::GestureConflict("pinch during dismiss drag".to_string());
            debug!(%error, "Ignoring pinch");
            return;
        }
        self.cancel_gesture_animations();
        self.prev_scale = self.scale.get();
        self.offset_scale = self.prev_scale;
        self.prev_translate_x = self.translate_x.get();
        self.prev_translate_y = self.translate_y.get();
    }

    fn on_pinch_update(&mut self, gesture_scale: f64, focal_x: f64, focal_y: f64) {
        if self.pan == PanMode::Dismiss {
            return;
        }
        if !self.is_pinching {
            self.is_pinching = true;
            self.origin_x = focal_x;
            self.origin_y = focal_y;
            self.prev_translate_x = self.translate_x.get();
            self.prev_translate_y = self.translate_y.get();
            self.offset_scale = self.scale.get();
        }

        let next = (self.prev_scale * gesture_scale)
            .clamp(self.config.min_zoom_scale, self.config.pinch_max_zoom_scale);
        self.scale.set(next);

        let grown = next - self.offset_scale;
        self.translate_x
            .set(self.prev_translate_x - grown * (self.origin_x - self.view.center_x()));
        self.translate_y
            .set(self.prev_translate_y - grown * (self.origin_y - self.view.center_y()));
    }

    fn on_pinch_end(&mut self) {
        if !self.is_pinching {
            return;
        }
        self.is_pinching = false;

        let scale = self.scale.get();
        if scale < self.config.snap_back_scale {
            trace!(scale, "Pinch released below snap-back scale");
            self.reset_zoom();
        } else {
            let (tx, ty) =
                self.clamp_translation(self.translate_x.get(), self.translate_y.get(), scale);
            self.translate_x.timing_to(tx, self.config.timing_duration);
            self.translate_y.timing_to(ty, self.config.timing_duration);
        }
        self.prev_translate_x = self.translate_x.target().unwrap_or(self.translate_x.get());
        self.prev_translate_y = self.translate_y.target().unwrap_or(self.translate_y.get());
    }

    fn on_pan_start(&mut self) {
        if self.is_pinching {
            return;
        }
        if self.is_zoomed {
            self.cancel_gesture_animations();
            self.prev_translate_x = self.translate_x.get();
            self.prev_translate_y = self.translate_y.get();
            self.pan = PanMode::Reposition;
        } else {
            self.translate_y.cancel();
            self.backdrop.cancel();
            self.pan = PanMode::Dismiss;
        }
    }

    fn on_pan_update(&mut self, dx: f64, dy: f64) {
        match self.pan {
            PanMode::Dismiss => {
                self.translate_y.set(dy);
                self.backdrop.set(self.dismiss_opacity(dy));
            }
            PanMode::Reposition => {
                let (tx, ty) = self.clamp_translation(
                    self.prev_translate_x + dx,
                    self.prev_translate_y + dy,
                    self.scale.get(),
                );
                self.translate_x.set(tx);
                self.translate_y.set(ty);
            }
            PanMode::None => {}
        }
    }

    fn on_pan_end(&mut self, translation_y: f64, velocity_y: f64) {
        match self.pan {
            PanMode::Dismiss => {
                if velocity_y > 0.0 || translation_y > self.config.dismiss_distance {
                    debug!(translation_y, velocity_y, "Dismiss committed");
                    self.dismiss_pending = true;
                    self.events.push(TransformEvent::DismissRequested);
                } else {
                    self.spring_back();
                }
            }
            PanMode::Reposition => {
                self.prev_translate_x = self.translate_x.get();
                self.prev_translate_y = self.translate_y.get();
            }
            PanMode::None => {}
        }
        self.pan = PanMode::None;
    }

    fn on_double_tap(&mut self, x: f64, y: f64) {
        self.cancel_gesture_animations();
        if (self.scale.get() - self.config.min_zoom_scale).abs() > SCALE_EPSILON {
            self.reset_zoom();
            return;
        }

        let target = self.config.max_zoom_scale;
        let (tx, ty) = self.clamp_translation(
            -(x - self.view.center_x()) * (target - 1.0),
            -(y - self.view.center_y()) * (target - 1.0),
            target,
        );
        trace!(x, y, tx, ty, "Double tap zoom in");
        let duration = self.config.timing_duration;
        self.scale.timing_to(target, duration);
        self.translate_x.timing_to(tx, duration);
        self.translate_y.timing_to(ty, duration);
        self.prev_translate_x = tx;
        self.prev_translate_y = ty;
    }

    /// Opacity of the backdrop for a dismiss drag of `dy`.
    fn dismiss_opacity(&self, dy: f64) -> f64 {
        let half = self.viewport_height / 2.0;
        if half <= 0.0 {
            return 1.0;
        }
        (1.0 - dy / half).clamp(0.0, 1.0)
    }

    fn spring_back(&mut self) {
        trace!("Dismiss drag springs back");
        self.translate_y.spring_to(0.0, self.config.transition_spring);
        self.backdrop.spring_to(1.0, self.config.transition_spring);
    }

    fn reset_zoom(&mut self) {
        let duration = self.config.timing_duration;
        self.scale.timing_to(self.config.min_zoom_scale, duration);
        self.translate_x.timing_to(0.0, duration);
        self.translate_y.timing_to(0.0, duration);
        self.prev_translate_x = 0.0;
        self.prev_translate_y = 0.0;
    }

    fn reset_values(&mut self) {
        self.scale.set(self.config.min_zoom_scale);
        self.translate_x.set(0.0);
        self.translate_y.set(0.0);
        self.prev_scale = self.config.min_zoom_scale;
        self.offset_scale = self.config.min_zoom_scale;
        self.prev_translate_x = 0.0;
        self.prev_translate_y = 0.0;
        self.is_pinching = false;
        self.pan = PanMode::None;
        self.dismiss_pending = false;
    }

    fn cancel_gesture_animations(&mut self) {
        self.scale.cancel();
        self.translate_x.cancel();
        self.translate_y.cancel();
    }

    /// Keeps the scaled content covering the view on both axes.
    fn clamp_translation(&self, tx: f64, ty: f64, scale: f64) -> (f64, f64) {
        let max_x = ((self.view.width / 2.0) * scale - self.view.width / 2.0).max(0.0);
        let max_y = ((self.view.height / 2.0) * scale - self.view.height / 2.0).max(0.0);
        (tx.clamp(-max_x, max_x), ty.clamp(-max_y, max_y))
    }

    fn reconcile_zoom(&mut self) {
        let zoomed = self.scale.get() > self.config.min_zoom_scale + SCALE_EPSILON;
        if zoomed != self.is_zoomed {
            self.is_zoomed = zoomed;
            debug!(zoomed, "Zoom state changed");
            self.events.push(TransformEvent::ZoomChanged(zoomed));
        }
        self.phase = match (self.phase, zoomed) {
            (Phase::Settled, true) => Phase::Zoomed,
            (Phase::Zoomed, false) => Phase::Settled,
            (phase, _) => phase,
        };
    }
}

impl PanArbiter for TransformMachine {
    /// Unzoomed, only a downward, mostly vertical drag is a dismiss; anything
    /// else belongs to the pager.
    fn should_claim_pan(&self, dx: f64, dy: f64) -> bool {
        if !self.gestures_enabled() {
            return false;
        }
        if self.is_zoomed || self.is_pinching {
            return true;
        }
        dy > 0.0 && dy.abs() > dx.abs()
    }
}
