//! Turns raw pointer input into viewer gestures.
//!
//! Arbitration rules:
//! - two pointers always form a pinch, and a pinch cancels any pan in flight
//! - a single pointer that leaves the touch slop becomes a pan only if the
//!   [`PanArbiter`] claims it; otherwise the whole sequence goes to the pager
//! - a tap is reported only once the double-tap window has closed, so single
//!   and double taps never both fire for the same touches

use std::time::Duration;

use tracing::{debug, trace};

use crate::config::RecognizerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerPhase {
    Down,
    Move,
    Up,
    /// The platform took the touch away (system gesture, incoming call, ...).
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub id: u64,
    pub phase: PointerPhase,
    pub x: f64,
    pub y: f64,
    /// Monotonic timestamp of the event.
    pub time: Duration,
}

impl PointerEvent {
    pub fn new(id: u64, phase: PointerPhase, x: f64, y: f64, time: Duration) -> Self {
        Self {
            id,
            phase,
            x,
            y,
            time,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureEvent {
    PinchStart {
        focal_x: f64,
        focal_y: f64,
    },
    /// `scale` is relative to the pointer distance when the pinch began.
    PinchUpdate {
        scale: f64,
        focal_x: f64,
        focal_y: f64,
    },
    PinchEnd,
    PanStart {
        x: f64,
        y: f64,
    },
    PanUpdate {
        translation_x: f64,
        translation_y: f64,
        velocity_x: f64,
        velocity_y: f64,
    },
    PanEnd {
        translation_x: f64,
        translation_y: f64,
        velocity_x: f64,
        velocity_y: f64,
    },
    /// The pan lost the sequence to a pinch; nothing is committed.
    PanCancel,
    Tap {
        x: f64,
        y: f64,
    },
    DoubleTap {
        x: f64,
        y: f64,
    },
    /// The platform cancelled the touch sequence.
    Interrupted,
}

/// Output of the recognizer for one pointer event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Recognized {
    Gesture(GestureEvent),
    /// The sequence belongs to the page-swipe recognizer from here on.
    DeferToPager,
}

/// Decides whether a single-pointer drag belongs to the viewer.
pub trait PanArbiter {
    fn should_claim_pan(&self, dx: f64, dy: f64) -> bool;
}

#[derive(Debug, Clone, Copy)]
struct Tracked {
    id: u64,
    x: f64,
    y: f64,
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    x: f64,
    y: f64,
    time: Duration,
}

#[derive(Debug, Clone, Copy)]
enum Mode {
    Idle,
    /// One pointer down, still inside the touch slop.
    Pending {
        start: Sample,
        second_tap: bool,
    },
    Panning {
        start: Sample,
        last: Sample,
        velocity_x: f64,
        velocity_y: f64,
    },
    Pinching {
        initial_distance: f64,
    },
    /// Remaining pointers are ignored until every pointer is up.
    Spent,
    Deferred,
}

#[derive(Debug, Clone, Copy)]
struct PendingTap {
    x: f64,
    y: f64,
    released_at: Duration,
}

pub struct PointerRecognizer {
    config: RecognizerConfig,
    pointers: Vec<Tracked>,
    mode: Mode,
    pending_tap: Option<PendingTap>,
}

impl PointerRecognizer {
    pub fn new(config: RecognizerConfig) -> Self {
        Self {
            config,
            pointers: Vec::with_capacity(2),
            mode: Mode::Idle,
            pending_tap: None,
        }
    }

    pub fn reset(&mut self) {
        self.pointers.clear();
        self.mode = Mode::Idle;
        self.pending_tap = None;
    }

    /// True while a pointer sequence is in progress.
    pub fn is_tracking(&self) -> bool {
        !self.pointers.is_empty()
    }

    pub fn handle(&mut self, event: PointerEvent, arbiter: &dyn PanArbiter) -> Vec<Recognized> {
        let mut out = Vec::new();
        match event.phase {
            PointerPhase::Down => self.on_down(event, &mut out),
            PointerPhase::Move => self.on_move(event, arbiter, &mut out),
            PointerPhase::Up => self.on_up(event, &mut out),
            PointerPhase::Cancel => {
                debug!("Pointer sequence cancelled by platform");
                self.reset();
                out.push(Recognized::Gesture(GestureEvent::Interrupted));
            }
        }
        out
    }

    /// Flushes a single tap whose double-tap window has closed by `now`.
    pub fn poll(&mut self, now: Duration) -> Option<GestureEvent> {
        let tap = self.pending_tap?;
        if now.saturating_sub(tap.released_at) > self.config.double_tap_window {
            self.pending_tap = None;
            trace!(x = tap.x, y = tap.y, "Single tap confirmed");
            return Some(GestureEvent::Tap { x: tap.x, y: tap.y });
        }
        None
    }

    fn on_down(&mut self, event: PointerEvent, out: &mut Vec<Recognized>) {
        if self.pointers.iter().any(|p| p.id == event.id) {
            return;
        }
        self.pointers.push(Tracked {
            id: event.id,
            x: event.x,
            y: event.y,
        });

        match self.pointers.len() {
            1 => {
                let second_tap = self.take_second_tap(&event, out);
                self.mode = Mode::Pending {
                    start: Sample {
                        x: event.x,
                        y: event.y,
                        time: event.time,
                    },
                    second_tap,
                };
            }
            2 => match self.mode {
                Mode::Pending { .. } | Mode::Panning { .. } => {
                    if matches!(self.mode, Mode::Panning { .. }) {
                        out.push(Recognized::Gesture(GestureEvent::PanCancel));
                    }
                    let (focal_x, focal_y) = self.focal();
                    self.mode = Mode::Pinching {
                        initial_distance: self.distance().max(1.0),
                    };
                    trace!(focal_x, focal_y, "Pinch started");
                    out.push(Recognized::Gesture(GestureEvent::PinchStart {
                        focal_x,
                        focal_y,
                    }));
                }
                _ => {}
            },
            _ => {}
        }
    }

    /// Resolves a waiting single tap against a new press: either the press
    /// completes a double tap, or the single tap is flushed now.
    fn take_second_tap(&mut self, event: &PointerEvent, out: &mut Vec<Recognized>) -> bool {
        let Some(tap) = self.pending_tap.take() else {
            return false;
        };
        let within_window =
            event.time.saturating_sub(tap.released_at) <= self.config.double_tap_window;
        let within_distance = (event.x - tap.x).hypot(event.y - tap.y)
            <= self.config.double_tap_max_distance;
        if within_window && within_distance {
            self.pending_tap = Some(tap);
            return true;
        }
        out.push(Recognized::Gesture(GestureEvent::Tap { x: tap.x, y: tap.y }));
        false
    }

    fn on_move(&mut self, event: PointerEvent, arbiter: &dyn PanArbiter, out: &mut Vec<Recognized>) {
        let Some(pointer) = self.pointers.iter_mut().find(|p| p.id == event.id) else {
            return;
        };
        pointer.x = event.x;
        pointer.y = event.y;

        let sample = Sample {
            x: event.x,
            y: event.y,
            time: event.time,
        };

        match self.mode {
            Mode::Pending { start, .. } => {
                let dx = event.x - start.x;
                let dy = event.y - start.y;
                if dx.hypot(dy) <= self.config.touch_slop {
                    return;
                }
                self.pending_tap = None;
                if arbiter.should_claim_pan(dx, dy) {
                    trace!(dx, dy, "Pan claimed");
                    out.push(Recognized::Gesture(GestureEvent::PanStart {
                        x: start.x,
                        y: start.y,
                    }));
                    let (velocity_x, velocity_y) = velocity_between(&start, &sample, (0.0, 0.0));
                    self.mode = Mode::Panning {
                        start,
                        last: sample,
                        velocity_x,
                        velocity_y,
                    };
                    out.push(Recognized::Gesture(GestureEvent::PanUpdate {
                        translation_x: dx,
                        translation_y: dy,
                        velocity_x,
                        velocity_y,
                    }));
                } else {
                    trace!(dx, dy, "Drag deferred to pager");
                    self.mode = Mode::Deferred;
                    out.push(Recognized::DeferToPager);
                }
            }
            Mode::Panning {
                start,
                last,
                velocity_x,
                velocity_y,
            } => {
                let (velocity_x, velocity_y) =
                    velocity_between(&last, &sample, (velocity_x, velocity_y));
                self.mode = Mode::Panning {
                    start,
                    last: sample,
                    velocity_x,
                    velocity_y,
                };
                out.push(Recognized::Gesture(GestureEvent::PanUpdate {
                    translation_x: event.x - start.x,
                    translation_y: event.y - start.y,
                    velocity_x,
                    velocity_y,
                }));
            }
            Mode::Pinching { initial_distance } if self.pointers.len() >= 2 => {
                let (focal_x, focal_y) = self.focal();
                let scale = self.distance() / initial_distance;
                out.push(Recognized::Gesture(GestureEvent::PinchUpdate {
                    scale,
                    focal_x,
                    focal_y,
                }));
            }
            Mode::Deferred => out.push(Recognized::DeferToPager),
            _ => {}
        }
    }

    fn on_up(&mut self, event: PointerEvent, out: &mut Vec<Recognized>) {
        let Some(pos) = self.pointers.iter().position(|p| p.id == event.id) else {
            return;
        };
        self.pointers.remove(pos);

        match self.mode {
            Mode::Pinching { .. } => {
                out.push(Recognized::Gesture(GestureEvent::PinchEnd));
                self.mode = if self.pointers.is_empty() {
                    Mode::Idle
                } else {
                    Mode::Spent
                };
            }
            Mode::Panning {
                start,
                last,
                velocity_x,
                velocity_y,
            } => {
                let release = Sample {
                    x: event.x,
                    y: event.y,
                    time: event.time,
                };
                let (velocity_x, velocity_y) =
                    velocity_between(&last, &release, (velocity_x, velocity_y));
                out.push(Recognized::Gesture(GestureEvent::PanEnd {
                    translation_x: event.x - start.x,
                    translation_y: event.y - start.y,
                    velocity_x,
                    velocity_y,
                }));
                self.mode = Mode::Idle;
            }
            Mode::Pending { start, second_tap } => {
                let held = event.time.saturating_sub(start.time);
                if held <= self.config.tap_max_duration {
                    if second_tap {
                        self.pending_tap = None;
                        trace!(x = event.x, y = event.y, "Double tap");
                        out.push(Recognized::Gesture(GestureEvent::DoubleTap {
                            x: event.x,
                            y: event.y,
                        }));
                    } else {
                        self.pending_tap = Some(PendingTap {
                            x: event.x,
                            y: event.y,
                            released_at: event.time,
                        });
                    }
                } else {
                    self.pending_tap = None;
                }
                self.mode = Mode::Idle;
            }
            Mode::Deferred => {
                if self.pointers.is_empty() {
                    self.mode = Mode::Idle;
                }
            }
            Mode::Spent | Mode::Idle => {
                if self.pointers.is_empty() {
                    self.mode = Mode::Idle;
                }
            }
        }
    }

    fn focal(&self) -> (f64, f64) {
        match self.pointers.as_slice() {
            [a, b, ..] => ((a.x + b.x) / 2.0, (a.y + b.y) / 2.0),
            [a] => (a.x, a.y),
            [] => (0.0, 0.0),
        }
    }

    fn distance(&self) -> f64 {
        match self.pointers.as_slice() {
            [a, b, ..] => (b.x - a.x).hypot(b.y - a.y),
            _ => 0.0,
        }
    }
}

/// Velocity in units per second between two samples; keeps `previous` when
/// the samples share a timestamp.
fn velocity_between(from: &Sample, to: &Sample, previous: (f64, f64)) -> (f64, f64) {
    let dt = to.time.saturating_sub(from.time).as_secs_f64();
    if dt <= 0.0 {
        return previous;
    }
    ((to.x - from.x) / dt, (to.y - from.y) / dt)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ClaimVertical;

    impl PanArbiter for ClaimVertical {
        fn should_claim_pan(&self, dx: f64, dy: f64) -> bool {
            dy > 0.0 && dy.abs() > dx.abs()
        }
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn ev(id: u64, phase: PointerPhase, x: f64, y: f64, t: u64) -> PointerEvent {
        PointerEvent::new(id, phase, x, y, ms(t))
    }

    fn gestures(out: Vec<Recognized>) -> Vec<GestureEvent> {
        out.into_iter()
            .filter_map(|r| match r {
                Recognized::Gesture(g) => Some(g),
                Recognized::DeferToPager => None,
            })
            .collect()
    }

    #[test]
    fn test_single_tap_after_window() {
        let mut r = PointerRecognizer::new(RecognizerConfig::default());
        assert!(r.handle(ev(1, PointerPhase::Down, 100.0, 100.0, 0), &ClaimVertical).is_empty());
        assert!(r.handle(ev(1, PointerPhase::Up, 101.0, 100.0, 80), &ClaimVertical).is_empty());

        assert_eq!(r.poll(ms(200)), None);
        assert_eq!(r.poll(ms(400)), Some(GestureEvent::Tap { x: 101.0, y: 100.0 }));
        assert_eq!(r.poll(ms(800)), None);
    }

    #[test]
    fn test_double_tap() {
        let mut r = PointerRecognizer::new(RecognizerConfig::default());
        r.handle(ev(1, PointerPhase::Down, 100.0, 100.0, 0), &ClaimVertical);
        r.handle(ev(1, PointerPhase::Up, 100.0, 100.0, 60), &ClaimVertical);
        r.handle(ev(2, PointerPhase::Down, 104.0, 98.0, 160), &ClaimVertical);
        let out = gestures(r.handle(ev(2, PointerPhase::Up, 104.0, 98.0, 220), &ClaimVertical));

        assert_eq!(out, vec![GestureEvent::DoubleTap { x: 104.0, y: 98.0 }]);
        assert_eq!(r.poll(ms(1000)), None);
    }

    #[test]
    fn test_far_second_press_flushes_single_tap() {
        let mut r = PointerRecognizer::new(RecognizerConfig::default());
        r.handle(ev(1, PointerPhase::Down, 100.0, 100.0, 0), &ClaimVertical);
        r.handle(ev(1, PointerPhase::Up, 100.0, 100.0, 60), &ClaimVertical);
        let out = gestures(r.handle(ev(2, PointerPhase::Down, 300.0, 500.0, 120), &ClaimVertical));
        assert_eq!(out, vec![GestureEvent::Tap { x: 100.0, y: 100.0 }]);
    }

    #[test]
    fn test_downward_drag_is_claimed() {
        let mut r = PointerRecognizer::new(RecognizerConfig::default());
        r.handle(ev(1, PointerPhase::Down, 200.0, 300.0, 0), &ClaimVertical);
        let out = gestures(r.handle(ev(1, PointerPhase::Move, 202.0, 340.0, 16), &ClaimVertical));
        assert!(matches!(out[0], GestureEvent::PanStart { .. }));
        assert!(matches!(
            out[1],
            GestureEvent::PanUpdate { translation_y, .. } if translation_y == 40.0
        ));

        r.handle(ev(1, PointerPhase::Move, 202.0, 400.0, 32), &ClaimVertical);
        let out = gestures(r.handle(ev(1, PointerPhase::Up, 202.0, 400.0, 48), &ClaimVertical));
        match out[0] {
            GestureEvent::PanEnd {
                translation_y,
                velocity_y,
                ..
            } => {
                assert_eq!(translation_y, 100.0);
                assert_eq!(velocity_y, 0.0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_horizontal_drag_goes_to_pager() {
        let mut r = PointerRecognizer::new(RecognizerConfig::default());
        r.handle(ev(1, PointerPhase::Down, 200.0, 300.0, 0), &ClaimVertical);
        let out = r.handle(ev(1, PointerPhase::Move, 150.0, 302.0, 16), &ClaimVertical);
        assert_eq!(out, vec![Recognized::DeferToPager]);

        let out = r.handle(ev(1, PointerPhase::Move, 100.0, 302.0, 32), &ClaimVertical);
        assert_eq!(out, vec![Recognized::DeferToPager]);
        assert!(r.handle(ev(1, PointerPhase::Up, 100.0, 302.0, 48), &ClaimVertical).is_empty());
        assert!(!r.is_tracking());
    }

    #[test]
    fn test_pinch_scale_and_focal() {
        let mut r = PointerRecognizer::new(RecognizerConfig::default());
        r.handle(ev(1, PointerPhase::Down, 100.0, 400.0, 0), &ClaimVertical);
        let out = gestures(r.handle(ev(2, PointerPhase::Down, 300.0, 400.0, 5), &ClaimVertical));
        assert_eq!(
            out,
            vec![GestureEvent::PinchStart {
                focal_x: 200.0,
                focal_y: 400.0
            }]
        );

        let out = gestures(r.handle(ev(2, PointerPhase::Move, 500.0, 400.0, 20), &ClaimVertical));
        assert_eq!(
            out,
            vec![GestureEvent::PinchUpdate {
                scale: 2.0,
                focal_x: 300.0,
                focal_y: 400.0
            }]
        );

        let out = gestures(r.handle(ev(1, PointerPhase::Up, 100.0, 400.0, 40), &ClaimVertical));
        assert_eq!(out, vec![GestureEvent::PinchEnd]);
        // The leftover pointer does not start a pan.
        assert!(r.handle(ev(2, PointerPhase::Move, 520.0, 480.0, 56), &ClaimVertical).is_empty());
        r.handle(ev(2, PointerPhase::Up, 520.0, 480.0, 70), &ClaimVertical);
        assert!(!r.is_tracking());
    }

    #[test]
    fn test_second_pointer_cancels_pan() {
        let mut r = PointerRecognizer::new(RecognizerConfig::default());
        r.handle(ev(1, PointerPhase::Down, 200.0, 300.0, 0), &ClaimVertical);
        r.handle(ev(1, PointerPhase::Move, 200.0, 340.0, 16), &ClaimVertical);
        let out = gestures(r.handle(ev(2, PointerPhase::Down, 260.0, 340.0, 30), &ClaimVertical));
        assert_eq!(out[0], GestureEvent::PanCancel);
        assert!(matches!(out[1], GestureEvent::PinchStart { .. }));
    }

    #[test]
    fn test_cancel_resets() {
        let mut r = PointerRecognizer::new(RecognizerConfig::default());
        r.handle(ev(1, PointerPhase::Down, 200.0, 300.0, 0), &ClaimVertical);
        let out = gestures(r.handle(ev(1, PointerPhase::Cancel, 200.0, 300.0, 5), &ClaimVertical));
        assert_eq!(out, vec![GestureEvent::Interrupted]);
        assert!(!r.is_tracking());
    }
}
