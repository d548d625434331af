//! Spring and timing drivers for single numeric values.
//!
//! Values advance only through `tick(dt)`, so the render loop fully controls
//! time and every animation is frame-rate independent. Cancelling stops the
//! driver where it is; the value never jumps back to a default.

use std::time::Duration;

use crate::config::SpringConfig;

/// `omega * t` at which a critically damped spring is within 0.1% of target:
/// `(1 + x) * e^-x = 0.001`.
const SETTLE_OMEGA_T: f64 = 9.233;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Easing {
    Linear,
    /// Quadratic ease-in-out.
    InOutQuad,
}

impl Easing {
    fn apply(self, t: f64) -> f64 {
        match self {
            Easing::Linear => t,
            Easing::InOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
                }
            }
        }
    }

    fn derivative(self, t: f64) -> f64 {
        match self {
            Easing::Linear => 1.0,
            Easing::InOutQuad => {
                if t < 0.5 {
                    4.0 * t
                } else {
                    4.0 * (1.0 - t)
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Animation {
    Spring(SpringConfig),
    Timing { duration: Duration, easing: Easing },
}

impl Animation {
    pub fn timing(duration: Duration) -> Self {
        Animation::Timing {
            duration,
            easing: Easing::InOutQuad,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Running {
    animation: Animation,
    from: f64,
    to: f64,
    initial_velocity: f64,
    elapsed: f64,
}

impl Running {
    /// Position and velocity at `self.elapsed`, plus whether it has settled.
    fn sample(&self) -> (f64, f64, bool) {
        match self.animation {
            Animation::Timing { duration, easing } => {
                let total = duration.as_secs_f64();
                if total <= 0.0 || self.elapsed >= total {
                    return (self.to, 0.0, true);
                }
                let t = self.elapsed / total;
                let span = self.to - self.from;
                let value = self.from + span * easing.apply(t);
                let velocity = span * easing.derivative(t) / total;
                (value, velocity, false)
            }
            Animation::Spring(config) => {
                let omega = spring_omega(&config);
                let t = self.elapsed;
                let c1 = self.from - self.to;
                let c2 = self.initial_velocity + omega * c1;
                let decay = (-omega * t).exp();
                let offset = (c1 + c2 * t) * decay;
                let velocity = (c2 - omega * (c1 + c2 * t)) * decay;
                let value = self.to + offset;

                let past_settle = config
                    .settle
                    .is_some_and(|settle| t >= settle.as_secs_f64());
                let at_rest =
                    offset.abs() < config.rest_displacement && velocity.abs() < config.rest_speed;
                // Crossing the target flips the sign of the offset.
                let overshot = config.overshoot_clamping && c1 != 0.0 && offset * c1 < 0.0;

                if past_settle || at_rest || overshot {
                    (self.to, 0.0, true)
                } else {
                    (value, velocity, false)
                }
            }
        }
    }
}

fn spring_omega(config: &SpringConfig) -> f64 {
    match config.settle {
        Some(settle) if !settle.is_zero() => SETTLE_OMEGA_T / settle.as_secs_f64(),
        _ => (config.stiffness / config.mass).sqrt(),
    }
}

/// Reported by [`AnimatedValue::tick`] when an animation reaches its target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settled {
    pub target: f64,
}

#[derive(Debug, Clone)]
pub struct AnimatedValue {
    value: f64,
    velocity: f64,
    running: Option<Running>,
}

impl AnimatedValue {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            velocity: 0.0,
            running: None,
        }
    }

    pub fn get(&self) -> f64 {
        self.value
    }

    /// Sets the value directly, cancelling any running animation.
    pub fn set(&mut self, value: f64) {
        self.running = None;
        self.value = value;
        self.velocity = 0.0;
    }

    /// Starts animating from the current value and velocity.
    pub fn animate_to(&mut self, target: f64, animation: Animation) {
        self.running = Some(Running {
            animation,
            from: self.value,
            to: target,
            initial_velocity: self.velocity,
            elapsed: 0.0,
        });
    }

    pub fn spring_to(&mut self, target: f64, config: SpringConfig) {
        self.animate_to(target, Animation::Spring(config));
    }

    pub fn timing_to(&mut self, target: f64, duration: Duration) {
        self.animate_to(target, Animation::timing(duration));
    }

    /// Stops the running animation, keeping the current value. Returns
    /// whether anything was running.
    pub fn cancel(&mut self) -> bool {
        self.running.take().is_some()
    }

    pub fn is_animating(&self) -> bool {
        self.running.is_some()
    }

    /// Where the running animation is heading, if any.
    pub fn target(&self) -> Option<f64> {
        self.running.map(|r| r.to)
    }

    pub fn tick(&mut self, dt: Duration) -> Option<Settled> {
        let running = self.running.as_mut()?;
        running.elapsed += dt.as_secs_f64();
        let (value, velocity, done) = running.sample();
        let target = running.to;
        self.value = value;
        self.velocity = velocity;
        if done {
            self.running = None;
            Some(Settled { target })
        } else {
            None
        }
    }
}

impl Default for AnimatedValue {
    fn default() -> Self {
        Self::new(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: Duration = Duration::from_millis(16);

    fn run(value: &mut AnimatedValue, max_frames: usize) -> Option<usize> {
        for frame in 0..max_frames {
            if value.tick(FRAME).is_some() {
                return Some(frame + 1);
            }
        }
        None
    }

    #[test]
    fn test_spring_settles_near_configured_duration() {
        let mut value = AnimatedValue::new(0.0);
        value.spring_to(1.0, SpringConfig::default());
        let frames = run(&mut value, 100).unwrap();

        assert_eq!(value.get(), 1.0);
        assert!(!value.is_animating());
        // 300ms at 16ms per frame, with a little slack for rest detection.
        assert!((12..=19).contains(&frames), "settled after {frames} frames");
    }

    #[test]
    fn test_spring_is_monotonic_without_overshoot() {
        let mut value = AnimatedValue::new(0.0);
        value.spring_to(1.0, SpringConfig::default());
        let mut last = 0.0;
        while value.tick(FRAME).is_none() {
            assert!(value.get() >= last);
            assert!(value.get() <= 1.0);
            last = value.get();
        }
    }

    #[test]
    fn test_stiffness_only_spring_reaches_rest() {
        let config = SpringConfig {
            settle: None,
            ..SpringConfig::default()
        };
        let mut value = AnimatedValue::new(1.0);
        value.spring_to(0.0, config);
        assert!(run(&mut value, 1000).is_some());
        assert_eq!(value.get(), 0.0);
    }

    #[test]
    fn test_timing_hits_target_exactly() {
        let mut value = AnimatedValue::new(3.0);
        value.timing_to(1.0, Duration::from_millis(300));
        value.tick(Duration::from_millis(150));
        assert!((value.get() - 2.0).abs() < 1e-9);
        let settled = value.tick(Duration::from_millis(150));
        assert_eq!(settled, Some(Settled { target: 1.0 }));
        assert_eq!(value.get(), 1.0);
    }

    #[test]
    fn test_cancel_keeps_current_value() {
        let mut value = AnimatedValue::new(0.0);
        value.timing_to(10.0, Duration::from_millis(300));
        value.tick(Duration::from_millis(100));
        let mid = value.get();
        assert!(mid > 0.0 && mid < 10.0);

        assert!(value.cancel());
        assert!(!value.cancel());
        value.tick(FRAME);
        assert_eq!(value.get(), mid);
    }

    #[test]
    fn test_retarget_starts_from_current_value() {
        let mut value = AnimatedValue::new(0.0);
        value.spring_to(1.0, SpringConfig::default());
        value.tick(Duration::from_millis(50));
        let mid = value.get();

        value.spring_to(0.0, SpringConfig::default());
        value.tick(Duration::from_millis(1));
        assert!((value.get() - mid).abs() < 0.05);
    }
}
