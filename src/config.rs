//! Tunables for the viewer engine.
//!
//! Defaults match the product behavior; a handful of values can be overridden
//! from `LIGHTBOX_*` environment variables for on-device tuning.

use std::time::Duration;

use tracing::debug;

use crate::error::{Result, ViewerError};

/// Lower zoom bound for every gesture.
pub const MIN_ZOOM_SCALE: f64 = 1.0;
/// Double-tap zoom target and the reference zoom ceiling.
pub const MAX_ZOOM_SCALE: f64 = 3.0;
/// Pinch may exceed the double-tap ceiling.
// Product has not confirmed whether the 3x/6x split is intended; keep both.
pub const PINCH_MAX_ZOOM_SCALE: f64 = MAX_ZOOM_SCALE * 2.0;
/// Releasing a pinch below this scale snaps back to identity.
pub const SNAP_BACK_SCALE: f64 = 1.1;
/// Downward drag distance that commits a dismiss on release.
pub const DISMISS_DISTANCE: f64 = 150.0;
/// Corner radius of feed thumbnails, interpolated to zero while mounting.
pub const THUMBNAIL_CORNER_RADIUS: f64 = 16.0;

const DEFAULT_TRANSITION_MS: u64 = 300;
const BACKDROP_TRANSITION_MS: u64 = 100;
const DEFAULT_TIMING_MS: u64 = 300;
const DEFAULT_PLAYBACK_MEMORY: usize = 64;
const DEFAULT_PRELOAD_CAPACITY: usize = 64;

/// Spring parameters.
///
/// When `settle` is set the spring is critically damped and tuned to come to
/// rest at that duration; otherwise the natural frequency follows from
/// `stiffness` and `mass`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpringConfig {
    pub stiffness: f64,
    pub mass: f64,
    pub settle: Option<Duration>,
    pub overshoot_clamping: bool,
    pub rest_displacement: f64,
    pub rest_speed: f64,
}

impl Default for SpringConfig {
    fn default() -> Self {
        Self {
            stiffness: 100.0,
            mass: 1.0,
            settle: Some(Duration::from_millis(DEFAULT_TRANSITION_MS)),
            overshoot_clamping: true,
            rest_displacement: 0.001,
            rest_speed: 0.01,
        }
    }
}

impl SpringConfig {
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = Some(settle);
        self
    }
}

/// Thresholds for turning raw pointer input into gestures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecognizerConfig {
    /// Movement below this distance still counts as a tap.
    pub touch_slop: f64,
    pub tap_max_duration: Duration,
    /// Maximum delay between the first tap's release and the second press.
    pub double_tap_window: Duration,
    pub double_tap_max_distance: f64,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            touch_slop: 10.0,
            tap_max_duration: Duration::from_millis(250),
            double_tap_window: Duration::from_millis(300),
            double_tap_max_distance: 40.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    pub min_zoom_scale: f64,
    pub max_zoom_scale: f64,
    pub pinch_max_zoom_scale: f64,
    pub snap_back_scale: f64,
    pub dismiss_distance: f64,
    pub corner_radius: f64,
    /// Drives `transitionOffset` for mount and unmount.
    pub transition_spring: SpringConfig,
    /// Backdrop fade while mounting.
    pub backdrop_spring: SpringConfig,
    /// Duration of zoom snap-back and double-tap animations.
    pub timing_duration: Duration,
    pub recognizer: RecognizerConfig,
    /// Number of per-video play/pause states remembered across paging.
    pub playback_memory: usize,
    pub preload_capacity: usize,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            min_zoom_scale: MIN_ZOOM_SCALE,
            max_zoom_scale: MAX_ZOOM_SCALE,
            pinch_max_zoom_scale: PINCH_MAX_ZOOM_SCALE,
            snap_back_scale: SNAP_BACK_SCALE,
            dismiss_distance: DISMISS_DISTANCE,
            corner_radius: THUMBNAIL_CORNER_RADIUS,
            transition_spring: SpringConfig::default(),
            backdrop_spring: SpringConfig::default()
                .with_settle(Duration::from_millis(BACKDROP_TRANSITION_MS)),
            timing_duration: Duration::from_millis(DEFAULT_TIMING_MS),
            recognizer: RecognizerConfig::default(),
            playback_memory: DEFAULT_PLAYBACK_MEMORY,
            preload_capacity: DEFAULT_PRELOAD_CAPACITY,
        }
    }
}

impl ViewerConfig {
    /// Defaults with `LIGHTBOX_*` overrides applied.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = positive_f64(&lookup, "LIGHTBOX_DISMISS_DISTANCE") {
            config.dismiss_distance = v;
        }
        if let Some(v) = positive_f64(&lookup, "LIGHTBOX_MAX_ZOOM") {
            config.max_zoom_scale = v;
        }
        if let Some(v) = positive_f64(&lookup, "LIGHTBOX_PINCH_MAX_ZOOM") {
            config.pinch_max_zoom_scale = v;
        }
        if let Some(ms) = lookup("LIGHTBOX_TRANSITION_MS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|v| *v > 0)
        {
            config.transition_spring.settle = Some(Duration::from_millis(ms));
        }
        if let Some(n) = lookup("LIGHTBOX_PLAYBACK_MEMORY")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|v| *v > 0)
        {
            config.playback_memory = n;
        }

        config.validate()?;
        debug!(?config, "Loaded viewer configuration");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_zoom_scale <= 0.0 {
            return Err(ViewerError::InvalidConfig(
                "min_zoom_scale must be positive".to_string(),
            ));
        }
        if self.max_zoom_scale < self.min_zoom_scale {
            return Err(ViewerError::InvalidConfig(format!(
                "max_zoom_scale {} is below min_zoom_scale {}",
                self.max_zoom_scale, self.min_zoom_scale
            )));
        }
        if self.pinch_max_zoom_scale < self.max_zoom_scale {
            return Err(ViewerError::InvalidConfig(format!(
                "pinch_max_zoom_scale {} is below max_zoom_scale {}",
                self.pinch_max_zoom_scale, self.max_zoom_scale
            )));
        }
        if self.dismiss_distance <= 0.0 {
            return Err(ViewerError::InvalidConfig(
                "dismiss_distance must be positive".to_string(),
            ));
        }
        if self.timing_duration.is_zero() {
            return Err(ViewerError::InvalidConfig(
                "timing_duration must be non-zero".to_string(),
            ));
        }
        for spring in [&self.transition_spring, &self.backdrop_spring] {
            if spring.stiffness <= 0.0 || spring.mass <= 0.0 {
                return Err(ViewerError::InvalidConfig(
                    "spring stiffness and mass must be positive".to_string(),
                ));
            }
            if spring.settle.is_some_and(|d| d.is_zero()) {
                return Err(ViewerError::InvalidConfig(
                    "spring settle duration must be non-zero".to_string(),
                ));
            }
        }
        if self.playback_memory == 0 || self.preload_capacity == 0 {
            return Err(ViewerError::InvalidConfig(
                "playback_memory and preload_capacity must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn positive_f64<F>(lookup: &F, key: &str) -> Option<f64>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = ViewerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_zoom_scale, 3.0);
        assert_eq!(config.pinch_max_zoom_scale, 6.0);
        assert_eq!(config.dismiss_distance, 150.0);
    }

    #[test]
    fn test_env_overrides() {
        let config = ViewerConfig::from_lookup(lookup_from(&[
            ("LIGHTBOX_DISMISS_DISTANCE", "200"),
            ("LIGHTBOX_TRANSITION_MS", "450"),
            ("LIGHTBOX_PLAYBACK_MEMORY", " 8 "),
        ]))
        .unwrap();
        assert_eq!(config.dismiss_distance, 200.0);
        assert_eq!(
            config.transition_spring.settle,
            Some(Duration::from_millis(450))
        );
        assert_eq!(config.playback_memory, 8);
    }

    #[test]
    fn test_invalid_env_values_ignored() {
        let config = ViewerConfig::from_lookup(lookup_from(&[
            ("LIGHTBOX_DISMISS_DISTANCE", "-5"),
            ("LIGHTBOX_MAX_ZOOM", "lots"),
            ("LIGHTBOX_TRANSITION_MS", "0"),
        ]))
        .unwrap();
        assert_eq!(config, ViewerConfig::default());
    }

    #[test]
    fn test_pinch_ceiling_below_double_tap_rejected() {
        let result = ViewerConfig::from_lookup(lookup_from(&[("LIGHTBOX_PINCH_MAX_ZOOM", "2")]));
        assert!(matches!(result, Err(ViewerError::InvalidConfig(_))));
    }
}
