//! Configuration types for page animation wiring.

use log::warn;
use serde::{Deserialize, Serialize};

use super::{AnimationKind, CounterFormat, PropertyTarget};
use crate::timing::Easing;

/// Default scroll throttle, one 60 Hz frame.
pub const DEFAULT_SCROLL_THROTTLE_MS: f64 = 16.0;
/// Default playback duration for counters and property animations.
pub const DEFAULT_DURATION_MS: f64 = 2000.0;
/// Default visible fraction before an element counts as revealed.
pub const DEFAULT_THRESHOLD: f64 = 0.1;

fn default_scroll_throttle_ms() -> f64 {
    DEFAULT_SCROLL_THROTTLE_MS
}

fn default_duration_ms() -> f64 {
    DEFAULT_DURATION_MS
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

fn default_root_margin() -> String {
    "0px 0px -50px 0px".to_string()
}

fn default_reveal_class() -> String {
    "visible".to_string()
}

fn default_scrolled_class() -> String {
    "scrolled".to_string()
}

/// Top-level animation configuration for a page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotionConfig {
    /// Throttle window applied to scroll events, in milliseconds.
    #[serde(default = "default_scroll_throttle_ms")]
    pub scroll_throttle_ms: f64,
    /// Observation defaults for elements that do not override them.
    #[serde(default)]
    pub observe: ObserveOptions,
    /// Elements animated once when they scroll into view.
    #[serde(default)]
    pub elements: Vec<ElementConfig>,
    /// Classes toggled when the page scrolls past a pixel offset.
    #[serde(default)]
    pub scroll_effects: Vec<ScrollEffectConfig>,
    /// Forget which elements already fired when the manager is disposed.
    #[serde(default)]
    pub clear_record_on_dispose: bool,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            scroll_throttle_ms: DEFAULT_SCROLL_THROTTLE_MS,
            observe: ObserveOptions::default(),
            elements: vec![
                ElementConfig {
                    selector: ".fade-in".to_string(),
                    animation: AnimationSpec::FadeIn {
                        class: default_reveal_class(),
                    },
                    observe: None,
                    delay_ms: 0.0,
                },
                ElementConfig {
                    selector: ".stat-number".to_string(),
                    animation: AnimationSpec::Counter {
                        target: None,
                        duration_ms: DEFAULT_DURATION_MS,
                        format: CounterFormat::default(),
                    },
                    observe: Some(ObserveOptions {
                        threshold: 0.5,
                        root_margin: "0px".to_string(),
                    }),
                    delay_ms: 0.0,
                },
            ],
            scroll_effects: vec![ScrollEffectConfig {
                selector: ".navbar".to_string(),
                threshold_px: 100.0,
                class: default_scrolled_class(),
            }],
            clear_record_on_dispose: false,
        }
    }
}

/// Intersection options for an observed element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObserveOptions {
    /// Fraction of the element area (0.0-1.0) that must be visible.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// CSS margin grown or shrunk around the viewport.
    #[serde(default = "default_root_margin")]
    pub root_margin: String,
}

impl Default for ObserveOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            root_margin: default_root_margin(),
        }
    }
}

impl ObserveOptions {
    /// Clamp the threshold into [0, 1], replacing non-finite values.
    pub fn sanitized(mut self) -> Self {
        self.threshold = sanitize_threshold(self.threshold);
        self
    }
}

/// One selector worth of one-shot animations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementConfig {
    /// CSS selector; every match is registered.
    pub selector: String,
    /// What to play when a match becomes visible.
    pub animation: AnimationSpec,
    /// Per-element observation override.
    #[serde(default)]
    pub observe: Option<ObserveOptions>,
    /// Wait before playback starts (staggered reveals).
    #[serde(default)]
    pub delay_ms: f64,
}

/// Serialized form of an [`AnimationKind`].
///
/// Counters may omit `target`, in which case it is read from the
/// element's current text when the page starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AnimationSpec {
    FadeIn {
        #[serde(default = "default_reveal_class")]
        class: String,
    },
    Counter {
        #[serde(default)]
        target: Option<f64>,
        #[serde(default = "default_duration_ms")]
        duration_ms: f64,
        #[serde(default)]
        format: CounterFormat,
    },
    Property {
        targets: Vec<PropertyTarget>,
        #[serde(default = "default_duration_ms")]
        duration_ms: f64,
        #[serde(default)]
        easing: Easing,
    },
}

impl AnimationSpec {
    /// Resolve into a runnable kind. `text_target` supplies the counter
    /// target when the config leaves it open.
    pub fn to_kind(&self, text_target: Option<f64>) -> AnimationKind {
        match self {
            AnimationSpec::FadeIn { class } => AnimationKind::FadeIn {
                class: class.clone(),
            },
            AnimationSpec::Counter {
                target,
                duration_ms,
                format,
            } => AnimationKind::Counter {
                target: target.or(text_target).unwrap_or(0.0),
                duration_ms: *duration_ms,
                format: format.clone(),
            },
            AnimationSpec::Property {
                targets,
                duration_ms,
                easing,
            } => AnimationKind::Property {
                targets: targets.clone(),
                duration_ms: *duration_ms,
                easing: *easing,
            },
        }
    }
}

/// A class toggled while the page is scrolled past `threshold_px`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrollEffectConfig {
    pub selector: String,
    pub threshold_px: f64,
    #[serde(default = "default_scrolled_class")]
    pub class: String,
}

impl MotionConfig {
    /// Parse a JSON configuration and clamp any out-of-range numbers.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: MotionConfig = serde_json::from_str(json)?;
        Ok(config.sanitized())
    }

    /// Replace invalid numbers with safe values instead of failing.
    ///
    /// Durations and delays become non-negative, thresholds land in [0, 1]
    /// and the throttle window falls back to one frame.
    pub fn sanitized(mut self) -> Self {
        if !self.scroll_throttle_ms.is_finite() || self.scroll_throttle_ms < 0.0 {
            warn!(
                "scroll_throttle_ms {} is invalid, using {}",
                self.scroll_throttle_ms, DEFAULT_SCROLL_THROTTLE_MS
            );
            self.scroll_throttle_ms = DEFAULT_SCROLL_THROTTLE_MS;
        }
        self.observe = self.observe.sanitized();

        for element in &mut self.elements {
            element.delay_ms = sanitize_duration(element.delay_ms, 0.0);
            element.observe = element.observe.take().map(ObserveOptions::sanitized);
            match &mut element.animation {
                AnimationSpec::FadeIn { .. } => {}
                AnimationSpec::Counter {
                    target,
                    duration_ms,
                    ..
                } => {
                    *duration_ms = sanitize_duration(*duration_ms, DEFAULT_DURATION_MS);
                    if target.is_some_and(|t| !t.is_finite()) {
                        warn!("counter target for '{}' is not finite", element.selector);
                        *target = None;
                    }
                }
                AnimationSpec::Property {
                    targets,
                    duration_ms,
                    ..
                } => {
                    *duration_ms = sanitize_duration(*duration_ms, DEFAULT_DURATION_MS);
                    targets.retain(|t| {
                        let keep = t.value.is_finite();
                        if !keep {
                            warn!("dropping non-finite target for property '{}'", t.name);
                        }
                        keep
                    });
                }
            }
        }

        for effect in &mut self.scroll_effects {
            if !effect.threshold_px.is_finite() {
                warn!("scroll threshold for '{}' is not finite", effect.selector);
                effect.threshold_px = 0.0;
            }
        }
        self
    }
}

/// Clamp a duration to be non-negative; non-finite values take `fallback`.
pub fn sanitize_duration(duration_ms: f64, fallback: f64) -> f64 {
    if !duration_ms.is_finite() {
        warn!("duration {duration_ms} is not finite, using {fallback}");
        return fallback;
    }
    duration_ms.max(0.0)
}

/// Clamp a visibility threshold into [0, 1].
pub fn sanitize_threshold(threshold: f64) -> f64 {
    if !threshold.is_finite() {
        warn!("threshold {threshold} is not finite, using {DEFAULT_THRESHOLD}");
        return DEFAULT_THRESHOLD;
    }
    threshold.clamp(0.0, 1.0)
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_roundtrips_through_json() {
        let json = serde_json::to_string(&MotionConfig::default()).unwrap();
        let config = MotionConfig::from_json(&json).unwrap();
        assert_eq!(config.elements.len(), 2);
        assert_eq!(config.scroll_effects[0].threshold_px, 100.0);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let config = MotionConfig::from_json(
            r#"{"elements": [{"selector": ".card", "animation": {"type": "fade-in"}}]}"#,
        )
        .unwrap();
        assert_eq!(config.scroll_throttle_ms, DEFAULT_SCROLL_THROTTLE_MS);
        assert_eq!(config.observe.threshold, DEFAULT_THRESHOLD);
        match &config.elements[0].animation {
            AnimationSpec::FadeIn { class } => assert_eq!(class, "visible"),
            other => panic!("unexpected animation {other:?}"),
        }
    }

    #[test]
    fn test_invalid_numbers_are_clamped() {
        let config = MotionConfig {
            scroll_throttle_ms: -5.0,
            observe: ObserveOptions {
                threshold: 3.0,
                root_margin: "0px".to_string(),
            },
            elements: vec![ElementConfig {
                selector: ".n".to_string(),
                animation: AnimationSpec::Counter {
                    target: Some(f64::NAN),
                    duration_ms: -100.0,
                    format: CounterFormat::default(),
                },
                observe: Some(ObserveOptions {
                    threshold: -1.0,
                    root_margin: "0px".to_string(),
                }),
                delay_ms: f64::INFINITY,
            }],
            scroll_effects: vec![],
            clear_record_on_dispose: false,
        }
        .sanitized();

        assert_eq!(config.scroll_throttle_ms, DEFAULT_SCROLL_THROTTLE_MS);
        assert_eq!(config.observe.threshold, 1.0);
        let element = &config.elements[0];
        assert_eq!(element.delay_ms, 0.0);
        assert_eq!(element.observe.as_ref().unwrap().threshold, 0.0);
        match &element.animation {
            AnimationSpec::Counter {
                target,
                duration_ms,
                ..
            } => {
                assert_eq!(*target, None);
                assert_eq!(*duration_ms, 0.0);
            }
            other => panic!("unexpected animation {other:?}"),
        }
    }

    #[test]
    fn test_counter_target_falls_back_to_text() {
        let spec = AnimationSpec::Counter {
            target: None,
            duration_ms: 100.0,
            format: CounterFormat::default(),
        };
        match spec.to_kind(Some(250.0)) {
            AnimationKind::Counter { target, .. } => assert_eq!(target, 250.0),
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn test_bad_json_is_an_error() {
        let err = MotionConfig::from_json("{ not json").unwrap_err();
        assert!(err.to_string().starts_with("Invalid configuration JSON"));
    }
}
