//! Animated element descriptions.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ObserveOptions;
use crate::timing::Easing;

/// Opaque handle to a host element.
///
/// The host owns the element; the engine only keeps the id and asks the
/// host to resolve it on every mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A numeric property target such as `opacity: 1` or `translateY: 0px`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyTarget {
    /// Property name as understood by the host.
    pub name: String,
    /// End value.
    pub value: f64,
    /// Unit suffix appended when the value is written (e.g. `px`).
    #[serde(default)]
    pub unit: String,
}

impl PropertyTarget {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            unit: String::new(),
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }
}

/// How a counter renders its value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CounterFormat {
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub suffix: String,
    /// Thousands separator, e.g. `','` renders `12,500`.
    #[serde(default)]
    pub separator: Option<char>,
    /// Digits after the decimal point.
    #[serde(default)]
    pub decimals: usize,
}

impl CounterFormat {
    /// Render `value` with the configured precision and decorations.
    pub fn render(&self, value: f64) -> String {
        let fixed = format!("{:.*}", self.decimals, value);
        let (sign, unsigned) = match fixed.strip_prefix('-') {
            Some(rest) => ("-", rest),
            None => ("", fixed.as_str()),
        };
        let (int_part, frac_part) = match unsigned.split_once('.') {
            Some((i, f)) => (i, Some(f)),
            None => (unsigned, None),
        };

        let mut out = String::with_capacity(fixed.len() + self.prefix.len() + self.suffix.len() + 4);
        out.push_str(&self.prefix);
        out.push_str(sign);
        match self.separator {
            Some(sep) => {
                for (i, ch) in int_part.chars().enumerate() {
                    if i > 0 && (int_part.len() - i) % 3 == 0 {
                        out.push(sep);
                    }
                    out.push(ch);
                }
            }
            None => out.push_str(int_part),
        }
        if let Some(frac) = frac_part {
            out.push('.');
            out.push_str(frac);
        }
        out.push_str(&self.suffix);
        out
    }

    /// Cut an in-flight value down to the displayed precision, rounding
    /// toward `start` so a running counter never shows a value it has not
    /// reached yet.
    pub fn truncate_toward(&self, value: f64, start: f64) -> f64 {
        let scale = 10f64.powi(self.decimals.min(15) as i32);
        let scaled = value * scale;
        let cut = if value >= start {
            scaled.floor()
        } else {
            scaled.ceil()
        };
        cut / scale
    }
}

/// Parse the number shown in a counter's text, ignoring decorations such
/// as `$`, `+` or thousands separators.
pub fn parse_counter_text(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    cleaned.parse().ok().filter(|v: &f64| v.is_finite())
}

/// What plays when an element is triggered.
#[derive(Debug, Clone, PartialEq)]
pub enum AnimationKind {
    /// Add a class and let CSS transitions do the motion.
    FadeIn { class: String },
    /// Count the element's text up from zero to `target`.
    Counter {
        target: f64,
        duration_ms: f64,
        format: CounterFormat,
    },
    /// Interpolate numeric properties to `targets`.
    Property {
        targets: Vec<PropertyTarget>,
        duration_ms: f64,
        easing: Easing,
    },
}

/// An element registered for one-shot playback.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimatableElement {
    pub id: ElementId,
    pub kind: AnimationKind,
    pub options: ObserveOptions,
    /// Delay between becoming visible and starting playback.
    pub delay_ms: f64,
}

impl AnimatableElement {
    pub fn new(id: ElementId, kind: AnimationKind) -> Self {
        Self {
            id,
            kind,
            options: ObserveOptions::default(),
            delay_ms: 0.0,
        }
    }

    pub fn with_options(mut self, options: ObserveOptions) -> Self {
        self.options = options.sanitized();
        self
    }

    pub fn with_delay(mut self, delay_ms: f64) -> Self {
        self.delay_ms = super::sanitize_duration(delay_ms, 0.0);
        self
    }
}
