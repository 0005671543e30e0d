//! Scroll-driven class toggles.

use log::{debug, warn};

use crate::host::Dom;
use crate::schema::ElementId;

/// One registered threshold and its last known state.
#[derive(Debug, Clone, PartialEq)]
struct ScrollThreshold {
    element: ElementId,
    threshold_px: f64,
    class: String,
    active: bool,
}

/// A state change produced by [`ScrollEffects::update`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollTransition {
    /// Index returned by [`ScrollEffects::register`].
    pub index: usize,
    pub element: ElementId,
    pub offset: f64,
    /// New state: `true` once the page is past the threshold.
    pub active: bool,
}

/// Two-state machines toggling a class when the page scrolls past a
/// pixel offset.
///
/// Transitions are edge triggered: the class is written only when the
/// state flips, never on every sample. A sample exactly at the threshold
/// counts as "not past".
#[derive(Debug, Clone, Default)]
pub struct ScrollEffects {
    thresholds: Vec<ScrollThreshold>,
}

impl ScrollEffects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle `class` on `element` while the offset exceeds `threshold_px`.
    ///
    /// A non-finite threshold is replaced by 0.
    pub fn register(&mut self, element: ElementId, threshold_px: f64, class: &str) -> usize {
        let threshold_px = if threshold_px.is_finite() {
            threshold_px
        } else {
            warn!("scroll threshold {threshold_px} for '{class}' is not finite, using 0");
            0.0
        };
        self.thresholds.push(ScrollThreshold {
            element,
            threshold_px,
            class: class.to_string(),
            active: false,
        });
        self.thresholds.len() - 1
    }

    /// Feed one (already rate-limited) scroll sample.
    pub fn update(&mut self, dom: &dyn Dom, offset: f64) -> Vec<ScrollTransition> {
        let mut transitions = Vec::new();
        for (index, threshold) in self.thresholds.iter_mut().enumerate() {
            let past = offset > threshold.threshold_px;
            if past == threshold.active {
                continue;
            }
            threshold.active = past;

            let result = if past {
                dom.add_class(threshold.element, &threshold.class)
            } else {
                dom.remove_class(threshold.element, &threshold.class)
            };
            if let Err(e) = result {
                warn!("scroll effect '{}' not applied: {e}", threshold.class);
            }

            debug!(
                "scroll {offset}px: '{}' on {} -> {}",
                threshold.class, threshold.element, past
            );
            transitions.push(ScrollTransition {
                index,
                element: threshold.element,
                offset,
                active: past,
            });
        }
        transitions
    }

    pub fn is_active(&self, index: usize) -> Option<bool> {
        self.thresholds.get(index).map(|t| t.active)
    }

    pub fn len(&self) -> usize {
        self.thresholds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }
}
