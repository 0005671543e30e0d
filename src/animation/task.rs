//! In-flight interpolation state.

use crate::schema::{CounterFormat, ElementId};
use crate::timing::Easing;

/// Identifier of a task inside one animator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

/// Where an interpolated value is written.
#[derive(Debug, Clone, PartialEq)]
pub enum Channel {
    /// A numeric style-like property.
    Property { name: String, unit: String },
    /// The element's text, rendered as a counter.
    Text { format: CounterFormat },
}

/// One value moving from `start` to `end`.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub channel: Channel,
    pub start: f64,
    pub end: f64,
}

impl Track {
    /// Value at eased progress `eased`. The end value is exact at 1.0.
    #[inline]
    pub fn value_at(&self, eased: f64) -> f64 {
        if eased >= 1.0 {
            self.end
        } else {
            self.start + (self.end - self.start) * eased
        }
    }
}

/// Result of advancing a task by one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStep {
    /// Linear progress in [0, 1].
    pub progress: f64,
    /// Progress after easing.
    pub eased: f64,
    pub done: bool,
}

/// An interpolation driven one frame at a time.
///
/// The start time is taken from the first frame timestamp, so a task
/// created long before its first frame does not skip ahead.
#[derive(Debug, Clone)]
pub struct AnimationTask {
    id: TaskId,
    element: ElementId,
    tracks: Vec<Track>,
    duration_ms: f64,
    easing: Easing,
    start_time: Option<f64>,
    progress: f64,
}

impl AnimationTask {
    pub fn new(
        id: TaskId,
        element: ElementId,
        tracks: Vec<Track>,
        duration_ms: f64,
        easing: Easing,
    ) -> Self {
        let duration_ms = if duration_ms.is_finite() {
            duration_ms
        } else {
            0.0
        };
        Self {
            id,
            element,
            tracks,
            duration_ms,
            easing,
            start_time: None,
            progress: 0.0,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn element(&self) -> ElementId {
        self.element
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn start_time(&self) -> Option<f64> {
        self.start_time
    }

    /// Advance to `timestamp`.
    ///
    /// Progress never decreases, even if a host reports an older
    /// timestamp. A non-positive duration completes on the first frame.
    pub fn step(&mut self, timestamp: f64) -> FrameStep {
        let start = *self.start_time.get_or_insert(timestamp);
        let raw = if self.duration_ms <= 0.0 {
            1.0
        } else {
            ((timestamp - start) / self.duration_ms).clamp(0.0, 1.0)
        };
        self.progress = self.progress.max(raw);

        let done = self.progress >= 1.0;
        FrameStep {
            progress: self.progress,
            eased: if done {
                1.0
            } else {
                self.easing.apply(self.progress)
            },
            done,
        }
    }
}
