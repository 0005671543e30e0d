//! Animation playback.
//!
//! A playback request becomes an [`AnimationTask`] that the
//! [`PropertyAnimator`] advances once per frame until progress reaches 1.0:
//!
//! ```text
//! request ─► read start values ─► task ─► frame ─► step(timestamp)
//!                                           ▲          │
//!                                           └──────────┤ progress < 1
//!                                                      ▼
//!                                         write exact targets, resolve
//! ```
//!
//! Counters are the same loop with the element text as the output channel.
//! Every request hands back a [`Completion`] that resolves exactly once.

mod completion;
mod player;
mod task;

pub use completion::{Completion, Outcome};
pub use player::PropertyAnimator;
pub use task::{AnimationTask, Channel, FrameStep, TaskId, Track};
