//! Timing module - Easing curves, rate limiters and frame scheduling.

pub mod easing;
mod rate_limit;
mod scheduler;

pub use easing::Easing;
pub use rate_limit::{Debounced, Throttled, debounce, throttle};
pub use scheduler::FrameScheduler;
