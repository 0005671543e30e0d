//! Trigger module - Deciding when one-shot and scroll effects fire.

mod scroll;
mod tracker;
mod visibility;

pub use scroll::*;
pub use tracker::*;
pub use visibility::*;
