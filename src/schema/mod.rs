//! Schema module - Configuration and element description types.

mod config;
mod element;

pub use config::*;
pub use element::*;
