//! Motion Trigger - scroll- and visibility-driven animation playback.
//!
//! Elements are registered with an animation (a reveal class, a number
//! counter, or numeric property tweens). Each plays exactly once, the first
//! time the element becomes sufficiently visible. Scroll effects toggle a
//! class while the page is scrolled past a threshold.
//!
//! # Architecture
//!
//! - `host`: the capabilities the engine needs from a page (`Dom`, `Clock`,
//!   frames, intersection) plus a deterministic [`VirtualHost`]
//! - `timing`: easing curves, debounce/throttle and frame scheduling
//! - `trigger`: visibility observation, the trigger record and scroll effects
//! - `animation`: per-frame interpolation of properties and counters
//! - `manager`: lifecycle that wires everything together
//! - `schema`: configuration and element types
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use motion_trigger::{AnimationManager, Host, ManagerState, MotionConfig, VirtualHost};
//!
//! let page = Rc::new(VirtualHost::new());
//! let card = page.add_element(".fade-in");
//!
//! let mut manager = AnimationManager::new(Host::from_virtual(&page), MotionConfig::default());
//! assert_eq!(manager.start(), Ok(ManagerState::Active));
//!
//! page.set_visibility(card, 0.5);
//! assert!(page.has_class(card, "visible"));
//!
//! manager.dispose().unwrap();
//! ```

pub mod animation;
pub mod host;
pub mod manager;
pub mod schema;
pub mod timing;
pub mod trigger;

// WebAssembly bindings (only for wasm32 target)
#[cfg(target_arch = "wasm32")]
pub mod wasm;

// Re-export commonly used types
pub use animation::{Completion, Outcome, PropertyAnimator};
pub use host::{Host, HostError, VirtualHost};
pub use manager::{AnimationManager, LifecycleError, ManagerState};
pub use schema::{AnimatableElement, AnimationKind, ElementId, MotionConfig, PropertyTarget};
pub use timing::{Easing, debounce, throttle};
