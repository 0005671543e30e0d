//! Host capabilities consumed by the engine.
//!
//! The engine never touches a page directly. Everything it needs from the
//! environment (element access, timers, repaint callbacks, viewport
//! intersection) goes through the traits below, bundled in a [`Host`].
//!
//! Two implementations ship with the crate:
//!
//! - [`VirtualHost`]: deterministic in-memory page with a virtual clock,
//!   used for tests and offline replays
//! - `WebHost` (wasm32 only): `web-sys` bindings for a real browser page

mod virtual_host;

use std::rc::Rc;

use crate::schema::{ElementId, ObserveOptions};

pub use virtual_host::VirtualHost;

/// Handle returned by [`Clock::set_timeout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub u64);

/// Handle returned by [`FramePrimitive::request_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub u64);

/// Handle returned by [`Dom::add_scroll_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(pub u64);

/// Callback run before the next repaint with the frame timestamp (ms).
pub type FrameCallback = Box<dyn FnOnce(f64)>;

/// Callback receiving batches of intersection changes.
pub type IntersectionCallback = Rc<dyn Fn(&[IntersectionEntry])>;

/// Element access and page-level queries.
///
/// Lookups never fail loudly: a selector that matches nothing yields an
/// empty list and reads of a missing element yield `None`.
pub trait Dom {
    /// All elements matching `selector`, in document order.
    fn find(&self, selector: &str) -> Vec<ElementId>;

    /// First element matching `selector`.
    fn find_one(&self, selector: &str) -> Option<ElementId> {
        self.find(selector).into_iter().next()
    }

    /// Whether `element` is still in the document.
    fn contains(&self, element: ElementId) -> bool;

    /// Current numeric value of a property, if the element has one.
    fn read_property(&self, element: ElementId, name: &str) -> Option<f64>;

    /// Write a numeric property, appending `unit` when rendering it.
    fn write_property(
        &self,
        element: ElementId,
        name: &str,
        value: f64,
        unit: &str,
    ) -> Result<(), HostError>;

    fn read_text(&self, element: ElementId) -> Option<String>;

    fn write_text(&self, element: ElementId, text: &str) -> Result<(), HostError>;

    fn add_class(&self, element: ElementId, class: &str) -> Result<(), HostError>;

    fn remove_class(&self, element: ElementId, class: &str) -> Result<(), HostError>;

    /// Vertical scroll offset of the page in pixels.
    fn scroll_offset(&self) -> f64;

    /// Call `handler` on every scroll event.
    fn add_scroll_listener(&self, handler: Rc<dyn Fn()>) -> ListenerHandle;

    /// Detach a scroll listener. Unknown handles are ignored.
    fn remove_listener(&self, handle: ListenerHandle);

    /// Whether the user asked for reduced motion.
    fn prefers_reduced_motion(&self) -> bool;
}

/// Time source and deferred callbacks.
pub trait Clock {
    /// Monotonic time in milliseconds.
    fn now(&self) -> f64;

    fn set_timeout(&self, callback: Box<dyn FnOnce()>, delay_ms: f64) -> TimerHandle;

    /// Cancel a pending timeout. Already fired or unknown handles are ignored.
    fn clear_timeout(&self, handle: TimerHandle);
}

/// "Run this before the next repaint".
///
/// Callbacks requested during the same turn run in request order, each
/// exactly once, with non-decreasing timestamps.
pub trait FramePrimitive {
    fn request_frame(&self, callback: FrameCallback) -> FrameHandle;

    fn cancel_frame(&self, handle: FrameHandle);
}

/// One visibility change reported by the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntersectionEntry {
    pub element: ElementId,
    /// Visible fraction of the element's area in [0, 1].
    pub ratio: f64,
    pub is_intersecting: bool,
}

/// Viewport intersection primitive.
///
/// A connection is opened per set of options; the callback receives every
/// change for the elements observed on that connection.
pub trait IntersectionPrimitive {
    fn connect(
        &self,
        options: &ObserveOptions,
        callback: IntersectionCallback,
    ) -> Box<dyn IntersectionConnection>;
}

/// A live intersection observer.
pub trait IntersectionConnection {
    fn observe(&self, element: ElementId);

    fn unobserve(&self, element: ElementId);

    /// Stop all reporting on this connection.
    fn disconnect(&self);
}

/// Capabilities available to the engine.
///
/// Frame scheduling and viewport intersection are optional; without them
/// the manager falls back to applying final states immediately.
#[derive(Clone)]
pub struct Host {
    pub dom: Rc<dyn Dom>,
    pub clock: Rc<dyn Clock>,
    pub frames: Option<Rc<dyn FramePrimitive>>,
    pub intersection: Option<Rc<dyn IntersectionPrimitive>>,
}

impl Host {
    /// Build a host where every capability is served by `virtual_host`.
    pub fn from_virtual(virtual_host: &Rc<VirtualHost>) -> Self {
        Self {
            dom: virtual_host.clone(),
            clock: virtual_host.clone(),
            frames: Some(virtual_host.clone()),
            intersection: Some(virtual_host.clone()),
        }
    }

    /// Names of the capabilities this host lacks.
    pub fn missing_capabilities(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.frames.is_none() {
            missing.push("frame scheduling");
        }
        if self.intersection.is_none() {
            missing.push("viewport intersection");
        }
        missing
    }
}

/// Errors reported by host mutations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HostError {
    #[error("Element {0} is not in the document")]
    MissingElement(ElementId),
    #[error("Element {element} does not support {what}")]
    Unsupported {
        element: ElementId,
        what: &'static str,
    },
    #[error("Host call failed: {0}")]
    Js(String),
}
