//! Deterministic in-memory host.
//!
//! Time only moves when [`VirtualHost::advance`] is called, frames only run
//! when [`VirtualHost::run_frame`] is called, and scroll/visibility changes
//! are scripted. No `RefCell` borrow is held while a callback runs, so
//! callbacks may freely schedule more work.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::rc::Rc;

use super::{
    Clock, Dom, FrameCallback, FrameHandle, FramePrimitive, HostError, IntersectionCallback,
    IntersectionConnection, IntersectionEntry, IntersectionPrimitive, ListenerHandle, TimerHandle,
};
use crate::schema::{ElementId, ObserveOptions};

struct VirtualElement {
    selector: String,
    classes: BTreeSet<String>,
    properties: HashMap<String, f64>,
    text: String,
    attached: bool,
}

impl VirtualElement {
    fn matches(&self, selector: &str) -> bool {
        if !self.attached {
            return false;
        }
        if self.selector == selector {
            return true;
        }
        selector
            .strip_prefix('.')
            .is_some_and(|class| self.classes.contains(class))
    }
}

struct PendingTimer {
    handle: TimerHandle,
    fire_at: f64,
    callback: Box<dyn FnOnce()>,
}

struct VirtualConnection {
    options: ObserveOptions,
    callback: IntersectionCallback,
    observed: RefCell<BTreeSet<ElementId>>,
    connected: Cell<bool>,
}

struct ConnectionHandle(Rc<VirtualConnection>);

impl IntersectionConnection for ConnectionHandle {
    fn observe(&self, element: ElementId) {
        if self.0.connected.get() {
            self.0.observed.borrow_mut().insert(element);
        }
    }

    fn unobserve(&self, element: ElementId) {
        self.0.observed.borrow_mut().remove(&element);
    }

    fn disconnect(&self) {
        self.0.connected.set(false);
        self.0.observed.borrow_mut().clear();
    }
}

#[derive(Default)]
struct VirtualState {
    now: f64,
    next_handle: u64,
    elements: Vec<VirtualElement>,
    property_history: HashMap<(ElementId, String), Vec<f64>>,
    scroll: f64,
    listeners: Vec<(ListenerHandle, Rc<dyn Fn()>)>,
    timers: Vec<PendingTimer>,
    frames: VecDeque<(FrameHandle, FrameCallback)>,
    in_flight: HashSet<FrameHandle>,
    cancelled: HashSet<FrameHandle>,
    frames_requested: u64,
    frames_run: u64,
    connections: Vec<Rc<VirtualConnection>>,
}

impl VirtualState {
    fn next_handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn element(&self, id: ElementId) -> Option<&VirtualElement> {
        self.elements.get(id.0 as usize).filter(|e| e.attached)
    }

    fn element_mut(&mut self, id: ElementId) -> Result<&mut VirtualElement, HostError> {
        self.elements
            .get_mut(id.0 as usize)
            .filter(|e| e.attached)
            .ok_or(HostError::MissingElement(id))
    }
}

/// In-memory page with a virtual clock.
///
/// ```
/// use std::rc::Rc;
/// use motion_trigger::host::{Dom, VirtualHost};
///
/// let host = Rc::new(VirtualHost::new());
/// let card = host.add_element(".card");
/// assert_eq!(host.find(".card"), vec![card]);
/// ```
#[derive(Default)]
pub struct VirtualHost {
    state: RefCell<VirtualState>,
    reduced_motion: Cell<bool>,
}

impl VirtualHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle the reduced-motion media query.
    pub fn set_reduced_motion(&self, reduced: bool) {
        self.reduced_motion.set(reduced);
    }

    /// Append an element matched by `selector`. A `.class` selector also
    /// gives the element that class.
    pub fn add_element(&self, selector: &str) -> ElementId {
        let mut state = self.state.borrow_mut();
        let id = ElementId(state.elements.len() as u64);
        let mut classes = BTreeSet::new();
        if let Some(class) = selector.strip_prefix('.') {
            classes.insert(class.to_string());
        }
        state.elements.push(VirtualElement {
            selector: selector.to_string(),
            classes,
            properties: HashMap::new(),
            text: String::new(),
            attached: true,
        });
        id
    }

    /// Remove an element from the document; later writes fail.
    pub fn detach(&self, element: ElementId) {
        if let Some(e) = self.state.borrow_mut().elements.get_mut(element.0 as usize) {
            e.attached = false;
        }
    }

    pub fn set_text(&self, element: ElementId, text: &str) {
        if let Ok(e) = self.state.borrow_mut().element_mut(element) {
            e.text = text.to_string();
        }
    }

    pub fn set_property(&self, element: ElementId, name: &str, value: f64) {
        if let Ok(e) = self.state.borrow_mut().element_mut(element) {
            e.properties.insert(name.to_string(), value);
        }
    }

    pub fn has_class(&self, element: ElementId, class: &str) -> bool {
        self.state
            .borrow()
            .element(element)
            .is_some_and(|e| e.classes.contains(class))
    }

    pub fn property(&self, element: ElementId, name: &str) -> Option<f64> {
        self.read_property(element, name)
    }

    pub fn text(&self, element: ElementId) -> Option<String> {
        self.read_text(element)
    }

    /// Every value written to `name` on `element`, oldest first.
    pub fn property_history(&self, element: ElementId, name: &str) -> Vec<f64> {
        self.state
            .borrow()
            .property_history
            .get(&(element, name.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// Move the page and notify scroll listeners.
    pub fn scroll_to(&self, offset: f64) {
        let listeners: Vec<Rc<dyn Fn()>> = {
            let mut state = self.state.borrow_mut();
            state.scroll = offset;
            state.listeners.iter().map(|(_, l)| l.clone()).collect()
        };
        for listener in listeners {
            listener();
        }
    }

    /// Report a new visible ratio for `element` to every connection
    /// observing it.
    pub fn set_visibility(&self, element: ElementId, ratio: f64) {
        let targets: Vec<Rc<VirtualConnection>> = self
            .state
            .borrow()
            .connections
            .iter()
            .filter(|c| c.connected.get() && c.observed.borrow().contains(&element))
            .cloned()
            .collect();
        let entry = IntersectionEntry {
            element,
            ratio,
            is_intersecting: ratio > 0.0,
        };
        for connection in targets {
            (connection.callback)(&[entry]);
        }
    }

    /// Options of every live intersection connection.
    pub fn connection_options(&self) -> Vec<ObserveOptions> {
        self.state
            .borrow()
            .connections
            .iter()
            .filter(|c| c.connected.get())
            .map(|c| c.options.clone())
            .collect()
    }

    /// Connections still held by the host, including disconnected ones not
    /// yet pruned.
    pub fn connection_count(&self) -> usize {
        self.state.borrow().connections.len()
    }

    /// Number of elements observed across live connections.
    pub fn observed_count(&self) -> usize {
        self.state
            .borrow()
            .connections
            .iter()
            .filter(|c| c.connected.get())
            .map(|c| c.observed.borrow().len())
            .sum()
    }

    pub fn listener_count(&self) -> usize {
        self.state.borrow().listeners.len()
    }

    pub fn pending_timers(&self) -> usize {
        self.state.borrow().timers.len()
    }

    pub fn pending_frames(&self) -> usize {
        self.state.borrow().frames.len()
    }

    /// Total frame requests since creation.
    pub fn frames_requested(&self) -> u64 {
        self.state.borrow().frames_requested
    }

    /// Total frame callbacks run since creation.
    pub fn frames_run(&self) -> u64 {
        self.state.borrow().frames_run
    }

    /// Move the clock forward by `ms`, firing due timers in order.
    pub fn advance(&self, ms: f64) {
        let target = self.state.borrow().now + ms.max(0.0);
        loop {
            let due = {
                let mut state = self.state.borrow_mut();
                let next = state
                    .timers
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.fire_at <= target)
                    .min_by(|(_, a), (_, b)| {
                        a.fire_at
                            .total_cmp(&b.fire_at)
                            .then(a.handle.0.cmp(&b.handle.0))
                    })
                    .map(|(i, _)| i);
                next.map(|i| {
                    let timer = state.timers.remove(i);
                    state.now = state.now.max(timer.fire_at);
                    timer.callback
                })
            };
            match due {
                Some(callback) => callback(),
                None => break,
            }
        }
        self.state.borrow_mut().now = target;
    }

    /// Run every frame callback requested before this call with the
    /// current time as timestamp. Returns how many ran.
    pub fn run_frame(&self) -> usize {
        let (batch, timestamp) = {
            let mut state = self.state.borrow_mut();
            let batch = std::mem::take(&mut state.frames);
            state.in_flight = batch.iter().map(|(h, _)| *h).collect();
            (batch, state.now)
        };

        let mut ran = 0;
        for (handle, callback) in batch {
            let skip = {
                let mut state = self.state.borrow_mut();
                state.in_flight.remove(&handle);
                state.cancelled.remove(&handle)
            };
            if skip {
                continue;
            }
            self.state.borrow_mut().frames_run += 1;
            callback(timestamp);
            ran += 1;
        }
        ran
    }

    /// Advance by `frame_ms` and run a frame, `count` times.
    pub fn step_frames(&self, count: usize, frame_ms: f64) {
        for _ in 0..count {
            self.advance(frame_ms);
            self.run_frame();
        }
    }

    /// Step frames until no frame or timer is pending, up to `max_frames`.
    /// Returns the number of frames stepped.
    pub fn run_until_idle(&self, frame_ms: f64, max_frames: usize) -> usize {
        let mut stepped = 0;
        while stepped < max_frames && (self.pending_frames() > 0 || self.pending_timers() > 0) {
            self.advance(frame_ms);
            self.run_frame();
            stepped += 1;
        }
        stepped
    }
}

impl Dom for VirtualHost {
    fn find(&self, selector: &str) -> Vec<ElementId> {
        self.state
            .borrow()
            .elements
            .iter()
            .enumerate()
            .filter(|(_, e)| e.matches(selector))
            .map(|(i, _)| ElementId(i as u64))
            .collect()
    }

    fn contains(&self, element: ElementId) -> bool {
        self.state.borrow().element(element).is_some()
    }

    fn read_property(&self, element: ElementId, name: &str) -> Option<f64> {
        self.state
            .borrow()
            .element(element)
            .and_then(|e| e.properties.get(name).copied())
    }

    fn write_property(
        &self,
        element: ElementId,
        name: &str,
        value: f64,
        _unit: &str,
    ) -> Result<(), HostError> {
        let mut state = self.state.borrow_mut();
        state
            .element_mut(element)?
            .properties
            .insert(name.to_string(), value);
        state
            .property_history
            .entry((element, name.to_string()))
            .or_default()
            .push(value);
        Ok(())
    }

    fn read_text(&self, element: ElementId) -> Option<String> {
        self.state.borrow().element(element).map(|e| e.text.clone())
    }

    fn write_text(&self, element: ElementId, text: &str) -> Result<(), HostError> {
        self.state.borrow_mut().element_mut(element)?.text = text.to_string();
        Ok(())
    }

    fn add_class(&self, element: ElementId, class: &str) -> Result<(), HostError> {
        self.state
            .borrow_mut()
            .element_mut(element)?
            .classes
            .insert(class.to_string());
        Ok(())
    }

    fn remove_class(&self, element: ElementId, class: &str) -> Result<(), HostError> {
        self.state
            .borrow_mut()
            .element_mut(element)?
            .classes
            .remove(class);
        Ok(())
    }

    fn scroll_offset(&self) -> f64 {
        self.state.borrow().scroll
    }

    fn add_scroll_listener(&self, handler: Rc<dyn Fn()>) -> ListenerHandle {
        let mut state = self.state.borrow_mut();
        let handle = ListenerHandle(state.next_handle());
        state.listeners.push((handle, handler));
        handle
    }

    fn remove_listener(&self, handle: ListenerHandle) {
        self.state
            .borrow_mut()
            .listeners
            .retain(|(h, _)| *h != handle);
    }

    fn prefers_reduced_motion(&self) -> bool {
        self.reduced_motion.get()
    }
}

impl Clock for VirtualHost {
    fn now(&self) -> f64 {
        self.state.borrow().now
    }

    fn set_timeout(&self, callback: Box<dyn FnOnce()>, delay_ms: f64) -> TimerHandle {
        let mut state = self.state.borrow_mut();
        let handle = TimerHandle(state.next_handle());
        let fire_at = state.now + delay_ms.max(0.0);
        state.timers.push(PendingTimer {
            handle,
            fire_at,
            callback,
        });
        handle
    }

    fn clear_timeout(&self, handle: TimerHandle) {
        self.state.borrow_mut().timers.retain(|t| t.handle != handle);
    }
}

impl FramePrimitive for VirtualHost {
    fn request_frame(&self, callback: FrameCallback) -> FrameHandle {
        let mut state = self.state.borrow_mut();
        let handle = FrameHandle(state.next_handle());
        state.frames_requested += 1;
        state.frames.push_back((handle, callback));
        handle
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        let mut state = self.state.borrow_mut();
        let before = state.frames.len();
        state.frames.retain(|(h, _)| *h != handle);
        if state.frames.len() == before && state.in_flight.contains(&handle) {
            state.cancelled.insert(handle);
        }
    }
}

impl IntersectionPrimitive for VirtualHost {
    fn connect(
        &self,
        options: &ObserveOptions,
        callback: IntersectionCallback,
    ) -> Box<dyn IntersectionConnection> {
        let connection = Rc::new(VirtualConnection {
            options: options.clone(),
            callback,
            observed: RefCell::new(BTreeSet::new()),
            connected: Cell::new(true),
        });
        let mut state = self.state.borrow_mut();
        state.connections.retain(|c| c.connected.get());
        state.connections.push(connection.clone());
        Box::new(ConnectionHandle(connection))
    }
}
