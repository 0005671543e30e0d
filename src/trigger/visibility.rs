//! Visibility observer over the host intersection primitive.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use log::debug;

use crate::host::{IntersectionConnection, IntersectionEntry, IntersectionPrimitive};
use crate::schema::{ElementId, ObserveOptions};

/// Browsers report ratios such as 0.9999 for a fully visible element.
const RATIO_TOLERANCE: f64 = 1e-3;

/// Callback invoked with an element that became visible.
pub type VisibleCallback = Rc<dyn Fn(ElementId)>;

struct Subscription {
    options: ObserveOptions,
    fired: bool,
}

#[derive(Default)]
struct ObserverState {
    subscriptions: HashMap<ElementId, Subscription>,
    connections: Vec<(ObserveOptions, Rc<dyn IntersectionConnection>)>,
    callbacks: Vec<VisibleCallback>,
    disconnected: bool,
}

impl ObserverState {
    fn connection_for(&self, options: &ObserveOptions) -> Option<Rc<dyn IntersectionConnection>> {
        self.connections
            .iter()
            .find(|(o, _)| o == options)
            .map(|(_, c)| c.clone())
    }
}

/// Reports "became sufficiently visible" once per element per `observe`.
///
/// This is a plain event source: it does not know whether an element was
/// already animated. Elements sharing the same options share one host
/// connection.
pub struct VisibilityObserver {
    primitive: Rc<dyn IntersectionPrimitive>,
    state: Rc<RefCell<ObserverState>>,
}

impl VisibilityObserver {
    pub fn new(primitive: Rc<dyn IntersectionPrimitive>) -> Self {
        Self {
            primitive,
            state: Rc::new(RefCell::new(ObserverState::default())),
        }
    }

    /// Register a callback for visibility events.
    pub fn on_visible(&self, callback: impl Fn(ElementId) + 'static) {
        let mut state = self.state.borrow_mut();
        if state.disconnected {
            debug!("visibility callback registered after disconnect");
            return;
        }
        state.callbacks.push(Rc::new(callback));
    }

    /// Start watching `element`. Observing an element again re-arms it.
    pub fn observe(&self, element: ElementId, options: &ObserveOptions) -> Result<(), ObserverError> {
        let options = options.clone().sanitized();
        let (previous, existing) = {
            let state = self.state.borrow();
            if state.disconnected {
                return Err(ObserverError::Disconnected);
            }
            let previous = state
                .subscriptions
                .get(&element)
                .filter(|s| s.options != options)
                .and_then(|s| state.connection_for(&s.options));
            (previous, state.connection_for(&options))
        };

        if let Some(old) = previous {
            old.unobserve(element);
        }

        let connection = match existing {
            Some(connection) => connection,
            None => {
                let weak = Rc::downgrade(&self.state);
                let connection: Rc<dyn IntersectionConnection> = Rc::from(self.primitive.connect(
                    &options,
                    Rc::new(move |entries: &[IntersectionEntry]| handle_entries(&weak, entries)),
                ));
                self.state
                    .borrow_mut()
                    .connections
                    .push((options.clone(), connection.clone()));
                connection
            }
        };

        self.state.borrow_mut().subscriptions.insert(
            element,
            Subscription {
                options,
                fired: false,
            },
        );
        connection.observe(element);
        Ok(())
    }

    /// Stop watching `element`. Returns whether it was observed.
    pub fn unobserve(&self, element: ElementId) -> bool {
        let connection = {
            let mut state = self.state.borrow_mut();
            let Some(subscription) = state.subscriptions.remove(&element) else {
                return false;
            };
            state.connection_for(&subscription.options)
        };
        if let Some(connection) = connection {
            connection.unobserve(element);
        }
        true
    }

    /// Release every subscription and stop all callbacks for good.
    pub fn disconnect(&self) {
        let connections = {
            let mut state = self.state.borrow_mut();
            if state.disconnected {
                return;
            }
            state.disconnected = true;
            state.subscriptions.clear();
            state.callbacks.clear();
            std::mem::take(&mut state.connections)
        };
        for (_, connection) in connections {
            connection.disconnect();
        }
    }

    pub fn is_observing(&self, element: ElementId) -> bool {
        self.state.borrow().subscriptions.contains_key(&element)
    }

    pub fn observed_count(&self) -> usize {
        self.state.borrow().subscriptions.len()
    }

    pub fn is_disconnected(&self) -> bool {
        self.state.borrow().disconnected
    }
}

fn handle_entries(state: &Weak<RefCell<ObserverState>>, entries: &[IntersectionEntry]) {
    let Some(state) = state.upgrade() else {
        return;
    };

    let (visible, callbacks) = {
        let mut guard = state.borrow_mut();
        if guard.disconnected {
            return;
        }
        let mut visible = Vec::new();
        for entry in entries {
            let Some(subscription) = guard.subscriptions.get_mut(&entry.element) else {
                continue;
            };
            if subscription.fired || !entry.is_intersecting {
                continue;
            }
            if entry.ratio + RATIO_TOLERANCE >= subscription.options.threshold {
                subscription.fired = true;
                visible.push(entry.element);
            }
        }
        (visible, guard.callbacks.clone())
    };

    for element in visible {
        for callback in &callbacks {
            if state.borrow().disconnected {
                return;
            }
            callback(element);
        }
    }
}

/// Errors from a visibility observer.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ObserverError {
    #[error("Visibility observer is disconnected")]
    Disconnected,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::VirtualHost;

    fn setup() -> (Rc<VirtualHost>, VisibilityObserver, Rc<RefCell<Vec<ElementId>>>) {
        let host = Rc::new(VirtualHost::new());
        let observer = VisibilityObserver::new(host.clone());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        observer.on_visible(move |e| s.borrow_mut().push(e));
        (host, observer, seen)
    }

    #[test]
    fn test_fires_once_threshold_is_reached() {
        let (host, observer, seen) = setup();
        let el = host.add_element(".card");
        let options = ObserveOptions {
            threshold: 0.5,
            ..Default::default()
        };
        observer.observe(el, &options).unwrap();

        host.set_visibility(el, 0.2);
        assert!(seen.borrow().is_empty());
        host.set_visibility(el, 0.6);
        host.set_visibility(el, 0.9);
        host.set_visibility(el, 0.0);
        host.set_visibility(el, 0.7);
        assert_eq!(*seen.borrow(), vec![el]);
    }

    #[test]
    fn test_full_threshold_accepts_rounded_ratio() {
        let (host, observer, seen) = setup();
        let el = host.add_element(".card");
        let options = ObserveOptions {
            threshold: 1.0,
            ..Default::default()
        };
        observer.observe(el, &options).unwrap();

        host.set_visibility(el, 0.95);
        assert!(seen.borrow().is_empty());
        host.set_visibility(el, 0.9999);
        assert_eq!(*seen.borrow(), vec![el]);
    }

    #[test]
    fn test_zero_threshold_needs_intersection() {
        let (host, observer, seen) = setup();
        let el = host.add_element(".card");
        let options = ObserveOptions {
            threshold: 0.0,
            ..Default::default()
        };
        observer.observe(el, &options).unwrap();

        host.set_visibility(el, 0.0);
        assert!(seen.borrow().is_empty());
        host.set_visibility(el, 0.01);
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn test_reobserve_rearms() {
        let (host, observer, seen) = setup();
        let el = host.add_element(".card");
        observer.observe(el, &ObserveOptions::default()).unwrap();
        host.set_visibility(el, 1.0);
        observer.observe(el, &ObserveOptions::default()).unwrap();
        host.set_visibility(el, 1.0);
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    fn test_connections_shared_per_options() {
        let (host, observer, _) = setup();
        let a = host.add_element(".a");
        let b = host.add_element(".b");
        let c = host.add_element(".c");
        let tight = ObserveOptions {
            threshold: 0.5,
            root_margin: "0px".to_string(),
        };
        observer.observe(a, &ObserveOptions::default()).unwrap();
        observer.observe(b, &ObserveOptions::default()).unwrap();
        observer.observe(c, &tight).unwrap();
        assert_eq!(host.connection_options().len(), 2);
        assert_eq!(host.observed_count(), 3);

        // Moving an element to other options releases the old subscription.
        observer.observe(a, &tight).unwrap();
        assert_eq!(host.observed_count(), 3);
    }

    #[test]
    fn test_unobserve_stops_reports() {
        let (host, observer, seen) = setup();
        let el = host.add_element(".card");
        observer.observe(el, &ObserveOptions::default()).unwrap();
        assert!(observer.unobserve(el));
        assert!(!observer.unobserve(el));
        host.set_visibility(el, 1.0);
        assert!(seen.borrow().is_empty());
        assert_eq!(host.observed_count(), 0);
    }

    #[test]
    fn test_disconnect_is_final() {
        let (host, observer, seen) = setup();
        let el = host.add_element(".card");
        observer.observe(el, &ObserveOptions::default()).unwrap();
        observer.disconnect();

        host.set_visibility(el, 1.0);
        assert!(seen.borrow().is_empty());
        assert_eq!(host.connection_options().len(), 0);
        assert_eq!(
            observer.observe(el, &ObserveOptions::default()),
            Err(ObserverError::Disconnected)
        );
        assert!(observer.is_disconnected());
    }

    #[test]
    fn test_callback_may_unobserve_reentrantly() {
        let host = Rc::new(VirtualHost::new());
        let observer = Rc::new(VisibilityObserver::new(host.clone()));
        let el = host.add_element(".card");
        let o = Rc::downgrade(&observer);
        observer.on_visible(move |e| {
            if let Some(o) = o.upgrade() {
                o.unobserve(e);
            }
        });
        observer.observe(el, &ObserveOptions::default()).unwrap();
        host.set_visibility(el, 1.0);
        assert!(!observer.is_observing(el));
    }
}
