//! Debounce and throttle wrappers over a [`Clock`].
//!
//! Both wrappers are single-threaded handles (`Rc`) and cheap to clone.
//! Pending timers hold only weak references, so dropping every handle
//! turns any scheduled call into a no-op.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use log::debug;

use crate::host::{Clock, TimerHandle};

type Callback<A> = RefCell<Box<dyn FnMut(A)>>;

fn invoke<A>(func: &Callback<A>, arg: A) {
    match func.try_borrow_mut() {
        Ok(mut f) => f(arg),
        Err(_) => debug!("re-entrant rate-limited call dropped"),
    }
}

struct DebounceInner<A> {
    clock: Rc<dyn Clock>,
    func: Callback<A>,
    wait_ms: f64,
    immediate: bool,
    pending: Cell<Option<TimerHandle>>,
    latest: RefCell<Option<A>>,
}

/// Handle returned by [`debounce`].
pub struct Debounced<A> {
    inner: Rc<DebounceInner<A>>,
}

impl<A> Clone for Debounced<A> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Run `func` at most once per quiet period of `wait_ms`.
///
/// Every call restarts the quiet period. With `immediate = false` the
/// last call's argument runs when the period ends (trailing edge); with
/// `immediate = true` the first call of an idle period runs synchronously
/// and the end of the period fires nothing (leading edge).
pub fn debounce<A: 'static>(
    clock: Rc<dyn Clock>,
    func: impl FnMut(A) + 'static,
    wait_ms: f64,
    immediate: bool,
) -> Debounced<A> {
    Debounced {
        inner: Rc::new(DebounceInner {
            clock,
            func: RefCell::new(Box::new(func)),
            wait_ms: wait_ms.max(0.0),
            immediate,
            pending: Cell::new(None),
            latest: RefCell::new(None),
        }),
    }
}

impl<A: 'static> Debounced<A> {
    pub fn call(&self, arg: A) {
        let inner = &self.inner;
        let call_now = inner.immediate && inner.pending.get().is_none();
        if let Some(handle) = inner.pending.take() {
            inner.clock.clear_timeout(handle);
        }

        let weak: Weak<DebounceInner<A>> = Rc::downgrade(inner);
        let handle = inner.clock.set_timeout(
            Box::new(move || {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                inner.pending.set(None);
                if inner.immediate {
                    return;
                }
                let latest = inner.latest.borrow_mut().take();
                if let Some(arg) = latest {
                    invoke(&inner.func, arg);
                }
            }),
            inner.wait_ms,
        );
        inner.pending.set(Some(handle));

        if inner.immediate {
            if call_now {
                invoke(&inner.func, arg);
            }
        } else {
            *inner.latest.borrow_mut() = Some(arg);
        }
    }

    /// Whether a quiet period is currently running.
    pub fn is_pending(&self) -> bool {
        self.inner.pending.get().is_some()
    }

    /// Drop the pending call, if any.
    pub fn cancel(&self) {
        if let Some(handle) = self.inner.pending.take() {
            self.inner.clock.clear_timeout(handle);
        }
        self.inner.latest.borrow_mut().take();
    }
}

struct ThrottleInner<A> {
    clock: Rc<dyn Clock>,
    func: Callback<A>,
    limit_ms: f64,
    cooldown: Cell<Option<TimerHandle>>,
}

/// Handle returned by [`throttle`].
pub struct Throttled<A> {
    inner: Rc<ThrottleInner<A>>,
}

impl<A> Clone for Throttled<A> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Run `func` at most once per `limit_ms` window.
///
/// The call that opens a window always runs; calls inside the window are
/// dropped. Leading edge only.
pub fn throttle<A: 'static>(
    clock: Rc<dyn Clock>,
    func: impl FnMut(A) + 'static,
    limit_ms: f64,
) -> Throttled<A> {
    Throttled {
        inner: Rc::new(ThrottleInner {
            clock,
            func: RefCell::new(Box::new(func)),
            limit_ms: limit_ms.max(0.0),
            cooldown: Cell::new(None),
        }),
    }
}

impl<A: 'static> Throttled<A> {
    /// Returns whether the wrapped function ran.
    pub fn call(&self, arg: A) -> bool {
        let inner = &self.inner;
        if inner.cooldown.get().is_some() {
            return false;
        }

        let weak: Weak<ThrottleInner<A>> = Rc::downgrade(inner);
        let handle = inner.clock.set_timeout(
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.cooldown.set(None);
                }
            }),
            inner.limit_ms,
        );
        inner.cooldown.set(Some(handle));
        invoke(&inner.func, arg);
        true
    }

    pub fn is_cooling_down(&self) -> bool {
        self.inner.cooldown.get().is_some()
    }

    /// End the current window early without running anything.
    pub fn cancel(&self) {
        if let Some(handle) = self.inner.cooldown.take() {
            self.inner.clock.clear_timeout(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::VirtualHost;

    fn recorder<A: Clone + 'static>(
        host: &Rc<VirtualHost>,
    ) -> (Rc<RefCell<Vec<(f64, A)>>>, impl FnMut(A) + 'static) {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let c = calls.clone();
        let clock = host.clone();
        (calls, move |arg: A| c.borrow_mut().push((clock.now(), arg)))
    }

    #[test]
    fn test_throttle_one_call_per_window() {
        let host = Rc::new(VirtualHost::new());
        let (calls, f) = recorder::<u32>(&host);
        let throttled = throttle(host.clone(), f, 100.0);

        for i in 0..10 {
            throttled.call(i);
            host.advance(10.0);
        }
        assert_eq!(calls.borrow().len(), 1);
        assert_eq!(calls.borrow()[0], (0.0, 0));

        // The window closed at t=100; the next call opens a new one.
        assert!(throttled.call(10));
        assert_eq!(calls.borrow().len(), 2);
        assert_eq!(calls.borrow()[1], (100.0, 10));
    }

    #[test]
    fn test_debounce_trailing_edge() {
        let host = Rc::new(VirtualHost::new());
        let (calls, f) = recorder::<&'static str>(&host);
        let debounced = debounce(host.clone(), f, 200.0, false);

        debounced.call("t0");
        host.advance(50.0);
        debounced.call("t50");
        host.advance(50.0);
        debounced.call("t100");

        host.advance(199.0);
        assert!(calls.borrow().is_empty());
        host.advance(1.0);
        assert_eq!(*calls.borrow(), vec![(300.0, "t100")]);

        host.advance(1000.0);
        assert_eq!(calls.borrow().len(), 1);
        assert!(!debounced.is_pending());
    }

    #[test]
    fn test_debounce_leading_edge() {
        let host = Rc::new(VirtualHost::new());
        let (calls, f) = recorder::<u32>(&host);
        let debounced = debounce(host.clone(), f, 200.0, true);

        debounced.call(1);
        host.advance(50.0);
        debounced.call(2);
        host.advance(50.0);
        debounced.call(3);
        assert_eq!(*calls.borrow(), vec![(0.0, 1)]);

        // Quiet period ends at 300 without a trailing call.
        host.advance(250.0);
        assert_eq!(calls.borrow().len(), 1);

        debounced.call(4);
        assert_eq!(calls.borrow().len(), 2);
        assert_eq!(calls.borrow()[1], (350.0, 4));
    }

    #[test]
    fn test_cancel_drops_pending_work() {
        let host = Rc::new(VirtualHost::new());
        let (calls, f) = recorder::<u32>(&host);
        let debounced = debounce(host.clone(), f, 100.0, false);
        debounced.call(1);
        debounced.cancel();
        host.advance(500.0);
        assert!(calls.borrow().is_empty());
        assert_eq!(host.pending_timers(), 0);

        let (calls, f) = recorder::<u32>(&host);
        let throttled = throttle(host.clone(), f, 100.0);
        throttled.call(1);
        throttled.cancel();
        assert!(!throttled.is_cooling_down());
        assert!(throttled.call(2));
        assert_eq!(calls.borrow().len(), 2);
    }

    #[test]
    fn test_dropped_debounce_never_fires() {
        let host = Rc::new(VirtualHost::new());
        let (calls, f) = recorder::<u32>(&host);
        let debounced = debounce(host.clone(), f, 100.0, false);
        debounced.call(1);
        drop(debounced);
        host.advance(200.0);
        assert!(calls.borrow().is_empty());
    }
}
