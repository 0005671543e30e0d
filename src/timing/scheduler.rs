//! Frame scheduler adapter.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

use log::debug;

use crate::host::{FrameHandle, FramePrimitive};

struct SchedulerInner {
    primitive: Rc<dyn FramePrimitive>,
    outstanding: RefCell<HashSet<FrameHandle>>,
    shut_down: Cell<bool>,
}

/// Tracks frame requests made through a host [`FramePrimitive`] so they
/// can be cancelled together.
///
/// Once [`shutdown`](FrameScheduler::shutdown) has been called the
/// scheduler refuses new work and callbacks already queued with the host
/// are dropped.
#[derive(Clone)]
pub struct FrameScheduler {
    inner: Rc<SchedulerInner>,
}

impl FrameScheduler {
    pub fn new(primitive: Rc<dyn FramePrimitive>) -> Self {
        Self {
            inner: Rc::new(SchedulerInner {
                primitive,
                outstanding: RefCell::new(HashSet::new()),
                shut_down: Cell::new(false),
            }),
        }
    }

    /// Run `callback` once before the next repaint.
    ///
    /// Returns `None` after shutdown.
    pub fn schedule(&self, callback: impl FnOnce(f64) + 'static) -> Option<FrameHandle> {
        if self.inner.shut_down.get() {
            debug!("frame requested after scheduler shutdown");
            return None;
        }

        let own_handle: Rc<Cell<Option<FrameHandle>>> = Rc::new(Cell::new(None));
        let weak = Rc::downgrade(&self.inner);
        let slot = own_handle.clone();
        let handle = self.inner.primitive.request_frame(Box::new(move |timestamp: f64| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if inner.shut_down.get() {
                return;
            }
            if let Some(handle) = slot.get() {
                inner.outstanding.borrow_mut().remove(&handle);
            }
            callback(timestamp);
        }));
        own_handle.set(Some(handle));
        self.inner.outstanding.borrow_mut().insert(handle);
        Some(handle)
    }

    /// Cancel one request. Fired or unknown handles are ignored.
    pub fn cancel(&self, handle: FrameHandle) {
        if self.inner.outstanding.borrow_mut().remove(&handle) {
            self.inner.primitive.cancel_frame(handle);
        }
    }

    /// Cancel every outstanding request.
    pub fn cancel_all(&self) {
        let handles: Vec<FrameHandle> = self.inner.outstanding.borrow_mut().drain().collect();
        for handle in handles {
            self.inner.primitive.cancel_frame(handle);
        }
    }

    /// Cancel everything and refuse further requests.
    pub fn shutdown(&self) {
        self.inner.shut_down.set(true);
        self.cancel_all();
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.get()
    }

    /// Requests that have neither fired nor been cancelled.
    pub fn pending(&self) -> usize {
        self.inner.outstanding.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::VirtualHost;

    #[test]
    fn test_callback_receives_timestamp_once() {
        let host = Rc::new(VirtualHost::new());
        let scheduler = FrameScheduler::new(host.clone());
        let seen = Rc::new(RefCell::new(Vec::new()));

        let s = seen.clone();
        scheduler.schedule(move |ts| s.borrow_mut().push(ts)).unwrap();
        assert_eq!(scheduler.pending(), 1);

        host.step_frames(3, 16.0);
        assert_eq!(*seen.borrow(), vec![16.0]);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_fifo_within_a_turn() {
        let host = Rc::new(VirtualHost::new());
        let scheduler = FrameScheduler::new(host.clone());
        let order = Rc::new(RefCell::new(Vec::new()));
        for i in 0..4 {
            let o = order.clone();
            scheduler.schedule(move |_| o.borrow_mut().push(i));
        }
        host.run_frame();
        assert_eq!(*order.borrow(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_cancel_and_shutdown() {
        let host = Rc::new(VirtualHost::new());
        let scheduler = FrameScheduler::new(host.clone());
        let count = Rc::new(Cell::new(0));

        let c = count.clone();
        let handle = scheduler.schedule(move |_| c.set(c.get() + 1)).unwrap();
        scheduler.cancel(handle);
        assert_eq!(host.pending_frames(), 0);

        for _ in 0..3 {
            let c = count.clone();
            scheduler.schedule(move |_| c.set(c.get() + 1));
        }
        scheduler.shutdown();
        assert_eq!(host.pending_frames(), 0);
        assert!(scheduler.schedule(|_| {}).is_none());

        host.step_frames(2, 16.0);
        assert_eq!(count.get(), 0);
        assert_eq!(host.frames_run(), 0);
    }
}
