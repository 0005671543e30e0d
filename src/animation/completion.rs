//! Completion signal shared between an animator and its caller.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::TaskId;

/// How a playback request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Final values were written.
    Finished,
    /// Stopped by `cancel` or disposal before reaching the end.
    Cancelled,
    /// Nothing could be written (element missing or write failed).
    Skipped,
}

type Waiter = Box<dyn FnOnce(Outcome)>;

struct CompletionInner {
    task: Option<TaskId>,
    outcome: Option<Outcome>,
    waiters: Vec<Waiter>,
}

/// Resolves exactly once with an [`Outcome`].
#[derive(Clone)]
pub struct Completion {
    inner: Rc<RefCell<CompletionInner>>,
}

impl Completion {
    pub(crate) fn pending(task: TaskId) -> Self {
        Self {
            inner: Rc::new(RefCell::new(CompletionInner {
                task: Some(task),
                outcome: None,
                waiters: Vec::new(),
            })),
        }
    }

    /// A signal that is already resolved, for requests that never ran a
    /// frame.
    pub fn resolved(outcome: Outcome) -> Self {
        Self {
            inner: Rc::new(RefCell::new(CompletionInner {
                task: None,
                outcome: Some(outcome),
                waiters: Vec::new(),
            })),
        }
    }

    /// Resolve and notify waiters. Later calls are ignored.
    pub(crate) fn resolve(&self, outcome: Outcome) -> bool {
        let waiters = {
            let mut inner = self.inner.borrow_mut();
            if inner.outcome.is_some() {
                return false;
            }
            inner.outcome = Some(outcome);
            std::mem::take(&mut inner.waiters)
        };
        for waiter in waiters {
            waiter(outcome);
        }
        true
    }

    /// Task driving this request, if frames were scheduled.
    pub fn task(&self) -> Option<TaskId> {
        self.inner.borrow().task
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.inner.borrow().outcome
    }

    pub fn is_done(&self) -> bool {
        self.outcome().is_some()
    }

    /// Run `callback` once resolved; immediately if it already is.
    pub fn on_complete(&self, callback: impl FnOnce(Outcome) + 'static) {
        let outcome = {
            let mut inner = self.inner.borrow_mut();
            match inner.outcome {
                Some(outcome) => outcome,
                None => {
                    inner.waiters.push(Box::new(callback));
                    return;
                }
            }
        };
        callback(outcome);
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Completion")
            .field("task", &inner.task)
            .field("outcome", &inner.outcome)
            .field("waiters", &inner.waiters.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_resolves_once() {
        let completion = Completion::pending(TaskId(3));
        let calls = Rc::new(Cell::new(0));
        let c = calls.clone();
        completion.on_complete(move |outcome| {
            assert_eq!(outcome, Outcome::Finished);
            c.set(c.get() + 1);
        });

        assert!(completion.resolve(Outcome::Finished));
        assert!(!completion.resolve(Outcome::Cancelled));
        assert_eq!(completion.outcome(), Some(Outcome::Finished));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_late_waiter_runs_immediately() {
        let completion = Completion::resolved(Outcome::Skipped);
        let seen = Rc::new(Cell::new(None));
        let s = seen.clone();
        completion.on_complete(move |o| s.set(Some(o)));
        assert_eq!(seen.get(), Some(Outcome::Skipped));
        assert_eq!(completion.task(), None);
    }
}
