//! Record of elements whose one-shot animation already fired.

use std::collections::HashSet;

use crate::schema::ElementId;

/// Idempotence guard for one-shot animations.
///
/// [`mark_triggered`](TriggerRecord::mark_triggered) is a single set
/// insertion, so checking and marking cannot be split by another
/// callback. The record is owned by one manager and never shared across
/// threads.
#[derive(Debug, Clone, Default)]
pub struct TriggerRecord {
    triggered: HashSet<ElementId>,
}

impl TriggerRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_triggered(&self, element: ElementId) -> bool {
        self.triggered.contains(&element)
    }

    /// Mark `element` as triggered. Returns `false` if it already was, in
    /// which case the caller must not play anything.
    pub fn mark_triggered(&mut self, element: ElementId) -> bool {
        self.triggered.insert(element)
    }

    /// Forget `element` so it may trigger again. Returns whether it was
    /// recorded.
    pub fn reset(&mut self, element: ElementId) -> bool {
        self.triggered.remove(&element)
    }

    pub fn reset_all(&mut self) {
        self.triggered.clear();
    }

    pub fn len(&self) -> usize {
        self.triggered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggered.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_is_once() {
        let mut record = TriggerRecord::new();
        let e = ElementId(7);
        assert!(!record.has_triggered(e));
        assert!(record.mark_triggered(e));
        assert!(!record.mark_triggered(e));
        assert!(record.has_triggered(e));
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn test_reset_allows_retrigger() {
        let mut record = TriggerRecord::new();
        let (a, b) = (ElementId(1), ElementId(2));
        record.mark_triggered(a);
        record.mark_triggered(b);

        assert!(record.reset(a));
        assert!(!record.reset(a));
        assert!(record.mark_triggered(a));

        record.reset_all();
        assert!(record.is_empty());
        assert!(!record.has_triggered(b));
    }
}
