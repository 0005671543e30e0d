//! Frame-driven playback of property and counter animations.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use log::{debug, warn};

use super::{AnimationTask, Channel, Completion, Outcome, TaskId, Track};
use crate::host::{Dom, FrameHandle, HostError};
use crate::schema::{CounterFormat, ElementId, PropertyTarget, parse_counter_text};
use crate::timing::{Easing, FrameScheduler};

struct RunningTask {
    task: AnimationTask,
    completion: Completion,
    frame: Option<FrameHandle>,
}

struct AnimatorInner {
    dom: Rc<dyn Dom>,
    scheduler: Option<FrameScheduler>,
    reduced_motion: bool,
    tasks: RefCell<BTreeMap<TaskId, RunningTask>>,
    next_id: Cell<u64>,
    shut_down: Cell<bool>,
}

/// Interpolates numeric properties and counters, one step per frame.
///
/// With reduced motion, or without a frame scheduler, every request
/// writes its final values synchronously and schedules nothing.
///
/// Overlapping requests on the same element and property are not
/// coalesced. Each running task writes its own value every frame and the
/// task scheduled last writes last, so the visible value can jump between
/// the two curves until the earlier one finishes.
///
/// Usage:
/// ```ignore
/// let animator = PropertyAnimator::new(host.dom.clone(), Some(scheduler), false);
/// let done = animator.animate_properties(card, &[PropertyTarget::new("opacity", 1.0)], 500.0);
/// done.on_complete(|outcome| log::info!("fade finished: {outcome:?}"));
/// ```
#[derive(Clone)]
pub struct PropertyAnimator {
    inner: Rc<AnimatorInner>,
}

impl PropertyAnimator {
    pub fn new(dom: Rc<dyn Dom>, scheduler: Option<FrameScheduler>, reduced_motion: bool) -> Self {
        Self {
            inner: Rc::new(AnimatorInner {
                dom,
                scheduler,
                reduced_motion,
                tasks: RefCell::new(BTreeMap::new()),
                next_id: Cell::new(0),
                shut_down: Cell::new(false),
            }),
        }
    }

    pub fn is_reduced_motion(&self) -> bool {
        self.inner.reduced_motion
    }

    /// Animate `targets` on `element` with the default easing.
    pub fn animate_properties(
        &self,
        element: ElementId,
        targets: &[PropertyTarget],
        duration_ms: f64,
    ) -> Completion {
        self.animate_with_easing(element, targets, duration_ms, Easing::default())
    }

    /// Animate `targets` on `element`, starting from the current values.
    pub fn animate_with_easing(
        &self,
        element: ElementId,
        targets: &[PropertyTarget],
        duration_ms: f64,
        easing: Easing,
    ) -> Completion {
        let dom = &self.inner.dom;
        let tracks = targets
            .iter()
            .map(|target| Track {
                channel: Channel::Property {
                    name: target.name.clone(),
                    unit: target.unit.clone(),
                },
                start: dom.read_property(element, &target.name).unwrap_or(0.0),
                end: target.value,
            })
            .collect();
        self.play(element, tracks, duration_ms, easing)
    }

    /// Count the element's text from `from` to `to`.
    ///
    /// Without `from` the count starts at the number currently shown, or
    /// zero if the text holds none.
    pub fn animate_counter(
        &self,
        element: ElementId,
        from: Option<f64>,
        to: f64,
        duration_ms: f64,
        format: &CounterFormat,
    ) -> Completion {
        let start = from
            .or_else(|| {
                self.inner
                    .dom
                    .read_text(element)
                    .and_then(|text| parse_counter_text(&text))
            })
            .unwrap_or(0.0);
        let track = Track {
            channel: Channel::Text {
                format: format.clone(),
            },
            start,
            end: to,
        };
        self.play(element, vec![track], duration_ms, Easing::default())
    }

    fn play(
        &self,
        element: ElementId,
        tracks: Vec<Track>,
        duration_ms: f64,
        easing: Easing,
    ) -> Completion {
        let inner = &self.inner;
        if inner.shut_down.get() {
            debug!("animation on {element} requested after shutdown");
            return Completion::resolved(Outcome::Cancelled);
        }
        if !inner.dom.contains(element) {
            warn!("animation target {element} not found");
            return Completion::resolved(Outcome::Skipped);
        }
        if tracks.iter().any(|track| !track.end.is_finite()) {
            warn!("animation on {element} has a non-finite target");
            return Completion::resolved(Outcome::Skipped);
        }
        let tracks: Vec<Track> = tracks
            .into_iter()
            .map(|track| Track {
                start: if track.start.is_finite() { track.start } else { 0.0 },
                ..track
            })
            .collect();

        let scheduler = match &inner.scheduler {
            Some(scheduler) if !inner.reduced_motion => scheduler,
            _ => {
                let outcome = match write_tracks(inner.dom.as_ref(), element, &tracks, 1.0) {
                    Ok(()) => Outcome::Finished,
                    Err(e) => {
                        warn!("final state for {element} not applied: {e}");
                        Outcome::Skipped
                    }
                };
                return Completion::resolved(outcome);
            }
        };

        let id = TaskId(inner.next_id.get());
        inner.next_id.set(id.0 + 1);
        let completion = Completion::pending(id);
        inner.tasks.borrow_mut().insert(
            id,
            RunningTask {
                task: AnimationTask::new(id, element, tracks, duration_ms, easing),
                completion: completion.clone(),
                frame: None,
            },
        );
        debug!("task {} started on {element} ({duration_ms}ms)", id.0);
        schedule_next(inner, scheduler, id);
        completion
    }

    /// Stop one task. Returns whether it was running.
    pub fn cancel(&self, id: TaskId) -> bool {
        let running = self.inner.tasks.borrow_mut().remove(&id);
        match running {
            Some(running) => {
                self.release(running);
                true
            }
            None => false,
        }
    }

    /// Stop every running task.
    pub fn cancel_all(&self) {
        let drained = std::mem::take(&mut *self.inner.tasks.borrow_mut());
        for (_, running) in drained {
            self.release(running);
        }
    }

    /// Cancel everything and refuse new requests.
    pub fn shutdown(&self) {
        self.inner.shut_down.set(true);
        self.cancel_all();
        if let Some(scheduler) = &self.inner.scheduler {
            scheduler.shutdown();
        }
    }

    pub fn active_tasks(&self) -> usize {
        self.inner.tasks.borrow().len()
    }

    fn release(&self, running: RunningTask) {
        if let (Some(scheduler), Some(frame)) = (&self.inner.scheduler, running.frame) {
            scheduler.cancel(frame);
        }
        running.completion.resolve(Outcome::Cancelled);
    }
}

fn schedule_next(inner: &Rc<AnimatorInner>, scheduler: &FrameScheduler, id: TaskId) {
    let weak = Rc::downgrade(inner);
    let handle = scheduler.schedule(move |timestamp| {
        if let Some(inner) = weak.upgrade() {
            on_frame(&inner, id, timestamp);
        }
    });
    match handle {
        Some(handle) => {
            if let Some(running) = inner.tasks.borrow_mut().get_mut(&id) {
                running.frame = Some(handle);
            }
        }
        None => finish(inner, id, Outcome::Cancelled),
    }
}

fn on_frame(inner: &Rc<AnimatorInner>, id: TaskId, timestamp: f64) {
    let (element, tracks, step) = {
        let mut tasks = inner.tasks.borrow_mut();
        let Some(running) = tasks.get_mut(&id) else {
            return;
        };
        running.frame = None;
        let step = running.task.step(timestamp);
        (
            running.task.element(),
            running.task.tracks().to_vec(),
            step,
        )
    };

    if let Err(e) = write_tracks(inner.dom.as_ref(), element, &tracks, step.eased) {
        warn!("task {} on {element} stopped: {e}", id.0);
        finish(inner, id, Outcome::Skipped);
        return;
    }

    if step.done {
        debug!("task {} on {element} finished", id.0);
        finish(inner, id, Outcome::Finished);
    } else if let Some(scheduler) = &inner.scheduler {
        schedule_next(inner, scheduler, id);
    }
}

fn finish(inner: &AnimatorInner, id: TaskId, outcome: Outcome) {
    let running = inner.tasks.borrow_mut().remove(&id);
    if let Some(running) = running {
        running.completion.resolve(outcome);
    }
}

/// Write every track at eased progress `eased`; 1.0 writes exact targets.
fn write_tracks(dom: &dyn Dom, element: ElementId, tracks: &[Track], eased: f64) -> Result<(), HostError> {
    for track in tracks {
        let value = track.value_at(eased);
        match &track.channel {
            Channel::Property { name, unit } => dom.write_property(element, name, value, unit)?,
            Channel::Text { format } => {
                let shown = if eased >= 1.0 {
                    value
                } else {
                    format.truncate_toward(value, track.start)
                };
                dom.write_text(element, &format.render(shown))?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::VirtualHost;

    fn animator(host: &Rc<VirtualHost>, reduced_motion: bool) -> PropertyAnimator {
        PropertyAnimator::new(
            host.clone(),
            Some(FrameScheduler::new(host.clone())),
            reduced_motion,
        )
    }

    #[test]
    fn test_reduced_motion_applies_synchronously() {
        let host = Rc::new(VirtualHost::new());
        let el = host.add_element(".card");
        let animator = animator(&host, true);

        let done = animator.animate_properties(el, &[PropertyTarget::new("opacity", 1.0)], 500.0);

        assert_eq!(done.outcome(), Some(Outcome::Finished));
        assert_eq!(host.property(el, "opacity"), Some(1.0));
        assert_eq!(host.frames_requested(), 0);
        assert_eq!(animator.active_tasks(), 0);
    }

    #[test]
    fn test_property_interpolates_to_exact_target() {
        let host = Rc::new(VirtualHost::new());
        let el = host.add_element(".card");
        host.set_property(el, "opacity", 0.0);
        let animator = animator(&host, false);

        let done = animator.animate_properties(el, &[PropertyTarget::new("opacity", 1.0)], 100.0);
        assert!(!done.is_done());
        assert_eq!(host.pending_frames(), 1);

        host.run_until_idle(16.0, 100);
        assert_eq!(done.outcome(), Some(Outcome::Finished));
        assert_eq!(host.property(el, "opacity"), Some(1.0));

        let history = host.property_history(el, "opacity");
        assert!(history.len() > 2);
        assert_eq!(history[0], 0.0);
        assert!(history.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(animator.active_tasks(), 0);
    }

    #[test]
    fn test_counter_ends_exactly_on_target() {
        let host = Rc::new(VirtualHost::new());
        let el = host.add_element(".stat-number");
        let animator = animator(&host, false);

        let done = animator.animate_counter(el, Some(0.0), 1000.0, 333.0, &CounterFormat::default());
        host.step_frames(5, 16.0);
        let mid: f64 = host.text(el).unwrap().parse().unwrap();
        assert!(mid > 0.0 && mid < 1000.0);
        assert_eq!(mid.fract(), 0.0);

        host.run_until_idle(16.0, 100);
        assert_eq!(host.text(el).as_deref(), Some("1000"));
        assert_eq!(done.outcome(), Some(Outcome::Finished));
    }

    #[test]
    fn test_counter_starts_from_current_text() {
        let host = Rc::new(VirtualHost::new());
        let el = host.add_element(".stat-number");
        host.set_text(el, "1,500");
        let animator = animator(&host, false);
        let format = CounterFormat {
            separator: Some(','),
            ..Default::default()
        };

        animator.animate_counter(el, None, 2000.0, 100.0, &format);
        host.run_frame();
        assert_eq!(host.text(el).as_deref(), Some("1,500"));
        host.run_until_idle(16.0, 100);
        assert_eq!(host.text(el).as_deref(), Some("2,000"));
    }

    #[test]
    fn test_zero_duration_finishes_on_next_frame() {
        let host = Rc::new(VirtualHost::new());
        let el = host.add_element(".card");
        let animator = animator(&host, false);

        let done = animator.animate_properties(el, &[PropertyTarget::new("scale", 2.0)], 0.0);
        assert_eq!(host.property(el, "scale"), None);
        host.run_frame();
        assert_eq!(host.property(el, "scale"), Some(2.0));
        assert_eq!(done.outcome(), Some(Outcome::Finished));
        assert_eq!(host.frames_requested(), 1);
    }

    #[test]
    fn test_missing_element_is_skipped() {
        let host = Rc::new(VirtualHost::new());
        let el = host.add_element(".card");
        host.detach(el);
        let animator = animator(&host, false);

        let done = animator.animate_properties(el, &[PropertyTarget::new("opacity", 1.0)], 100.0);
        assert_eq!(done.outcome(), Some(Outcome::Skipped));
        assert_eq!(host.frames_requested(), 0);
    }

    #[test]
    fn test_element_removed_mid_flight_stops_task() {
        let host = Rc::new(VirtualHost::new());
        let el = host.add_element(".card");
        let animator = animator(&host, false);

        let done = animator.animate_properties(el, &[PropertyTarget::new("opacity", 1.0)], 200.0);
        host.step_frames(2, 16.0);
        host.detach(el);
        host.step_frames(1, 16.0);

        assert_eq!(done.outcome(), Some(Outcome::Skipped));
        assert_eq!(host.pending_frames(), 0);
        assert_eq!(animator.active_tasks(), 0);
    }

    #[test]
    fn test_cancel_stops_frames() {
        let host = Rc::new(VirtualHost::new());
        let el = host.add_element(".card");
        let animator = animator(&host, false);

        let done = animator.animate_properties(el, &[PropertyTarget::new("opacity", 1.0)], 200.0);
        host.step_frames(2, 16.0);
        let written = host.property_history(el, "opacity").len();

        assert!(animator.cancel(done.task().unwrap()));
        host.step_frames(5, 16.0);
        assert_eq!(done.outcome(), Some(Outcome::Cancelled));
        assert_eq!(host.property_history(el, "opacity").len(), written);
        assert_eq!(host.pending_frames(), 0);
    }

    #[test]
    fn test_shutdown_rejects_new_work() {
        let host = Rc::new(VirtualHost::new());
        let el = host.add_element(".card");
        let animator = animator(&host, false);

        let first = animator.animate_properties(el, &[PropertyTarget::new("opacity", 1.0)], 200.0);
        animator.shutdown();
        assert_eq!(first.outcome(), Some(Outcome::Cancelled));

        let second = animator.animate_properties(el, &[PropertyTarget::new("opacity", 1.0)], 200.0);
        assert_eq!(second.outcome(), Some(Outcome::Cancelled));
        assert_eq!(host.pending_frames(), 0);
    }

    #[test]
    fn test_overlapping_tasks_last_scheduled_writes_last() {
        let host = Rc::new(VirtualHost::new());
        let el = host.add_element(".card");
        let animator = animator(&host, false);

        animator.animate_properties(el, &[PropertyTarget::new("x", 100.0)], 0.0);
        animator.animate_properties(el, &[PropertyTarget::new("x", 50.0)], 0.0);
        host.run_frame();

        assert_eq!(host.property_history(el, "x"), vec![100.0, 50.0]);
        assert_eq!(host.property(el, "x"), Some(50.0));
    }

    #[test]
    fn test_no_scheduler_falls_back_to_immediate() {
        let host = Rc::new(VirtualHost::new());
        let el = host.add_element(".card");
        let animator = PropertyAnimator::new(host.clone(), None, false);

        let done = animator.animate_properties(el, &[PropertyTarget::new("opacity", 1.0)], 300.0);
        assert_eq!(done.outcome(), Some(Outcome::Finished));
        assert_eq!(host.property(el, "opacity"), Some(1.0));
    }

    #[test]
    fn test_non_finite_target_is_skipped() {
        let host = Rc::new(VirtualHost::new());
        let el = host.add_element(".stat");
        host.set_text(el, "10");
        let animator = animator(&host, false);

        let done = animator.animate_counter(el, None, f64::NAN, 100.0, &CounterFormat::default());
        assert_eq!(done.outcome(), Some(Outcome::Skipped));
        let done = animator.animate_properties(
            el,
            &[
                PropertyTarget::new("opacity", 1.0),
                PropertyTarget::new("x", f64::INFINITY),
            ],
            100.0,
        );
        assert_eq!(done.outcome(), Some(Outcome::Skipped));
        assert_eq!(host.frames_requested(), 0);

        let reduced = PropertyAnimator::new(host.clone(), None, true);
        let done = reduced.animate_counter(el, None, f64::NAN, 100.0, &CounterFormat::default());
        assert_eq!(done.outcome(), Some(Outcome::Skipped));
        assert_eq!(host.text(el).as_deref(), Some("10"));
        assert_eq!(host.property(el, "opacity"), None);
    }
}
