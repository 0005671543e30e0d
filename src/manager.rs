//! Animation manager - wires observers, scroll effects and playback.
//!
//! ```text
//!                  ┌─► Disabled   (reduced motion / missing capability)
//! Uninitialized ───┤
//!                  └─► Active ───► Disposed
//! ```
//!
//! No transition leaves `Disabled` or `Disposed`.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::rc::{Rc, Weak};

use log::{debug, info, warn};
use serde::Serialize;

use crate::animation::{Completion, Outcome, PropertyAnimator};
use crate::host::{Host, ListenerHandle, TimerHandle};
use crate::schema::{
    AnimatableElement, AnimationKind, CounterFormat, ElementId, MotionConfig, PropertyTarget,
    parse_counter_text,
};
use crate::timing::{FrameScheduler, Throttled, throttle};
use crate::trigger::{ScrollEffects, TriggerRecord, VisibilityObserver};

/// Lifecycle state of an [`AnimationManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ManagerState {
    Uninitialized,
    /// Observers and scroll effects are wired.
    Active,
    /// Final states were applied up front; nothing is observed.
    Disabled,
    Disposed,
}

/// State reachable from host callbacks.
struct Shared {
    host: Host,
    state: Cell<ManagerState>,
    record: RefCell<TriggerRecord>,
    elements: RefCell<BTreeMap<ElementId, AnimatableElement>>,
    scroll: RefCell<ScrollEffects>,
    animator: RefCell<Option<PropertyAnimator>>,
    observer: RefCell<Option<Rc<VisibilityObserver>>>,
    delay_timers: RefCell<HashMap<ElementId, TimerHandle>>,
}

impl Shared {
    fn animator(&self) -> Option<PropertyAnimator> {
        self.animator.borrow().clone()
    }

    fn observer(&self) -> Option<Rc<VisibilityObserver>> {
        self.observer.borrow().clone()
    }

    /// Visibility event: check-then-mark, then play once.
    fn handle_visible(self: &Rc<Self>, element: ElementId) {
        if self.state.get() != ManagerState::Active {
            return;
        }
        let Some(spec) = self.elements.borrow().get(&element).cloned() else {
            debug!("{element} became visible but is not registered");
            return;
        };
        if !self.record.borrow_mut().mark_triggered(element) {
            debug!("{element} already triggered");
            return;
        }
        if let Some(observer) = self.observer() {
            observer.unobserve(element);
        }

        let delay_ms = spec.delay_ms;
        if delay_ms > 0.0 {
            let weak: Weak<Shared> = Rc::downgrade(self);
            let handle = self.host.clock.set_timeout(
                Box::new(move || {
                    let Some(shared) = weak.upgrade() else {
                        return;
                    };
                    shared.delay_timers.borrow_mut().remove(&spec.id);
                    if shared.state.get() == ManagerState::Active {
                        shared.play(&spec);
                    }
                }),
                delay_ms,
            );
            self.delay_timers.borrow_mut().insert(element, handle);
        } else {
            self.play(&spec);
        }
    }

    fn play(&self, spec: &AnimatableElement) -> Completion {
        let Some(animator) = self.animator() else {
            return Completion::resolved(Outcome::Cancelled);
        };
        match &spec.kind {
            AnimationKind::FadeIn { class } => match self.host.dom.add_class(spec.id, class) {
                Ok(()) => Completion::resolved(Outcome::Finished),
                Err(e) => {
                    warn!("reveal of {} skipped: {e}", spec.id);
                    Completion::resolved(Outcome::Skipped)
                }
            },
            AnimationKind::Counter {
                target,
                duration_ms,
                format,
            } => animator.animate_counter(spec.id, Some(0.0), *target, *duration_ms, format),
            AnimationKind::Property {
                targets,
                duration_ms,
                easing,
            } => animator.animate_with_easing(spec.id, targets, *duration_ms, *easing),
        }
    }

    fn handle_scroll(&self) {
        if self.state.get() != ManagerState::Active {
            return;
        }
        let offset = self.host.dom.scroll_offset();
        let transitions = self
            .scroll
            .borrow_mut()
            .update(self.host.dom.as_ref(), offset);
        for transition in transitions {
            debug!(
                "scroll effect {} {}",
                transition.index,
                if transition.active { "on" } else { "off" }
            );
        }
    }

    fn cancel_delay(&self, element: ElementId) {
        let handle = self.delay_timers.borrow_mut().remove(&element);
        if let Some(handle) = handle {
            self.host.clock.clear_timeout(handle);
        }
    }
}

/// Root of the engine: owns the trigger record and every component.
///
/// Usage:
/// ```ignore
/// let mut manager = AnimationManager::new(host, MotionConfig::from_json(json)?);
/// manager.start()?;
/// // ... page lives ...
/// manager.dispose()?;
/// ```
pub struct AnimationManager {
    config: MotionConfig,
    shared: Rc<Shared>,
    scroll_listener: Option<ListenerHandle>,
    scroll_throttle: Option<Throttled<()>>,
}

impl AnimationManager {
    pub fn new(host: Host, config: MotionConfig) -> Self {
        Self {
            config: config.sanitized(),
            shared: Rc::new(Shared {
                host,
                state: Cell::new(ManagerState::Uninitialized),
                record: RefCell::new(TriggerRecord::new()),
                elements: RefCell::new(BTreeMap::new()),
                scroll: RefCell::new(ScrollEffects::new()),
                animator: RefCell::new(None),
                observer: RefCell::new(None),
                delay_timers: RefCell::new(HashMap::new()),
            }),
            scroll_listener: None,
            scroll_throttle: None,
        }
    }

    pub fn state(&self) -> ManagerState {
        self.shared.state.get()
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    /// Snapshot of which elements already fired.
    pub fn record(&self) -> TriggerRecord {
        self.shared.record.borrow().clone()
    }

    pub fn has_triggered(&self, element: ElementId) -> bool {
        self.shared.record.borrow().has_triggered(element)
    }

    pub fn triggered_count(&self) -> usize {
        self.shared.record.borrow().len()
    }

    pub fn registered_count(&self) -> usize {
        self.shared.elements.borrow().len()
    }

    /// Animation tasks currently driven by frames.
    pub fn active_tasks(&self) -> usize {
        self.shared
            .animator()
            .map(|a| a.active_tasks())
            .unwrap_or(0)
    }

    /// Add an element for one-shot playback.
    ///
    /// Before `start` the element is queued. While active it is observed
    /// right away; while disabled its final state is applied right away.
    pub fn register(&self, element: AnimatableElement) -> Result<(), LifecycleError> {
        let state = self.state();
        if state == ManagerState::Disposed {
            return Err(LifecycleError::Disposed);
        }
        let id = element.id;
        let options = element.options.clone();
        self.shared
            .elements
            .borrow_mut()
            .insert(id, element.clone());

        match state {
            ManagerState::Active => {
                if let Some(observer) = self.shared.observer() {
                    if let Err(e) = observer.observe(id, &options) {
                        warn!("cannot observe {id}: {e}");
                    }
                }
            }
            ManagerState::Disabled => {
                if self.shared.record.borrow_mut().mark_triggered(id) {
                    self.shared.play(&element);
                }
            }
            _ => {}
        }
        Ok(())
    }

    pub fn register_all(
        &self,
        elements: impl IntoIterator<Item = AnimatableElement>,
    ) -> Result<(), LifecycleError> {
        for element in elements {
            self.register(element)?;
        }
        Ok(())
    }

    /// Toggle `class` on `element` while the page is scrolled past
    /// `threshold_px`.
    pub fn register_scroll_effect(
        &self,
        element: ElementId,
        threshold_px: f64,
        class: &str,
    ) -> Result<usize, LifecycleError> {
        if self.state() == ManagerState::Disposed {
            return Err(LifecycleError::Disposed);
        }
        let index = self
            .shared
            .scroll
            .borrow_mut()
            .register(element, threshold_px, class);
        self.shared.handle_scroll();
        Ok(index)
    }

    /// Resolve configured selectors through the host and register matches.
    fn register_configured(&self) {
        let dom = self.shared.host.dom.clone();
        for entry in &self.config.elements {
            let matches = dom.find(&entry.selector);
            if matches.is_empty() {
                warn!("selector '{}' matched no elements", entry.selector);
                continue;
            }
            let options = entry
                .observe
                .clone()
                .unwrap_or_else(|| self.config.observe.clone());
            for id in matches {
                let text_target = dom.read_text(id).and_then(|t| parse_counter_text(&t));
                let element = AnimatableElement::new(id, entry.animation.to_kind(text_target))
                    .with_options(options.clone())
                    .with_delay(entry.delay_ms);
                self.shared.elements.borrow_mut().insert(id, element);
            }
        }

        for effect in &self.config.scroll_effects {
            let matches = dom.find(&effect.selector);
            if matches.is_empty() {
                warn!("scroll effect selector '{}' matched no elements", effect.selector);
            }
            let mut scroll = self.shared.scroll.borrow_mut();
            for id in matches {
                scroll.register(id, effect.threshold_px, &effect.class);
            }
        }
    }

    /// Read the reduced-motion preference and wire everything up.
    pub fn start(&mut self) -> Result<ManagerState, LifecycleError> {
        let state = self.state();
        if state != ManagerState::Uninitialized {
            return Err(LifecycleError::AlreadyStarted(state));
        }
        self.register_configured();

        let host = self.shared.host.clone();
        let reduced_motion = host.dom.prefers_reduced_motion();
        let capabilities = (host.frames.clone(), host.intersection.clone());
        let (Some(frames), Some(intersection)) = capabilities else {
            warn!(
                "host lacks {}; applying final states",
                host.missing_capabilities().join(" and ")
            );
            return Ok(self.disable());
        };
        if reduced_motion {
            info!("reduced motion requested; applying final states");
            return Ok(self.disable());
        }

        *self.shared.animator.borrow_mut() = Some(PropertyAnimator::new(
            host.dom.clone(),
            Some(FrameScheduler::new(frames)),
            false,
        ));

        let observer = Rc::new(VisibilityObserver::new(intersection));
        let weak = Rc::downgrade(&self.shared);
        observer.on_visible(move |element| {
            if let Some(shared) = weak.upgrade() {
                shared.handle_visible(element);
            }
        });
        *self.shared.observer.borrow_mut() = Some(observer.clone());
        self.shared.state.set(ManagerState::Active);

        let elements: Vec<(ElementId, _)> = self
            .shared
            .elements
            .borrow()
            .values()
            .map(|e| (e.id, e.options.clone()))
            .collect();
        for (id, options) in &elements {
            if let Err(e) = observer.observe(*id, options) {
                warn!("cannot observe {id}: {e}");
            }
        }

        let weak = Rc::downgrade(&self.shared);
        let throttled = throttle(
            host.clock.clone(),
            move |()| {
                if let Some(shared) = weak.upgrade() {
                    shared.handle_scroll();
                }
            },
            self.config.scroll_throttle_ms,
        );
        let listener = {
            let throttled = throttled.clone();
            host.dom.add_scroll_listener(Rc::new(move || {
                throttled.call(());
            }))
        };
        self.scroll_throttle = Some(throttled);
        self.scroll_listener = Some(listener);
        self.shared.handle_scroll();

        info!(
            "animation manager active: {} elements, {} scroll effects",
            elements.len(),
            self.shared.scroll.borrow().len()
        );
        Ok(ManagerState::Active)
    }

    fn disable(&mut self) -> ManagerState {
        *self.shared.animator.borrow_mut() =
            Some(PropertyAnimator::new(self.shared.host.dom.clone(), None, true));
        self.shared.state.set(ManagerState::Disabled);

        let elements: Vec<AnimatableElement> =
            self.shared.elements.borrow().values().cloned().collect();
        for element in &elements {
            if self.shared.record.borrow_mut().mark_triggered(element.id) {
                self.shared.play(element);
            }
        }
        info!(
            "animation manager disabled: {} final states applied",
            elements.len()
        );
        ManagerState::Disabled
    }

    /// Tear down observers, listeners and every pending frame or timer.
    pub fn dispose(&mut self) -> Result<(), LifecycleError> {
        let state = self.state();
        if state != ManagerState::Active {
            return Err(LifecycleError::InvalidTransition {
                from: state,
                to: ManagerState::Disposed,
            });
        }
        self.teardown();
        info!("animation manager disposed");
        Ok(())
    }

    fn teardown(&mut self) {
        let shared = &self.shared;
        shared.state.set(ManagerState::Disposed);

        if let Some(observer) = shared.observer.borrow_mut().take() {
            observer.disconnect();
        }
        if let Some(animator) = shared.animator() {
            animator.shutdown();
        }
        let timers: Vec<TimerHandle> = shared
            .delay_timers
            .borrow_mut()
            .drain()
            .map(|(_, h)| h)
            .collect();
        for handle in timers {
            shared.host.clock.clear_timeout(handle);
        }
        if let Some(throttled) = self.scroll_throttle.take() {
            throttled.cancel();
        }
        if let Some(listener) = self.scroll_listener.take() {
            shared.host.dom.remove_listener(listener);
        }
        if self.config.clear_record_on_dispose {
            shared.record.borrow_mut().reset_all();
        }
    }

    /// Let `element` trigger again the next time it becomes visible.
    pub fn reset(&self, element: ElementId) -> Result<bool, LifecycleError> {
        self.require_active()?;
        let was_triggered = self.shared.record.borrow_mut().reset(element);
        self.shared.cancel_delay(element);
        self.rearm(element);
        Ok(was_triggered)
    }

    /// Let every registered element trigger again.
    pub fn reset_all(&self) -> Result<(), LifecycleError> {
        self.require_active()?;
        self.shared.record.borrow_mut().reset_all();
        let ids: Vec<ElementId> = self.shared.elements.borrow().keys().copied().collect();
        for id in ids {
            self.shared.cancel_delay(id);
            self.rearm(id);
        }
        Ok(())
    }

    fn rearm(&self, element: ElementId) {
        let options = match self.shared.elements.borrow().get(&element) {
            Some(spec) => spec.options.clone(),
            None => return,
        };
        if let Some(observer) = self.shared.observer() {
            if let Err(e) = observer.observe(element, &options) {
                warn!("cannot observe {element}: {e}");
            }
        }
    }

    fn require_active(&self) -> Result<(), LifecycleError> {
        match self.state() {
            ManagerState::Active => Ok(()),
            ManagerState::Uninitialized => Err(LifecycleError::NotStarted),
            ManagerState::Disposed => Err(LifecycleError::Disposed),
            state @ ManagerState::Disabled => Err(LifecycleError::InvalidTransition {
                from: state,
                to: ManagerState::Active,
            }),
        }
    }

    fn playback(&self) -> Result<PropertyAnimator, LifecycleError> {
        match self.state() {
            ManagerState::Uninitialized => Err(LifecycleError::NotStarted),
            ManagerState::Disposed => Err(LifecycleError::Disposed),
            _ => self.shared.animator().ok_or(LifecycleError::NotStarted),
        }
    }

    /// Animate numeric properties on `element`, honouring reduced motion.
    pub fn animate_properties(
        &self,
        element: ElementId,
        targets: &[PropertyTarget],
        duration_ms: f64,
    ) -> Result<Completion, LifecycleError> {
        let duration_ms = crate::schema::sanitize_duration(duration_ms, 0.0);
        Ok(self
            .playback()?
            .animate_properties(element, targets, duration_ms))
    }

    /// Count `element`'s text up from zero to `target`.
    pub fn animate_counter(
        &self,
        element: ElementId,
        target: f64,
        duration_ms: f64,
        format: &CounterFormat,
    ) -> Result<Completion, LifecycleError> {
        let duration_ms = crate::schema::sanitize_duration(duration_ms, 0.0);
        Ok(self
            .playback()?
            .animate_counter(element, Some(0.0), target, duration_ms, format))
    }
}

impl Drop for AnimationManager {
    fn drop(&mut self) {
        if self.state() == ManagerState::Active {
            self.teardown();
        }
    }
}

/// Errors from misusing the manager lifecycle.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LifecycleError {
    #[error("Animation manager already started (state: {0:?})")]
    AlreadyStarted(ManagerState),
    #[error("Animation manager has not been started")]
    NotStarted,
    #[error("Animation manager is disposed")]
    Disposed,
    #[error("Cannot move animation manager from {from:?} to {to:?}")]
    InvalidTransition {
        from: ManagerState,
        to: ManagerState,
    },
}
