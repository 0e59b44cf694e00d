//! # Lifecycle
//!
//! A hierarchical lifecycle state machine. Every component gets a read-only
//! [`Lifecycle`]; whoever owns the component holds the matching
//! [`LifecycleRegistry`] and drives the transitions.
//!
//! ```text
//!  Initialized ──create──▶ Created ──start──▶ Started ──resume──▶ Resumed
//!                             │    ◀──stop───          ◀──pause───
//!                          destroy
//!                             ▼
//!                         Destroyed   (terminal)
//! ```
//!
//! Opening callbacks (`on_create`, `on_start`, `on_resume`) run in
//! registration order, closing callbacks run in reverse registration order.
//! Subscribing to a lifecycle that is already past a boundary replays the
//! opening callbacks up to the current state.

use std::cell::RefCell;
use std::rc::Rc;

use log::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LifecycleState {
    Destroyed,
    Initialized,
    Created,
    Started,
    Resumed,
}

/// Receives lifecycle transitions. All methods default to no-ops.
pub trait LifecycleCallbacks {
    fn on_create(&self) {}
    fn on_start(&self) {}
    fn on_resume(&self) {}
    fn on_pause(&self) {}
    fn on_stop(&self) {}
    fn on_destroy(&self) {}
}

/// Closure-based [`LifecycleCallbacks`], for when a dedicated type is overkill.
///
/// ```rust,ignore
/// lifecycle.subscribe(
///     LifecycleHooks::new()
///         .with_start(|| debug!("started"))
///         .with_stop(|| debug!("stopped")),
/// );
/// ```
#[derive(Default)]
pub struct LifecycleHooks {
    on_create: Option<Box<dyn Fn()>>,
    on_start: Option<Box<dyn Fn()>>,
    on_resume: Option<Box<dyn Fn()>>,
    on_pause: Option<Box<dyn Fn()>>,
    on_stop: Option<Box<dyn Fn()>>,
    on_destroy: Option<Box<dyn Fn()>>,
}

impl LifecycleHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_create(mut self, f: impl Fn() + 'static) -> Self {
        self.on_create = Some(Box::new(f));
        self
    }

    pub fn with_start(mut self, f: impl Fn() + 'static) -> Self {
        self.on_start = Some(Box::new(f));
        self
    }

    pub fn with_resume(mut self, f: impl Fn() + 'static) -> Self {
        self.on_resume = Some(Box::new(f));
        self
    }

    pub fn with_pause(mut self, f: impl Fn() + 'static) -> Self {
        self.on_pause = Some(Box::new(f));
        self
    }

    pub fn with_stop(mut self, f: impl Fn() + 'static) -> Self {
        self.on_stop = Some(Box::new(f));
        self
    }

    pub fn with_destroy(mut self, f: impl Fn() + 'static) -> Self {
        self.on_destroy = Some(Box::new(f));
        self
    }
}

impl LifecycleCallbacks for LifecycleHooks {
    fn on_create(&self) {
        if let Some(f) = &self.on_create {
            f();
        }
    }

    fn on_start(&self) {
        if let Some(f) = &self.on_start {
            f();
        }
    }

    fn on_resume(&self) {
        if let Some(f) = &self.on_resume {
            f();
        }
    }

    fn on_pause(&self) {
        if let Some(f) = &self.on_pause {
            f();
        }
    }

    fn on_stop(&self) {
        if let Some(f) = &self.on_stop {
            f();
        }
    }

    fn on_destroy(&self) {
        if let Some(f) = &self.on_destroy {
            f();
        }
    }
}

/// Handle returned by [`Lifecycle::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleSubscription(u64);

struct LifecycleInner {
    state: LifecycleState,
    callbacks: Vec<(u64, Rc<dyn LifecycleCallbacks>)>,
    next_id: u64,
}

/// Read-only view of a lifecycle: current state plus subscriptions.
#[derive(Clone)]
pub struct Lifecycle {
    inner: Rc<RefCell<LifecycleInner>>,
}

impl Lifecycle {
    fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(LifecycleInner {
                state: LifecycleState::Initialized,
                callbacks: Vec::new(),
                next_id: 0,
            })),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.inner.borrow().state
    }

    pub fn subscribe(&self, callbacks: impl LifecycleCallbacks + 'static) -> LifecycleSubscription {
        self.subscribe_rc(Rc::new(callbacks))
    }

    /// Registers `callbacks` and replays the opening transitions the
    /// lifecycle has already gone through.
    pub fn subscribe_rc(&self, callbacks: Rc<dyn LifecycleCallbacks>) -> LifecycleSubscription {
        let (id, state) = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;
            if inner.state != LifecycleState::Destroyed {
                inner.callbacks.push((id, Rc::clone(&callbacks)));
            }
            (id, inner.state)
        };

        let replay: [(LifecycleState, fn(&dyn LifecycleCallbacks)); 3] = [
            (LifecycleState::Created, |cb| cb.on_create()),
            (LifecycleState::Started, |cb| cb.on_start()),
            (LifecycleState::Resumed, |cb| cb.on_resume()),
        ];
        for (boundary, fire) in replay {
            if state >= boundary && self.is_subscribed(id) {
                fire(callbacks.as_ref());
            }
        }

        LifecycleSubscription(id)
    }

    pub fn unsubscribe(&self, subscription: LifecycleSubscription) {
        self.inner
            .borrow_mut()
            .callbacks
            .retain(|(id, _)| *id != subscription.0);
    }

    fn is_subscribed(&self, id: u64) -> bool {
        self.inner.borrow().callbacks.iter().any(|(i, _)| *i == id)
    }
}

/// Owner side of a [`Lifecycle`]. Cloning shares the same state machine.
#[derive(Clone)]
pub struct LifecycleRegistry {
    lifecycle: Lifecycle,
}

impl Default for LifecycleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleRegistry {
    pub fn new() -> Self {
        Self {
            lifecycle: Lifecycle::new(),
        }
    }

    /// A registry that mirrors every transition of `parent`, including the
    /// ones `parent` has already made.
    pub fn attached_to(parent: &Lifecycle) -> Self {
        let registry = Self::new();
        parent.subscribe(Mirror(registry.clone()));
        registry
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle.clone()
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn create(&self) {
        self.transition(LifecycleState::Initialized, LifecycleState::Created, false, |cb| {
            cb.on_create()
        });
    }

    pub fn start(&self) {
        self.transition(LifecycleState::Created, LifecycleState::Started, false, |cb| {
            cb.on_start()
        });
    }

    pub fn resume(&self) {
        self.transition(LifecycleState::Started, LifecycleState::Resumed, false, |cb| {
            cb.on_resume()
        });
    }

    pub fn pause(&self) {
        self.transition(LifecycleState::Resumed, LifecycleState::Started, true, |cb| {
            cb.on_pause()
        });
    }

    pub fn stop(&self) {
        self.transition(LifecycleState::Started, LifecycleState::Created, true, |cb| {
            cb.on_stop()
        });
    }

    /// Terminal transition. Destroying twice, or destroying a lifecycle that
    /// was never created, fires nothing.
    pub fn destroy(&self) {
        match self.state() {
            LifecycleState::Destroyed => {}
            LifecycleState::Initialized => {
                let mut inner = self.lifecycle.inner.borrow_mut();
                inner.state = LifecycleState::Destroyed;
                inner.callbacks.clear();
            }
            _ => {
                self.drive_to(LifecycleState::Created);
                self.transition(LifecycleState::Created, LifecycleState::Destroyed, true, |cb| {
                    cb.on_destroy()
                });
                self.lifecycle.inner.borrow_mut().callbacks.clear();
            }
        }
    }

    /// Moves one adjacent step at a time until `target` is reached, so every
    /// intermediate callback fires. `Initialized` cannot be re-entered, so a
    /// created lifecycle asked to go there stops at `Created`.
    pub fn drive_to(&self, target: LifecycleState) {
        loop {
            let current = self.state();
            let target = if target == LifecycleState::Initialized && current > target {
                LifecycleState::Created
            } else {
                target
            };
            if current == target || current == LifecycleState::Destroyed {
                return;
            }

            if target > current {
                match current {
                    LifecycleState::Initialized => self.create(),
                    LifecycleState::Created => self.start(),
                    LifecycleState::Started => self.resume(),
                    _ => return,
                }
            } else {
                match current {
                    LifecycleState::Resumed => self.pause(),
                    LifecycleState::Started => self.stop(),
                    LifecycleState::Created | LifecycleState::Initialized => self.destroy(),
                    LifecycleState::Destroyed => return,
                }
            }
        }
    }

    fn transition(
        &self,
        from: LifecycleState,
        to: LifecycleState,
        reverse: bool,
        fire: fn(&dyn LifecycleCallbacks),
    ) {
        let snapshot = {
            let mut inner = self.lifecycle.inner.borrow_mut();
            if inner.state != from {
                warn!(
                    "Ignoring lifecycle transition {:?} -> {:?}, current state is {:?}",
                    from, to, inner.state
                );
                return;
            }
            inner.state = to;
            let mut callbacks: Vec<_> = inner
                .callbacks
                .iter()
                .map(|(id, cb)| (*id, Rc::clone(cb)))
                .collect();
            if reverse {
                callbacks.reverse();
            }
            callbacks
        };
        debug!("Lifecycle {:?} -> {:?} ({} callbacks)", from, to, snapshot.len());

        for (id, cb) in snapshot {
            // A callback may unsubscribe a later one mid-dispatch.
            if self.lifecycle.is_subscribed(id) {
                fire(cb.as_ref());
            }
        }
    }
}

struct Mirror(LifecycleRegistry);

impl LifecycleCallbacks for Mirror {
    fn on_create(&self) {
        self.0.create();
    }

    fn on_start(&self) {
        self.0.start();
    }

    fn on_resume(&self) {
        self.0.resume();
    }

    fn on_pause(&self) {
        self.0.pause();
    }

    fn on_stop(&self) {
        self.0.stop();
    }

    fn on_destroy(&self) {
        self.0.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{EventLog, LifecycleRecorder};

    #[test]
    fn test_new_registry_is_initialized() {
        let registry = LifecycleRegistry::new();
        assert_eq!(registry.state(), LifecycleState::Initialized);
    }

    #[test]
    fn test_drive_to_resumed_fires_every_opening_callback_in_order() {
        let registry = LifecycleRegistry::new();
        let log = EventLog::new();
        registry.lifecycle().subscribe(LifecycleRecorder::new("a", &log));

        registry.drive_to(LifecycleState::Resumed);

        assert_eq!(log.take(), vec!["a:create", "a:start", "a:resume"]);
        assert_eq!(registry.state(), LifecycleState::Resumed);
    }

    #[test]
    fn test_closing_callbacks_run_in_reverse_order() {
        let registry = LifecycleRegistry::new();
        let log = EventLog::new();
        registry.drive_to(LifecycleState::Resumed);
        registry.lifecycle().subscribe(LifecycleRecorder::new("a", &log));
        registry.lifecycle().subscribe(LifecycleRecorder::new("b", &log));
        log.take();

        registry.pause();

        assert_eq!(log.take(), vec!["b:pause", "a:pause"]);
    }

    #[test]
    fn test_subscribe_replays_opening_transitions() {
        let registry = LifecycleRegistry::new();
        registry.drive_to(LifecycleState::Started);
        let log = EventLog::new();

        registry.lifecycle().subscribe(LifecycleRecorder::new("late", &log));

        assert_eq!(log.take(), vec!["late:create", "late:start"]);
    }

    #[test]
    fn test_destroy_from_resumed_walks_down_through_every_state() {
        let registry = LifecycleRegistry::new();
        let log = EventLog::new();
        registry.lifecycle().subscribe(LifecycleRecorder::new("a", &log));
        registry.drive_to(LifecycleState::Resumed);
        log.take();

        registry.destroy();

        assert_eq!(log.take(), vec!["a:pause", "a:stop", "a:destroy"]);
        assert_eq!(registry.state(), LifecycleState::Destroyed);
    }

    #[test]
    fn test_double_destroy_is_a_noop() {
        let registry = LifecycleRegistry::new();
        let log = EventLog::new();
        registry.lifecycle().subscribe(LifecycleRecorder::new("a", &log));
        registry.create();
        registry.destroy();
        log.take();

        registry.destroy();
        registry.drive_to(LifecycleState::Resumed);

        assert!(log.take().is_empty());
        assert_eq!(registry.state(), LifecycleState::Destroyed);
    }

    #[test]
    fn test_drive_to_initialized_stops_at_created() {
        let registry = LifecycleRegistry::new();
        registry.drive_to(LifecycleState::Started);

        registry.drive_to(LifecycleState::Initialized);

        assert_eq!(registry.state(), LifecycleState::Created);
    }

    #[test]
    fn test_invalid_transition_is_ignored() {
        let registry = LifecycleRegistry::new();
        registry.resume();
        assert_eq!(registry.state(), LifecycleState::Initialized);
    }

    #[test]
    fn test_unsubscribed_callbacks_stop_receiving() {
        let registry = LifecycleRegistry::new();
        let log = EventLog::new();
        let sub = registry.lifecycle().subscribe(LifecycleRecorder::new("a", &log));
        registry.create();
        registry.lifecycle().unsubscribe(sub);

        registry.start();

        assert_eq!(log.take(), vec!["a:create"]);
    }

    #[test]
    fn test_attached_registry_follows_parent() {
        let parent = LifecycleRegistry::new();
        parent.drive_to(LifecycleState::Started);

        let child = LifecycleRegistry::attached_to(&parent.lifecycle());
        assert_eq!(child.state(), LifecycleState::Started);

        parent.resume();
        assert_eq!(child.state(), LifecycleState::Resumed);

        parent.destroy();
        assert_eq!(child.state(), LifecycleState::Destroyed);
    }

    #[test]
    fn test_hooks_only_fire_configured_closures() {
        use std::cell::Cell;

        let registry = LifecycleRegistry::new();
        let starts = Rc::new(Cell::new(0));
        let counter = Rc::clone(&starts);
        registry
            .lifecycle()
            .subscribe(LifecycleHooks::new().with_start(move || counter.set(counter.get() + 1)));

        registry.drive_to(LifecycleState::Resumed);
        registry.drive_to(LifecycleState::Created);
        registry.drive_to(LifecycleState::Started);

        assert_eq!(starts.get(), 2);
    }
}
