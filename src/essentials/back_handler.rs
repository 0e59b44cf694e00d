//! # Back Handling
//!
//! An explicit back-dispatch chain. The host owns the root
//! [`BackDispatcher`] and calls [`BackDispatcher::back`] when the user asks
//! to go back; a `false` result means nobody handled it and the host should
//! fall back to its own behaviour.
//!
//! ```text
//! root dispatcher
//! ├── BackCallback (router pop)
//! ├── child dispatcher (list)      registered while the child is resumed
//! └── child dispatcher (details)   registered last, asked first
//!     └── BackCallback (details-local)
//! ```
//!
//! Among enabled targets the highest priority wins; ties go to the most
//! recently registered one.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use log::debug;

use super::lifecycle::{Lifecycle, LifecycleCallbacks};

pub const PRIORITY_DEFAULT: i32 = 0;

/// Anything that can sit in a dispatcher's chain.
pub trait BackTarget {
    fn is_enabled(&self) -> bool;
    fn priority(&self) -> i32;
    fn handle_back(&self) -> bool;
}

struct BackCallbackInner {
    enabled: Cell<bool>,
    priority: Cell<i32>,
    on_back: Box<dyn Fn()>,
}

/// A user-level back callback. Clones share the enabled flag.
#[derive(Clone)]
pub struct BackCallback {
    inner: Rc<BackCallbackInner>,
}

impl BackCallback {
    pub fn new(enabled: bool, on_back: impl Fn() + 'static) -> Self {
        Self::with_priority(enabled, PRIORITY_DEFAULT, on_back)
    }

    pub fn with_priority(enabled: bool, priority: i32, on_back: impl Fn() + 'static) -> Self {
        Self {
            inner: Rc::new(BackCallbackInner {
                enabled: Cell::new(enabled),
                priority: Cell::new(priority),
                on_back: Box::new(on_back),
            }),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.set(enabled);
    }

    pub fn set_priority(&self, priority: i32) {
        self.inner.priority.set(priority);
    }
}

impl BackTarget for BackCallback {
    fn is_enabled(&self) -> bool {
        self.inner.enabled.get()
    }

    fn priority(&self) -> i32 {
        self.inner.priority.get()
    }

    fn handle_back(&self) -> bool {
        (self.inner.on_back)();
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackRegistration(u64);

#[derive(Default)]
struct DispatcherInner {
    targets: Vec<(u64, Rc<dyn BackTarget>)>,
    next_id: u64,
}

#[derive(Clone, Default)]
pub struct BackDispatcher {
    inner: Rc<RefCell<DispatcherInner>>,
}

impl BackDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// A dispatcher chained into `parent` for as long as `lifecycle` is
    /// resumed: registered on resume, unregistered on pause and destroy.
    /// Warm but inactive children (started, not resumed) never intercept.
    pub fn child(parent: &BackDispatcher, lifecycle: &Lifecycle) -> Self {
        let child = Self::new();
        lifecycle.subscribe(ChildRegistration {
            parent: parent.clone(),
            child: child.clone(),
            registration: Cell::new(None),
        });
        child
    }

    pub fn register(&self, callback: &BackCallback) -> BackRegistration {
        self.register_target(Rc::new(callback.clone()))
    }

    pub fn register_target(&self, target: Rc<dyn BackTarget>) -> BackRegistration {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.targets.push((id, target));
        BackRegistration(id)
    }

    pub fn unregister(&self, registration: BackRegistration) {
        self.inner
            .borrow_mut()
            .targets
            .retain(|(id, _)| *id != registration.0);
    }

    pub fn is_registered(&self, registration: BackRegistration) -> bool {
        self.inner
            .borrow()
            .targets
            .iter()
            .any(|(id, _)| *id == registration.0)
    }

    /// Delivers a back event. Returns whether any target handled it.
    pub fn back(&self) -> bool {
        let candidate = {
            let inner = self.inner.borrow();
            let mut best: Option<Rc<dyn BackTarget>> = None;
            for (_, target) in &inner.targets {
                if !target.is_enabled() {
                    continue;
                }
                // `>=` so later registrations win ties.
                if best.as_ref().is_none_or(|b| target.priority() >= b.priority()) {
                    best = Some(Rc::clone(target));
                }
            }
            best
        };

        match candidate {
            Some(target) => target.handle_back(),
            None => {
                debug!("Back event not handled");
                false
            }
        }
    }

    fn enabled_priority(&self) -> Option<i32> {
        self.inner
            .borrow()
            .targets
            .iter()
            .filter(|(_, t)| t.is_enabled())
            .map(|(_, t)| t.priority())
            .max()
    }
}

impl BackTarget for BackDispatcher {
    fn is_enabled(&self) -> bool {
        self.enabled_priority().is_some()
    }

    fn priority(&self) -> i32 {
        self.enabled_priority().unwrap_or(PRIORITY_DEFAULT)
    }

    fn handle_back(&self) -> bool {
        self.back()
    }
}

struct ChildRegistration {
    parent: BackDispatcher,
    child: BackDispatcher,
    registration: Cell<Option<BackRegistration>>,
}

impl ChildRegistration {
    fn detach(&self) {
        if let Some(registration) = self.registration.take() {
            self.parent.unregister(registration);
        }
    }
}

impl LifecycleCallbacks for ChildRegistration {
    fn on_resume(&self) {
        self.detach();
        let registration = self.parent.register_target(Rc::new(self.child.clone()));
        self.registration.set(Some(registration));
    }

    fn on_pause(&self) {
        self.detach();
    }

    fn on_destroy(&self) {
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::essentials::lifecycle::{LifecycleRegistry, LifecycleState};
    use crate::test_support::EventLog;

    fn recording(log: &EventLog, name: &'static str, enabled: bool) -> BackCallback {
        let log = log.clone();
        BackCallback::new(enabled, move || log.push(name))
    }

    #[test]
    fn test_back_without_targets_is_unhandled() {
        assert!(!BackDispatcher::new().back());
    }

    #[test]
    fn test_last_registered_enabled_callback_wins() {
        let dispatcher = BackDispatcher::new();
        let log = EventLog::new();
        dispatcher.register(&recording(&log, "first", true));
        dispatcher.register(&recording(&log, "second", true));
        dispatcher.register(&recording(&log, "disabled", false));

        assert!(dispatcher.back());
        assert_eq!(log.take(), vec!["second"]);
    }

    #[test]
    fn test_higher_priority_beats_registration_order() {
        let dispatcher = BackDispatcher::new();
        let log = EventLog::new();
        let log_clone = log.clone();
        dispatcher.register(&BackCallback::with_priority(true, 10, move || {
            log_clone.push("urgent")
        }));
        dispatcher.register(&recording(&log, "normal", true));

        dispatcher.back();
        assert_eq!(log.take(), vec!["urgent"]);
    }

    #[test]
    fn test_toggling_enabled_flag_through_clone() {
        let dispatcher = BackDispatcher::new();
        let log = EventLog::new();
        let callback = recording(&log, "cb", false);
        dispatcher.register(&callback);

        assert!(!dispatcher.back());
        callback.set_enabled(true);
        assert!(dispatcher.back());
        assert_eq!(log.take(), vec!["cb"]);
    }

    #[test]
    fn test_child_dispatcher_is_chained_only_while_resumed() {
        let parent = BackDispatcher::new();
        let lifecycle = LifecycleRegistry::new();
        let child = BackDispatcher::child(&parent, &lifecycle.lifecycle());
        let log = EventLog::new();
        child.register(&recording(&log, "child", true));

        lifecycle.drive_to(LifecycleState::Started);
        assert!(!parent.back());

        lifecycle.drive_to(LifecycleState::Resumed);
        assert!(parent.back());

        lifecycle.drive_to(LifecycleState::Started);
        assert!(!parent.back());

        lifecycle.drive_to(LifecycleState::Resumed);
        lifecycle.destroy();
        assert!(!parent.back());
        assert_eq!(log.take(), vec!["child"]);
    }

    #[test]
    fn test_child_without_enabled_callbacks_falls_through_to_parent_callback() {
        let parent = BackDispatcher::new();
        let log = EventLog::new();
        parent.register(&recording(&log, "parent", true));

        let lifecycle = LifecycleRegistry::new();
        let child = BackDispatcher::child(&parent, &lifecycle.lifecycle());
        child.register(&recording(&log, "child", false));
        lifecycle.drive_to(LifecycleState::Resumed);

        assert!(parent.back());
        assert_eq!(log.take(), vec!["parent"]);
    }
}
