//! Lifecycle-scoped subscriptions.
//!
//! The subscription opens at one lifecycle boundary and closes at its pair.
//! Because lifecycle subscriptions replay past transitions, subscribing to a
//! lifecycle that is already started (for `StartStop`) opens immediately.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::{Cancellation, Value};
use crate::essentials::{Lifecycle, LifecycleCallbacks, LifecycleSubscription};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObserveLifecycleMode {
    CreateDestroy,
    #[default]
    StartStop,
    ResumePause,
}

struct ScopedObserver<T> {
    value: Value<T>,
    mode: ObserveLifecycleMode,
    observer: Rc<dyn Fn(&T)>,
    cancellation: RefCell<Option<Cancellation>>,
}

impl<T: Clone + 'static> ScopedObserver<T> {
    fn open(&self, mode: ObserveLifecycleMode) {
        if self.mode != mode {
            return;
        }
        let cancellation = self.value.subscribe_rc(Rc::clone(&self.observer));
        let previous = self.cancellation.replace(Some(cancellation));
        if let Some(previous) = previous {
            previous.cancel();
        }
    }

    fn close(&self, mode: ObserveLifecycleMode) {
        if self.mode != mode {
            return;
        }
        let cancellation = self.cancellation.borrow_mut().take();
        if let Some(cancellation) = cancellation {
            cancellation.cancel();
        }
    }
}

impl<T: Clone + 'static> LifecycleCallbacks for ScopedObserver<T> {
    fn on_create(&self) {
        self.open(ObserveLifecycleMode::CreateDestroy);
    }

    fn on_start(&self) {
        self.open(ObserveLifecycleMode::StartStop);
    }

    fn on_resume(&self) {
        self.open(ObserveLifecycleMode::ResumePause);
    }

    fn on_pause(&self) {
        self.close(ObserveLifecycleMode::ResumePause);
    }

    fn on_stop(&self) {
        self.close(ObserveLifecycleMode::StartStop);
    }

    fn on_destroy(&self) {
        self.close(ObserveLifecycleMode::CreateDestroy);
    }
}

impl<T: Clone + 'static> Value<T> {
    /// Observes this value only while `lifecycle` is inside the window
    /// selected by `mode`.
    pub fn subscribe_scoped(
        &self,
        lifecycle: &Lifecycle,
        mode: ObserveLifecycleMode,
        observer: impl Fn(&T) + 'static,
    ) -> LifecycleSubscription {
        lifecycle.subscribe(ScopedObserver {
            value: self.clone(),
            mode,
            observer: Rc::new(observer),
            cancellation: RefCell::new(None),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::essentials::{LifecycleRegistry, LifecycleState};
    use crate::value::MutableValue;

    fn scoped(
        value: &MutableValue<u32>,
        lifecycle: &LifecycleRegistry,
        mode: ObserveLifecycleMode,
    ) -> Rc<RefCell<Vec<u32>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        value.subscribe_scoped(&lifecycle.lifecycle(), mode, move |v| {
            sink.borrow_mut().push(*v)
        });
        seen
    }

    #[test]
    fn test_start_stop_window() {
        let value = MutableValue::new(0);
        let lifecycle = LifecycleRegistry::new();
        let seen = scoped(&value, &lifecycle, ObserveLifecycleMode::StartStop);

        lifecycle.create();
        value.set(1);
        lifecycle.start();
        value.set(2);
        lifecycle.stop();
        value.set(3);

        assert_eq!(*seen.borrow(), vec![1, 2]);
        assert_eq!(value.observer_count(), 0);
    }

    #[test]
    fn test_subscribes_immediately_when_already_past_boundary() {
        let value = MutableValue::new(7);
        let lifecycle = LifecycleRegistry::new();
        lifecycle.drive_to(LifecycleState::Resumed);

        let seen = scoped(&value, &lifecycle, ObserveLifecycleMode::StartStop);

        assert_eq!(*seen.borrow(), vec![7]);
    }

    #[test]
    fn test_resume_pause_resubscribes_each_window() {
        let value = MutableValue::new(0);
        let lifecycle = LifecycleRegistry::new();
        let seen = scoped(&value, &lifecycle, ObserveLifecycleMode::ResumePause);

        lifecycle.drive_to(LifecycleState::Resumed);
        lifecycle.pause();
        value.set(5);
        lifecycle.resume();

        assert_eq!(*seen.borrow(), vec![0, 5]);
    }

    #[test]
    fn test_create_destroy_window_closes_on_destroy() {
        let value = MutableValue::new(0);
        let lifecycle = LifecycleRegistry::new();
        let seen = scoped(&value, &lifecycle, ObserveLifecycleMode::CreateDestroy);

        lifecycle.drive_to(LifecycleState::Resumed);
        value.set(1);
        lifecycle.destroy();
        value.set(2);

        assert_eq!(*seen.borrow(), vec![0, 1]);
    }
}
