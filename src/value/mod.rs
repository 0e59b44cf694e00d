//! # Observable Values
//!
//! [`Value<T>`] is a read-only handle to a single current value;
//! [`MutableValue<T>`] is the writable side. Observers are plain callbacks
//! kept in registration order and invoked synchronously.
//!
//! ```text
//! MutableValue::set(v)
//!   └─▶ observer 1 (&v)
//!   └─▶ observer 2 (&v)   ── may call set(w): w is stored, delivered after
//!                            this round instead of recursing
//! ```
//!
//! See [`observe`] for subscriptions tied to a lifecycle.

pub mod observe;

use std::cell::{Cell, RefCell};
use std::ops::Deref;
use std::rc::{Rc, Weak};

pub use observe::ObserveLifecycleMode;

/// Severs a subscription. Cancelling twice is a no-op.
pub struct Cancellation {
    cancel: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl Cancellation {
    pub(crate) fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: RefCell::new(Some(Box::new(cancel))),
        }
    }

    pub fn cancel(&self) {
        let cancel = self.cancel.borrow_mut().take();
        if let Some(cancel) = cancel {
            cancel();
        }
    }
}

type Observer<T> = Rc<dyn Fn(&T)>;

struct ValueInner<T> {
    value: RefCell<T>,
    observers: RefCell<Vec<(u64, Observer<T>)>>,
    next_id: Cell<u64>,
    emitting: Cell<bool>,
    dirty: Cell<bool>,
}

impl<T> ValueInner<T> {
    fn is_subscribed(&self, id: u64) -> bool {
        self.observers.borrow().iter().any(|(i, _)| *i == id)
    }
}

pub struct Value<T> {
    inner: Rc<ValueInner<T>>,
}

impl<T> Clone for Value<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + 'static> Value<T> {
    /// Latest value.
    pub fn value(&self) -> T {
        self.inner.value.borrow().clone()
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let value = self.inner.value.borrow();
        f(&*value)
    }

    /// Delivers the current value right away, then every change until
    /// cancelled.
    pub fn subscribe(&self, observer: impl Fn(&T) + 'static) -> Cancellation {
        self.subscribe_rc(Rc::new(observer))
    }

    pub fn subscribe_rc(&self, observer: Rc<dyn Fn(&T)>) -> Cancellation {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner
            .observers
            .borrow_mut()
            .push((id, Rc::clone(&observer)));

        let current = self.value();
        observer(&current);

        let weak: Weak<ValueInner<T>> = Rc::downgrade(&self.inner);
        Cancellation::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.observers.borrow_mut().retain(|(i, _)| *i != id);
            }
        })
    }

    pub fn observer_count(&self) -> usize {
        self.inner.observers.borrow().len()
    }
}

pub struct MutableValue<T> {
    value: Value<T>,
}

impl<T> Clone for MutableValue<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
        }
    }
}

impl<T> Deref for MutableValue<T> {
    type Target = Value<T>;

    fn deref(&self) -> &Value<T> {
        &self.value
    }
}

impl<T: Clone + 'static> MutableValue<T> {
    pub fn new(initial: T) -> Self {
        Self {
            value: Value {
                inner: Rc::new(ValueInner {
                    value: RefCell::new(initial),
                    observers: RefCell::new(Vec::new()),
                    next_id: Cell::new(0),
                    emitting: Cell::new(false),
                    dirty: Cell::new(false),
                }),
            },
        }
    }

    /// Read-only view sharing this value.
    pub fn as_value(&self) -> Value<T> {
        self.value.clone()
    }

    pub fn set(&self, value: T) {
        let inner = &self.value.inner;
        *inner.value.borrow_mut() = value;

        if inner.emitting.get() {
            inner.dirty.set(true);
            return;
        }

        inner.emitting.set(true);
        loop {
            inner.dirty.set(false);
            let current = self.value.value();
            let observers: Vec<(u64, Observer<T>)> = inner
                .observers
                .borrow()
                .iter()
                .map(|(id, o)| (*id, Rc::clone(o)))
                .collect();
            for (id, observer) in observers {
                if inner.is_subscribed(id) {
                    observer(&current);
                }
            }
            if !inner.dirty.get() {
                break;
            }
        }
        inner.emitting.set(false);
    }

    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let next = self.with(f);
        self.set(next);
    }
}
