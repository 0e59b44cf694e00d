//! Navigation sources.
//!
//! A [`SimpleNavigation`] is the write side routers subscribe to. Components
//! keep a clone and call `navigate`; the router that owns the children turns
//! the event into a new navigation state.

use std::cell::RefCell;
use std::rc::Rc;

use log::warn;

use super::NavigationError;

type Subscriber<E> = Rc<dyn Fn(E) -> Result<(), NavigationError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigationSubscription(u64);

struct NavigationInner<E> {
    subscribers: Vec<(u64, Subscriber<E>)>,
    next_id: u64,
}

pub struct SimpleNavigation<E> {
    inner: Rc<RefCell<NavigationInner<E>>>,
}

impl<E> Clone for SimpleNavigation<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<E: Clone + 'static> Default for SimpleNavigation<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Clone + 'static> SimpleNavigation<E> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(NavigationInner {
                subscribers: Vec::new(),
                next_id: 0,
            })),
        }
    }

    pub fn subscribe(
        &self,
        subscriber: impl Fn(E) -> Result<(), NavigationError> + 'static,
    ) -> NavigationSubscription {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.subscribers.push((id, Rc::new(subscriber)));
        NavigationSubscription(id)
    }

    pub fn unsubscribe(&self, subscription: NavigationSubscription) {
        self.inner
            .borrow_mut()
            .subscribers
            .retain(|(id, _)| *id != subscription.0);
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().subscribers.len()
    }

    /// Delivers `event` to every subscriber in order, stopping at the first
    /// error.
    pub fn navigate(&self, event: E) -> Result<(), NavigationError> {
        let subscribers: Vec<Subscriber<E>> = self
            .inner
            .borrow()
            .subscribers
            .iter()
            .map(|(_, s)| Rc::clone(s))
            .collect();

        if subscribers.is_empty() {
            warn!("Navigation event dropped: no router is listening");
        }
        for subscriber in subscribers {
            subscriber(event.clone())?;
        }
        Ok(())
    }
}
