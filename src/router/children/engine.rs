use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::context::ComponentContext;
use crate::essentials::{
    BackCallback, BackDispatcher, BackRegistration, InstanceKeeper, KeeperError,
    LifecycleCallbacks, LifecycleRegistry, SavedState, StateKeeper,
};
use crate::router::navigation::NavigationSubscription;
use crate::router::{Configuration, NavigationError, PersistenceSink};
use crate::value::{MutableValue, Value};

use super::{Child, ChildNavState, ChildrenOptions, CreatedChild, NavState, Status, first_duplicate};

/// What a router writes under its key in the parent state keeper.
#[derive(Debug, Serialize, Deserialize)]
struct SavedChildren {
    nav_state: serde_json::Value,
    /// Saved state per child key, including children kept as `Destroyed`.
    child_states: BTreeMap<String, SavedState>,
}

enum Pending<E> {
    Event(E),
    Back,
}

struct LiveChild<C, T> {
    configuration: C,
    key: String,
    status: Status,
    instance: Rc<T>,
    lifecycle: LifecycleRegistry,
    state_keeper: StateKeeper,
}

pub(super) struct Router<C, N, T, E, S> {
    key: String,
    parent: ComponentContext,
    options: ChildrenOptions<C, N, T, E, S>,
    state: RefCell<Option<N>>,
    live: RefCell<Vec<LiveChild<C, T>>>,
    /// Saved state of children currently listed as `Destroyed`.
    tombstones: RefCell<BTreeMap<String, SavedState>>,
    /// Saved child state from the previous incarnation, consumed by the first pass.
    restored: RefCell<BTreeMap<String, SavedState>>,
    pending: RefCell<VecDeque<Pending<E>>>,
    busy: Cell<bool>,
    torn_down: Cell<bool>,
    output: RefCell<Option<MutableValue<S>>>,
    back_callback: Option<BackCallback>,
    back_registration: Cell<Option<BackRegistration>>,
    nav_subscription: Cell<Option<NavigationSubscription>>,
}

impl<C, N, T, E, S> Router<C, N, T, E, S>
where
    C: Configuration,
    N: NavState<C> + Clone + PartialEq + 'static,
    T: 'static,
    E: Clone + 'static,
    S: Clone + 'static,
{
    pub(super) fn start(
        ctx: &ComponentContext,
        options: ChildrenOptions<C, N, T, E, S>,
    ) -> Result<Value<S>, NavigationError> {
        let key = options.key.clone();
        let has_back = options.back_transformer.is_some();

        let router = Rc::new_cyclic(|weak: &std::rc::Weak<Self>| {
            let back_callback = has_back.then(|| {
                let weak = weak.clone();
                BackCallback::new(false, move || {
                    if let Some(router) = weak.upgrade()
                        && let Err(e) = router.enqueue(Pending::Back)
                    {
                        warn!("Back navigation failed: {}", e);
                    }
                })
            });
            Router {
                key: key.clone(),
                parent: ctx.clone(),
                options,
                state: RefCell::new(None),
                live: RefCell::new(Vec::new()),
                tombstones: RefCell::new(BTreeMap::new()),
                restored: RefCell::new(BTreeMap::new()),
                pending: RefCell::new(VecDeque::new()),
                busy: Cell::new(false),
                torn_down: Cell::new(false),
                output: RefCell::new(None),
                back_callback,
                back_registration: Cell::new(None),
                nav_subscription: Cell::new(None),
            }
        });

        // Reserves the key; the supplier yields nothing once the router is gone.
        let weak = Rc::downgrade(&router);
        ctx.state_keeper
            .register(&key, move || weak.upgrade().and_then(|r| r.saved_children()))
            .map_err(|e| match e {
                KeeperError::AlreadyRegistered(key) => NavigationError::KeyAlreadyRegistered(key),
                other => NavigationError::Keeper(other),
            })?;

        // Registered before any child so children, registering later, come first.
        if let Some(callback) = &router.back_callback {
            router
                .back_registration
                .set(Some(ctx.back_handler.register(callback)));
        }

        // Subscribed before the first pass: navigations issued while it runs
        // are queued behind it.
        let subscriber = Rc::clone(&router);
        let subscription = router
            .options
            .source
            .subscribe(move |event| subscriber.enqueue(Pending::Event(event)));
        router.nav_subscription.set(Some(subscription));

        let initial = router.restore();
        router.busy.set(true);
        let result = router.apply(initial).and_then(|()| router.drain());
        router.busy.set(false);
        router.restored.borrow_mut().clear();
        if let Err(e) = result {
            error!("Router '{}' failed to start: {}", key, e);
            router.teardown();
            for child in router.live.borrow().iter() {
                ctx.instance_keeper.release(&child.key);
            }
            ctx.state_keeper.unregister(&key);
            return Err(e);
        }

        ctx.lifecycle.subscribe(ParentLifecycle(Rc::clone(&router)));

        let output = router.output.borrow().as_ref().map(MutableValue::as_value);
        match output {
            Some(value) => {
                info!("Router '{}' started", key);
                Ok(value)
            }
            None => unreachable!("the first pass always publishes"),
        }
    }

    fn restore(&self) -> N {
        if let Some(codec) = &self.options.codec {
            let saved = self
                .parent
                .state_keeper
                .consume::<Option<SavedChildren>>(&self.key)
                .flatten();
            if let Some(saved) = saved {
                match codec.decode(saved.nav_state).and_then(|state| self.check_restored(state)) {
                    Ok(state) => {
                        info!(
                            "Router '{}': restored navigation state with {} saved children",
                            self.key,
                            saved.child_states.len()
                        );
                        *self.restored.borrow_mut() = saved.child_states;
                        return state;
                    }
                    Err(e) => warn!("Router '{}': discarding saved navigation: {}", self.key, e),
                }
            }
        }
        (self.options.initial_state)()
    }

    /// A restored state must be usable as is: no duplicates, and valid by
    /// the state's own rules.
    fn check_restored(&self, state: N) -> Result<N, NavigationError> {
        if let Some(duplicate) = first_duplicate(&state.children()) {
            return Err(NavigationError::DuplicateConfiguration(format!("{duplicate:?}")));
        }
        if !state.is_valid() {
            return Err(NavigationError::Codec("restored state is not valid".to_string()));
        }
        Ok(state)
    }

    fn enqueue(&self, pending: Pending<E>) -> Result<(), NavigationError> {
        if self.torn_down.get() {
            warn!("Router '{}': navigation after destroy ignored", self.key);
            return Ok(());
        }
        self.pending.borrow_mut().push_back(pending);
        if self.busy.get() {
            debug!("Router '{}': navigation queued behind the running pass", self.key);
            return Ok(());
        }

        self.busy.set(true);
        let result = self.drain();
        self.busy.set(false);
        result
    }

    fn drain(&self) -> Result<(), NavigationError> {
        loop {
            let next = self.pending.borrow_mut().pop_front();
            let Some(next) = next else {
                return Ok(());
            };
            if let Err(e) = self.step(next) {
                self.pending.borrow_mut().clear();
                return Err(e);
            }
        }
    }

    fn step(&self, pending: Pending<E>) -> Result<(), NavigationError> {
        let current = self.state.borrow().clone();
        let Some(current) = current else {
            return Ok(());
        };
        let next = match pending {
            Pending::Event(event) => (self.options.nav_transformer)(&current, event)?,
            Pending::Back => match self.options.back_transformer.as_ref().and_then(|f| f(&current)) {
                Some(next) => next,
                None => return Ok(()),
            },
        };
        self.apply(next)
    }

    fn child_key(&self, configuration: &C) -> Result<String, NavigationError> {
        let encoded =
            serde_json::to_string(configuration).map_err(|e| NavigationError::Codec(e.to_string()))?;
        Ok(format!("{}/{}", self.key, encoded))
    }

    fn apply(&self, new_state: N) -> Result<(), NavigationError> {
        let entries = new_state.children();
        if let Some(duplicate) = first_duplicate(&entries) {
            return Err(NavigationError::DuplicateConfiguration(format!("{duplicate:?}")));
        }
        let keys = entries
            .iter()
            .map(|entry| self.child_key(&entry.configuration))
            .collect::<Result<Vec<_>, _>>()?;

        let old_state = self.state.borrow().clone();
        if old_state.as_ref() == Some(&new_state) {
            debug!("Router '{}': state unchanged", self.key);
            return Ok(());
        }

        let previous = std::mem::take(&mut *self.live.borrow_mut());
        let mut retained = Vec::with_capacity(previous.len());
        for child in previous.into_iter().rev() {
            let requested = entries
                .iter()
                .find(|entry| entry.configuration == child.configuration)
                .map(|entry| entry.status);
            match requested {
                Some(Status::Destroyed) => {
                    let saved = child.state_keeper.save();
                    let key = child.key.clone();
                    self.destroy_child(child);
                    self.tombstones.borrow_mut().insert(key, saved);
                }
                Some(_) => retained.push(child),
                None => self.destroy_child(child),
            }
        }

        let mut next = Vec::with_capacity(entries.len());
        for (entry, key) in entries.iter().zip(&keys) {
            if entry.status == Status::Destroyed {
                continue;
            }
            let existing = retained
                .iter()
                .position(|child| child.configuration == entry.configuration);
            let mut child = match existing {
                Some(index) => retained.swap_remove(index),
                None => match self.instantiate(entry.configuration.clone(), key.clone()) {
                    Ok(child) => child,
                    Err(e) => {
                        next.append(&mut retained);
                        *self.live.borrow_mut() = next;
                        return Err(e);
                    }
                },
            };
            child.status = entry.status;
            next.push(child);
        }

        let targets: Vec<(LifecycleRegistry, Status)> = next
            .iter()
            .map(|child| (child.lifecycle.clone(), child.status))
            .collect();
        *self.live.borrow_mut() = next;
        *self.state.borrow_mut() = Some(new_state.clone());

        let destroyed_keys: Vec<&String> = entries
            .iter()
            .zip(&keys)
            .filter(|(entry, _)| entry.status == Status::Destroyed)
            .map(|(_, key)| key)
            .collect();
        {
            let mut restored = self.restored.borrow_mut();
            let mut tombstones = self.tombstones.borrow_mut();
            for key in &destroyed_keys {
                if let Some(saved) = restored.remove(*key) {
                    tombstones.insert((*key).clone(), saved);
                }
            }
            tombstones.retain(|key, _| destroyed_keys.contains(&key));
        }

        self.drive(&targets);
        self.publish(&new_state, old_state.as_ref(), entries);
        Ok(())
    }

    fn instantiate(&self, configuration: C, key: String) -> Result<LiveChild<C, T>, NavigationError> {
        let saved = self
            .restored
            .borrow_mut()
            .remove(&key)
            .or_else(|| self.tombstones.borrow_mut().remove(&key));

        let instance_keeper = (*self
            .parent
            .instance_keeper
            .get_or_create(&key, InstanceKeeper::new)?)
        .clone();
        let lifecycle = LifecycleRegistry::new();
        let state_keeper = StateKeeper::new(saved);
        let back_handler = BackDispatcher::child(&self.parent.back_handler, &lifecycle.lifecycle());
        let context = ComponentContext::new(
            lifecycle.lifecycle(),
            state_keeper.clone(),
            instance_keeper,
            back_handler,
        );

        match (self.options.child_factory)(configuration.clone(), context) {
            Ok(instance) => {
                debug!("Router '{}': created child {}", self.key, key);
                Ok(LiveChild {
                    configuration,
                    key,
                    status: Status::Created,
                    instance: Rc::new(instance),
                    lifecycle,
                    state_keeper,
                })
            }
            Err(source) => {
                lifecycle.destroy();
                self.parent.instance_keeper.release(&key);
                Err(NavigationError::Factory {
                    configuration: key,
                    source,
                })
            }
        }
    }

    fn destroy_child(&self, child: LiveChild<C, T>) {
        debug!("Router '{}': destroying child {}", self.key, child.key);
        child.lifecycle.destroy();
        self.parent.instance_keeper.release(&child.key);
    }

    /// Demotes front to back, then promotes back to front, capping every
    /// child at the parent's own state.
    fn drive(&self, targets: &[(LifecycleRegistry, Status)]) {
        let parent = self.parent.lifecycle.state();
        let cap = |status: Status| status.lifecycle_state().min(parent);

        for (lifecycle, status) in targets.iter().rev() {
            let target = cap(*status);
            if target < lifecycle.state() {
                lifecycle.drive_to(target);
            }
        }
        for (lifecycle, status) in targets {
            let target = cap(*status);
            if target > lifecycle.state() {
                lifecycle.drive_to(target);
            }
        }
    }

    fn publish(&self, state: &N, previous: Option<&N>, entries: Vec<ChildNavState<C>>) {
        let children: Vec<Child<C, T>> = {
            let live = self.live.borrow();
            entries
                .into_iter()
                .map(|entry| {
                    let found = live
                        .iter()
                        .find(|child| child.configuration == entry.configuration);
                    match found {
                        Some(child) if entry.status != Status::Destroyed => {
                            Child::Created(CreatedChild {
                                configuration: entry.configuration,
                                instance: Rc::clone(&child.instance),
                            })
                        }
                        _ => Child::Destroyed {
                            configuration: entry.configuration,
                        },
                    }
                })
                .collect()
        };

        let snapshot = (self.options.state_mapper)(state, &children);
        let output = self.output.borrow().clone();
        match output {
            Some(output) => output.set(snapshot),
            None => *self.output.borrow_mut() = Some(MutableValue::new(snapshot)),
        }
        debug!("Router '{}': published {} children", self.key, children.len());

        if let (Some(callback), Some(back)) = (&self.back_callback, &self.options.back_transformer) {
            callback.set_enabled(back(state).is_some());
        }
        if let Some(listener) = &self.options.on_state_changed {
            listener(state, previous);
        }
        if let Some(sink) = &self.options.sink {
            self.persist_to(&**sink);
        }
    }

    fn persist_to(&self, sink: &dyn PersistenceSink) {
        let Some(saved) = self.saved_children() else {
            return;
        };
        match serde_json::to_value(&saved) {
            Ok(value) => {
                let mut document = SavedState::new();
                document.insert(self.key.clone(), value);
                sink.persist(&self.key, &document);
            }
            Err(e) => warn!("Router '{}': failed to encode for persistence: {}", self.key, e),
        }
    }

    fn saved_children(&self) -> Option<SavedChildren> {
        let codec = self.options.codec.as_ref()?;
        let state = self.state.borrow().clone()?;
        let nav_state = match codec.encode(&state) {
            Ok(value) => value,
            Err(e) => {
                warn!("Router '{}': failed to save navigation state: {}", self.key, e);
                return None;
            }
        };

        let mut child_states = self.tombstones.borrow().clone();
        let keepers: Vec<(String, StateKeeper)> = self
            .live
            .borrow()
            .iter()
            .map(|child| (child.key.clone(), child.state_keeper.clone()))
            .collect();
        for (key, keeper) in keepers {
            child_states.insert(key, keeper.save());
        }
        Some(SavedChildren {
            nav_state,
            child_states,
        })
    }

    fn on_parent_transition(&self) {
        if self.torn_down.get() {
            return;
        }
        let targets: Vec<(LifecycleRegistry, Status)> = self
            .live
            .borrow()
            .iter()
            .map(|child| (child.lifecycle.clone(), child.status))
            .collect();

        let was_busy = self.busy.replace(true);
        self.drive(&targets);
        if !was_busy {
            if let Err(e) = self.drain() {
                error!("Router '{}': queued navigation failed: {}", self.key, e);
            }
            self.busy.set(false);
        }
    }

    /// Parent destroyed: stop listening and destroy every live child. Their
    /// retained instances stay in the parent keeper so a recreated parent
    /// finds them again.
    fn teardown(&self) {
        if self.torn_down.replace(true) {
            return;
        }
        if let Some(subscription) = self.nav_subscription.take() {
            self.options.source.unsubscribe(subscription);
        }
        if let Some(registration) = self.back_registration.take() {
            self.parent.back_handler.unregister(registration);
        }
        self.pending.borrow_mut().clear();

        let lifecycles: Vec<LifecycleRegistry> = self
            .live
            .borrow()
            .iter()
            .rev()
            .map(|child| child.lifecycle.clone())
            .collect();
        for lifecycle in lifecycles {
            lifecycle.destroy();
        }
        info!("Router '{}' torn down", self.key);
    }
}

struct ParentLifecycle<C, N, T, E, S>(Rc<Router<C, N, T, E, S>>);

impl<C, N, T, E, S> LifecycleCallbacks for ParentLifecycle<C, N, T, E, S>
where
    C: Configuration,
    N: NavState<C> + Clone + PartialEq + 'static,
    T: 'static,
    E: Clone + 'static,
    S: Clone + 'static,
{
    fn on_create(&self) {
        self.0.on_parent_transition();
    }

    fn on_start(&self) {
        self.0.on_parent_transition();
    }

    fn on_resume(&self) {
        self.0.on_parent_transition();
    }

    fn on_pause(&self) {
        self.0.on_parent_transition();
    }

    fn on_stop(&self) {
        self.0.on_parent_transition();
    }

    fn on_destroy(&self) {
        self.0.teardown();
    }
}
