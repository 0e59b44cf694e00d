//! Test utilities shared across the crate.
//!
//! This module is only compiled during tests (`#[cfg(test)]`).

use std::cell::{Cell, RefCell};
use std::fmt::Display;
use std::rc::Rc;

use crate::context::{ComponentContext, DefaultRoot};
use crate::essentials::{Instance, LifecycleCallbacks, LifecycleState};
use crate::router::ChildFactoryError;

/// Ordered, shared record of what happened during a test.
#[derive(Clone, Default)]
pub struct EventLog(Rc<RefCell<Vec<String>>>);

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: impl Into<String>) {
        self.0.borrow_mut().push(event.into());
    }

    /// Returns everything logged so far and clears the log.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.borrow_mut())
    }
}

/// Logs `"{name}:{callback}"` for every lifecycle callback it receives.
pub struct LifecycleRecorder {
    name: String,
    log: EventLog,
}

impl LifecycleRecorder {
    pub fn new(name: impl Into<String>, log: &EventLog) -> Self {
        Self {
            name: name.into(),
            log: log.clone(),
        }
    }

    fn record(&self, callback: &str) {
        self.log.push(format!("{}:{}", self.name, callback));
    }
}

impl LifecycleCallbacks for LifecycleRecorder {
    fn on_create(&self) {
        self.record("create");
    }

    fn on_start(&self) {
        self.record("start");
    }

    fn on_resume(&self) {
        self.record("resume");
    }

    fn on_pause(&self) {
        self.record("pause");
    }

    fn on_stop(&self) {
        self.record("stop");
    }

    fn on_destroy(&self) {
        self.record("destroy");
    }
}

/// Counts `on_destroy` calls.
pub struct Tracked {
    destroyed: Rc<Cell<usize>>,
}

impl Tracked {
    pub fn new(destroyed: &Rc<Cell<usize>>) -> Self {
        Self {
            destroyed: Rc::clone(destroyed),
        }
    }
}

impl Instance for Tracked {
    fn on_destroy(&self) {
        self.destroyed.set(self.destroyed.get() + 1);
    }
}

/// A minimal child component: records its lifecycle into a shared log and
/// retains one [`Tracked`] instance.
pub struct Probe {
    pub name: String,
    pub ctx: ComponentContext,
}

/// Shared counters behind [`probe_factory`].
#[derive(Clone, Default)]
pub struct ProbeStats {
    pub log: EventLog,
    pub created: Rc<Cell<usize>>,
    pub retained_destroyed: Rc<Cell<usize>>,
}

pub fn probe_factory<C: Display>(
    stats: &ProbeStats,
) -> impl Fn(C, ComponentContext) -> Result<Probe, ChildFactoryError> + 'static {
    let stats = stats.clone();
    move |configuration: C, ctx: ComponentContext| {
        let name = configuration.to_string();
        stats.created.set(stats.created.get() + 1);
        ctx.lifecycle
            .subscribe(LifecycleRecorder::new(name.clone(), &stats.log));
        let destroyed = Rc::clone(&stats.retained_destroyed);
        ctx.instance_keeper
            .get_or_create("tracked", || Tracked::new(&destroyed))?;
        Ok(Probe { name, ctx })
    }
}

/// A root context already driven to `Resumed`.
pub fn resumed_root() -> DefaultRoot {
    let root = DefaultRoot::new(None);
    root.lifecycle.drive_to(LifecycleState::Resumed);
    root
}
