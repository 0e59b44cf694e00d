//! Navigation state: the declarative description routers reconcile against.

use serde::{Deserialize, Serialize};

use crate::essentials::LifecycleState;

/// Desired status of a child. `Resumed` implies `Started` implies `Created`;
/// `Destroyed` keeps the configuration (and its saved state) around without a
/// live instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Status {
    Destroyed,
    Created,
    Started,
    Resumed,
}

impl Status {
    pub fn lifecycle_state(self) -> LifecycleState {
        match self {
            Status::Destroyed => LifecycleState::Destroyed,
            Status::Created => LifecycleState::Created,
            Status::Started => LifecycleState::Started,
            Status::Resumed => LifecycleState::Resumed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildNavState<C> {
    pub configuration: C,
    pub status: Status,
}

impl<C> ChildNavState<C> {
    pub fn new(configuration: C, status: Status) -> Self {
        Self {
            configuration,
            status,
        }
    }
}

/// A caller-defined navigation state. Order matters: entries later in the
/// list are considered in front of earlier ones.
pub trait NavState<C> {
    fn children(&self) -> Vec<ChildNavState<C>>;

    /// Checked on restored states only. A restored state that fails this is
    /// discarded and the initial state is used instead.
    fn is_valid(&self) -> bool {
        true
    }
}

/// Entries in a child list are unique by configuration equality.
pub(crate) fn first_duplicate<C: PartialEq>(entries: &[ChildNavState<C>]) -> Option<&C> {
    entries.iter().enumerate().find_map(|(i, entry)| {
        entries[i + 1..]
            .iter()
            .any(|other| other.configuration == entry.configuration)
            .then_some(&entry.configuration)
    })
}
