//! # Essentials
//!
//! The four capabilities every component receives, independent of routing:
//!
//! - [`lifecycle`]: `Lifecycle` / `LifecycleRegistry` state machine
//! - [`state_keeper`]: `StateKeeper` and the `SavedState` document
//! - [`instance_keeper`]: `InstanceKeeper` for retained instances
//! - [`back_handler`]: `BackDispatcher` chain and `BackCallback`
//!
//! Everything here is single threaded (`Rc` + `RefCell`). Callbacks are
//! always invoked with no internal borrow held, so they may call back into
//! the same object.

pub mod back_handler;
pub mod instance_keeper;
pub mod lifecycle;
pub mod state_keeper;

use std::fmt;

pub use back_handler::{BackCallback, BackDispatcher, BackRegistration, BackTarget};
pub use instance_keeper::{Instance, InstanceKeeper};
pub use lifecycle::{
    Lifecycle, LifecycleCallbacks, LifecycleHooks, LifecycleRegistry, LifecycleState,
    LifecycleSubscription,
};
pub use state_keeper::{SavedState, StateKeeper};

/// Errors raised by the state and instance keepers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeeperError {
    /// The key already has a supplier or instance.
    AlreadyRegistered(String),
    /// The stored instance is not of the requested type.
    TypeMismatch(String),
    /// The keeper has been destroyed and accepts no new entries.
    Destroyed,
}

impl fmt::Display for KeeperError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeeperError::AlreadyRegistered(key) => write!(f, "key already registered: {key}"),
            KeeperError::TypeMismatch(key) => write!(f, "instance type mismatch for key: {key}"),
            KeeperError::Destroyed => write!(f, "keeper already destroyed"),
        }
    }
}

impl std::error::Error for KeeperError {}
