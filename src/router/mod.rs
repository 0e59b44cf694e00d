//! # Routers
//!
//! Navigation is data: a caller-defined navigation state lists which child
//! configurations should exist and at what status. A router keeps a live set
//! of child components in line with that state.
//!
//! ```text
//!  navigate(event) ─▶ nav_transformer(state, event) ─▶ new state
//!                                                       │
//!                                         diff by configuration
//!                                                       │
//!              ┌────────────────┬───────────────────────┤
//!              ▼                ▼                       ▼
//!         instantiate        re-status               destroy
//!       (child factory)   (lifecycle moves)   (lifecycle + retained
//!                                               instances released)
//!                                                       │
//!                              state_mapper ─▶ Value<S> observers
//! ```
//!
//! ## Modules
//!
//! - [`children`]: the generic reconciliation engine
//! - [`stack`]: linear back stack on top of it
//! - [`panels`]: main/details/extra multi-pane layout on top of it
//! - [`navigation`]: `SimpleNavigation`, the event source routers listen to

pub mod children;
pub mod navigation;
pub mod panels;
pub mod stack;

use std::fmt;
use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::essentials::{KeeperError, SavedState};

pub use children::{
    Child, ChildNavState, ChildrenOptions, CreatedChild, NavState, Status, Transformer, children,
};
pub use navigation::{NavigationSubscription, SimpleNavigation};
pub use panels::{
    ChildPanels, PanelsEvent, PanelsMode, PanelsNavState, PanelsNavigation, PanelsNavigator,
    PanelsOptions, child_panels,
};
pub use stack::{
    ChildStack, StackEvent, StackNavState, StackNavigation, StackNavigator, StackOptions,
    child_stack,
};

/// Child configuration: stable identity plus parameters. Equality is the
/// reconciliation key; the serde encoding keys the child's persisted slices.
pub trait Configuration:
    Clone + PartialEq + fmt::Debug + Serialize + DeserializeOwned + 'static
{
}

impl<T> Configuration for T where
    T: Clone + PartialEq + fmt::Debug + Serialize + DeserializeOwned + 'static
{
}

/// Errors a child factory may return.
pub type ChildFactoryError = Box<dyn std::error::Error>;

#[derive(Debug)]
pub enum NavigationError {
    /// The produced state lists the same configuration twice.
    DuplicateConfiguration(String),
    /// A stack would become empty under `PopPolicy::Fail`.
    StackUnderflow,
    /// A stack was built with no initial configurations.
    EmptyStack,
    /// The router key is already taken in the parent state keeper.
    KeyAlreadyRegistered(String),
    /// The child factory failed for the given configuration.
    Factory {
        configuration: String,
        source: ChildFactoryError,
    },
    /// Encoding a configuration or navigation state failed.
    Codec(String),
    Keeper(KeeperError),
}

impl fmt::Display for NavigationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavigationError::DuplicateConfiguration(c) => {
                write!(f, "duplicate configuration in navigation state: {c}")
            }
            NavigationError::StackUnderflow => write!(f, "cannot pop the last stack entry"),
            NavigationError::EmptyStack => write!(f, "initial stack must not be empty"),
            NavigationError::KeyAlreadyRegistered(key) => {
                write!(f, "router key already registered: {key}")
            }
            NavigationError::Factory {
                configuration,
                source,
            } => write!(f, "child factory failed for {configuration}: {source}"),
            NavigationError::Codec(msg) => write!(f, "codec error: {msg}"),
            NavigationError::Keeper(e) => write!(f, "keeper error: {e}"),
        }
    }
}

impl std::error::Error for NavigationError {}

impl From<KeeperError> for NavigationError {
    fn from(e: KeeperError) -> Self {
        NavigationError::Keeper(e)
    }
}

/// Converts a navigation state to and from its persisted form.
pub trait StateCodec<N> {
    fn encode(&self, state: &N) -> Result<serde_json::Value, NavigationError>;
    fn decode(&self, value: serde_json::Value) -> Result<N, NavigationError>;
}

/// [`StateCodec`] backed by the state's own serde impls.
pub struct JsonCodec<N>(PhantomData<fn() -> N>);

impl<N> JsonCodec<N> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<N> Default for JsonCodec<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: Serialize + DeserializeOwned> StateCodec<N> for JsonCodec<N> {
    fn encode(&self, state: &N) -> Result<serde_json::Value, NavigationError> {
        serde_json::to_value(state).map_err(|e| NavigationError::Codec(e.to_string()))
    }

    fn decode(&self, value: serde_json::Value) -> Result<N, NavigationError> {
        serde_json::from_value(value).map_err(|e| NavigationError::Codec(e.to_string()))
    }
}

/// Receives a router's persisted form after every published change.
/// `state` holds a single entry under `key`, shaped exactly like what the
/// parent state keeper would save for that router.
pub trait PersistenceSink {
    fn persist(&self, key: &str, state: &SavedState);
}
