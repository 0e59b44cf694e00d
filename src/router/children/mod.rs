//! Generic children: the reconciliation engine every router is built on.
//!
//! A router owns a navigation state `N` and the live children it implies.
//! Events from a [`SimpleNavigation`] go through `nav_transformer` to produce
//! the next state; the engine then diffs old and new children by
//! configuration and moves each live child to its requested status.
//!
//! Per pass, in order:
//! 1. reject duplicate configurations before touching anything
//! 2. destroy children no longer listed, front-most first, releasing their
//!    retained instances
//! 3. destroy children now listed as `Destroyed`, keeping their saved state
//! 4. instantiate new children through the factory
//! 5. demote lifecycles front to back, then promote back to front
//! 6. publish one snapshot through the returned [`Value`]
//!
//! A navigation requested while a pass is running (from a lifecycle callback
//! or a factory) is queued and applied after the current pass completes.

mod child;
mod engine;
mod nav_state;

use std::rc::Rc;

use crate::context::ComponentContext;
use crate::value::Value;

use super::navigation::SimpleNavigation;
use super::{ChildFactoryError, Configuration, NavigationError, PersistenceSink, StateCodec};

pub use child::{Child, CreatedChild, find_created};
pub use nav_state::{ChildNavState, NavState, Status};
pub(crate) use nav_state::first_duplicate;

/// A navigation event that is just a function of the current state.
pub type Transformer<N> = Rc<dyn Fn(&N) -> N>;

type NavTransformer<N, E> = Box<dyn Fn(&N, E) -> Result<N, NavigationError>>;
type StateMapper<N, C, T, S> = Box<dyn Fn(&N, &[Child<C, T>]) -> S>;
type ChildFactory<C, T> = Box<dyn Fn(C, ComponentContext) -> Result<T, ChildFactoryError>>;
type BackTransformer<N> = Box<dyn Fn(&N) -> Option<N>>;
type StateListener<N> = Box<dyn Fn(&N, Option<&N>)>;

/// Everything a router needs. Built with [`ChildrenOptions::new`] plus the
/// optional `with_*` setters.
pub struct ChildrenOptions<C, N, T, E, S> {
    pub(crate) key: String,
    pub(crate) source: SimpleNavigation<E>,
    pub(crate) initial_state: Box<dyn Fn() -> N>,
    pub(crate) nav_transformer: NavTransformer<N, E>,
    pub(crate) state_mapper: StateMapper<N, C, T, S>,
    pub(crate) child_factory: ChildFactory<C, T>,
    pub(crate) codec: Option<Rc<dyn StateCodec<N>>>,
    pub(crate) back_transformer: Option<BackTransformer<N>>,
    pub(crate) on_state_changed: Option<StateListener<N>>,
    pub(crate) sink: Option<Rc<dyn PersistenceSink>>,
}

impl<C, N, T, E, S> ChildrenOptions<C, N, T, E, S>
where
    C: Configuration,
    N: 'static,
    E: Clone + 'static,
{
    pub fn new(
        key: impl Into<String>,
        source: SimpleNavigation<E>,
        initial_state: impl Fn() -> N + 'static,
        nav_transformer: impl Fn(&N, E) -> Result<N, NavigationError> + 'static,
        state_mapper: impl Fn(&N, &[Child<C, T>]) -> S + 'static,
        child_factory: impl Fn(C, ComponentContext) -> Result<T, ChildFactoryError> + 'static,
    ) -> Self {
        Self {
            key: key.into(),
            source,
            initial_state: Box::new(initial_state),
            nav_transformer: Box::new(nav_transformer),
            state_mapper: Box::new(state_mapper),
            child_factory: Box::new(child_factory),
            codec: None,
            back_transformer: None,
            on_state_changed: None,
            sink: None,
        }
    }

    /// Persists the navigation state (and every child's saved state) through
    /// the parent state keeper. Without a codec the router starts fresh after
    /// recreation.
    pub fn with_codec(mut self, codec: impl StateCodec<N> + 'static) -> Self {
        self.codec = Some(Rc::new(codec));
        self
    }

    /// Registers a back callback that is enabled whenever this returns
    /// `Some`; handling back navigates to the returned state.
    pub fn with_back_transformer(mut self, f: impl Fn(&N) -> Option<N> + 'static) -> Self {
        self.back_transformer = Some(Box::new(f));
        self
    }

    /// Called after every published change with the new and previous state.
    pub fn with_on_state_changed(mut self, f: impl Fn(&N, Option<&N>) + 'static) -> Self {
        self.on_state_changed = Some(Box::new(f));
        self
    }

    pub fn with_sink(mut self, sink: Rc<dyn PersistenceSink>) -> Self {
        self.sink = Some(sink);
        self
    }
}

impl<C, N, T, S> ChildrenOptions<C, N, T, Transformer<N>, S>
where
    C: Configuration,
    N: 'static,
{
    /// Options for a router whose events are plain [`Transformer`]s.
    pub fn with_transformers(
        key: impl Into<String>,
        source: SimpleNavigation<Transformer<N>>,
        initial_state: impl Fn() -> N + 'static,
        state_mapper: impl Fn(&N, &[Child<C, T>]) -> S + 'static,
        child_factory: impl Fn(C, ComponentContext) -> Result<T, ChildFactoryError> + 'static,
    ) -> Self {
        Self::new(
            key,
            source,
            initial_state,
            |state: &N, transformer: Transformer<N>| Ok(transformer(state)),
            state_mapper,
            child_factory,
        )
    }
}

/// Builds a router under `ctx` and runs the first pass synchronously, so the
/// returned value already holds the initial snapshot.
///
/// Fails with [`NavigationError::KeyAlreadyRegistered`] if another router or
/// state supplier already uses `options.key` in the parent, and with the
/// factory's error if any initial child cannot be built.
pub fn children<C, N, T, E, S>(
    ctx: &ComponentContext,
    options: ChildrenOptions<C, N, T, E, S>,
) -> Result<Value<S>, NavigationError>
where
    C: Configuration,
    N: NavState<C> + Clone + PartialEq + 'static,
    T: 'static,
    E: Clone + 'static,
    S: Clone + 'static,
{
    engine::Router::start(ctx, options)
}
