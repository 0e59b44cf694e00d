//! # Child Stack
//!
//! A linear back stack over the generic children engine. The last entry is
//! the active child (resumed), the one right below it is kept warm
//! (started), everything deeper is only created.
//!
//! ```text
//! [ List, Search, Details ]
//!   CREATED  STARTED  RESUMED
//! ```

use std::rc::Rc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::PopPolicy;
use crate::context::ComponentContext;
use crate::value::Value;

use super::children::{
    Child, ChildNavState, ChildrenOptions, CreatedChild, NavState, Status, children,
};
use super::navigation::SimpleNavigation;
use super::{ChildFactoryError, Configuration, JsonCodec, NavigationError, PersistenceSink};

pub const DEFAULT_STACK_KEY: &str = "stack";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackNavState<C> {
    pub configurations: Vec<C>,
}

impl<C: Clone> NavState<C> for StackNavState<C> {
    fn children(&self) -> Vec<ChildNavState<C>> {
        let top = self.configurations.len().saturating_sub(1);
        self.configurations
            .iter()
            .enumerate()
            .map(|(index, configuration)| {
                let status = if index == top {
                    Status::Resumed
                } else if index + 1 == top {
                    Status::Started
                } else {
                    Status::Created
                };
                ChildNavState::new(configuration.clone(), status)
            })
            .collect()
    }

    fn is_valid(&self) -> bool {
        !self.configurations.is_empty()
    }
}

/// Snapshot of a stack router. Never empty.
pub struct ChildStack<C, T> {
    pub active: CreatedChild<C, T>,
    /// Entries below the active one, bottom first.
    pub back_stack: Vec<CreatedChild<C, T>>,
}

impl<C: Clone, T> Clone for ChildStack<C, T> {
    fn clone(&self) -> Self {
        Self {
            active: self.active.clone(),
            back_stack: self.back_stack.clone(),
        }
    }
}

impl<C: Clone, T> ChildStack<C, T> {
    /// Every entry, bottom first, active last.
    pub fn items(&self) -> Vec<CreatedChild<C, T>> {
        let mut items = self.back_stack.clone();
        items.push(self.active.clone());
        items
    }

    pub fn len(&self) -> usize {
        self.back_stack.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

/// A stack navigation event: a function from the current configurations to
/// the next ones.
pub struct StackEvent<C> {
    transformer: Rc<dyn Fn(&[C]) -> Vec<C>>,
}

impl<C> Clone for StackEvent<C> {
    fn clone(&self) -> Self {
        Self {
            transformer: Rc::clone(&self.transformer),
        }
    }
}

impl<C> StackEvent<C> {
    pub fn new(transformer: impl Fn(&[C]) -> Vec<C> + 'static) -> Self {
        Self {
            transformer: Rc::new(transformer),
        }
    }

    pub fn apply(&self, stack: &[C]) -> Vec<C> {
        (self.transformer)(stack)
    }
}

/// Stack operations, all expressed through [`StackNavigator::navigate`].
pub trait StackNavigator<C: Configuration> {
    fn navigate(&self, transformer: impl Fn(&[C]) -> Vec<C> + 'static) -> Result<(), NavigationError>;

    fn push(&self, configuration: C) -> Result<(), NavigationError> {
        self.navigate(move |stack| {
            let mut next = stack.to_vec();
            next.push(configuration.clone());
            next
        })
    }

    /// Removes the active entry. Popping the last one is governed by the
    /// router's [`PopPolicy`].
    fn pop(&self) -> Result<(), NavigationError> {
        self.navigate(|stack| stack[..stack.len().saturating_sub(1)].to_vec())
    }

    /// Pops while `predicate` holds for the active entry.
    fn pop_while(&self, predicate: impl Fn(&C) -> bool + 'static) -> Result<(), NavigationError> {
        self.navigate(move |stack| {
            let mut next = stack.to_vec();
            while next.last().is_some_and(&predicate) {
                next.pop();
            }
            next
        })
    }

    fn replace_current(&self, configuration: C) -> Result<(), NavigationError> {
        self.navigate(move |stack| {
            let mut next = stack.to_vec();
            next.pop();
            next.push(configuration.clone());
            next
        })
    }

    fn replace_all(&self, configurations: Vec<C>) -> Result<(), NavigationError> {
        self.navigate(move |_| configurations.clone())
    }

    /// Moves an existing entry to the top, or pushes it if absent.
    fn bring_to_front(&self, configuration: C) -> Result<(), NavigationError> {
        self.navigate(move |stack| {
            let mut next: Vec<C> = stack
                .iter()
                .filter(|c| **c != configuration)
                .cloned()
                .collect();
            next.push(configuration.clone());
            next
        })
    }
}

/// The navigation source a stack router listens to. Clones share subscribers.
pub struct StackNavigation<C> {
    source: SimpleNavigation<StackEvent<C>>,
}

impl<C> Clone for StackNavigation<C> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
        }
    }
}

impl<C: Configuration> Default for StackNavigation<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Configuration> StackNavigation<C> {
    pub fn new() -> Self {
        Self {
            source: SimpleNavigation::new(),
        }
    }

    pub fn source(&self) -> &SimpleNavigation<StackEvent<C>> {
        &self.source
    }
}

impl<C: Configuration> StackNavigator<C> for StackNavigation<C> {
    fn navigate(&self, transformer: impl Fn(&[C]) -> Vec<C> + 'static) -> Result<(), NavigationError> {
        self.source.navigate(StackEvent::new(transformer))
    }
}

type ChildFactory<C, T> = Box<dyn Fn(C, ComponentContext) -> Result<T, ChildFactoryError>>;

pub struct StackOptions<C, T> {
    key: String,
    source: StackNavigation<C>,
    initial_stack: Box<dyn Fn() -> Vec<C>>,
    pop_policy: PopPolicy,
    handle_back_button: bool,
    persistent: bool,
    child_factory: ChildFactory<C, T>,
    sink: Option<Rc<dyn PersistenceSink>>,
}

impl<C: Configuration, T> StackOptions<C, T> {
    /// The pop policy has no default: callers decide what popping the last
    /// entry means for them.
    pub fn new(
        source: &StackNavigation<C>,
        initial_stack: impl Fn() -> Vec<C> + 'static,
        pop_policy: PopPolicy,
        child_factory: impl Fn(C, ComponentContext) -> Result<T, ChildFactoryError> + 'static,
    ) -> Self {
        Self {
            key: DEFAULT_STACK_KEY.to_string(),
            source: source.clone(),
            initial_stack: Box::new(initial_stack),
            pop_policy,
            handle_back_button: true,
            persistent: true,
            child_factory: Box::new(child_factory),
            sink: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_back_button(mut self, handle: bool) -> Self {
        self.handle_back_button = handle;
        self
    }

    pub fn with_persistence(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    pub fn with_sink(mut self, sink: Rc<dyn PersistenceSink>) -> Self {
        self.sink = Some(sink);
        self
    }
}

fn to_child_stack<C: Clone, T>(children: &[Child<C, T>]) -> ChildStack<C, T> {
    let mut items: Vec<CreatedChild<C, T>> =
        children.iter().filter_map(Child::as_created).cloned().collect();
    match items.pop() {
        Some(active) => ChildStack {
            active,
            back_stack: items,
        },
        None => unreachable!("stack navigation state is never empty"),
    }
}

/// Builds a stack router under `ctx`.
pub fn child_stack<C, T>(
    ctx: &ComponentContext,
    options: StackOptions<C, T>,
) -> Result<Value<ChildStack<C, T>>, NavigationError>
where
    C: Configuration,
    T: 'static,
{
    let initial = (options.initial_stack)();
    if initial.is_empty() {
        return Err(NavigationError::EmptyStack);
    }

    let policy = options.pop_policy;
    let key = options.key.clone();
    let mut router = ChildrenOptions::new(
        options.key,
        options.source.source,
        move || StackNavState {
            configurations: initial.clone(),
        },
        move |state: &StackNavState<C>, event: StackEvent<C>| {
            let next = event.apply(&state.configurations);
            if !next.is_empty() {
                return Ok(StackNavState {
                    configurations: next,
                });
            }
            match policy {
                PopPolicy::Ignore => {
                    debug!("Stack '{}': ignoring navigation that would empty it", key);
                    Ok(state.clone())
                }
                PopPolicy::Fail => Err(NavigationError::StackUnderflow),
            }
        },
        |_: &StackNavState<C>, children: &[Child<C, T>]| to_child_stack(children),
        options.child_factory,
    );

    if options.persistent {
        router = router.with_codec(JsonCodec::<StackNavState<C>>::new());
    }
    if options.handle_back_button {
        router = router.with_back_transformer(|state: &StackNavState<C>| {
            let len = state.configurations.len();
            (len > 1).then(|| StackNavState {
                configurations: state.configurations[..len - 1].to_vec(),
            })
        });
    }
    if let Some(sink) = options.sink {
        router = router.with_sink(sink);
    }

    children(ctx, router)
}
