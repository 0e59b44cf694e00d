//! # Child Panels
//!
//! A multi-pane layout over the generic children engine: a required `main`
//! panel plus optional `details` and `extra` panels. The mode decides how
//! many of the front-most populated panels are resumed; the rest stay
//! created so switching modes never recreates a panel.
//!
//! | mode   | resumed                   |
//! |--------|---------------------------|
//! | Single | front-most panel          |
//! | Dual   | two front-most panels     |
//! | Triple | every populated panel     |

use std::rc::Rc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::context::ComponentContext;
use crate::value::Value;

use super::children::{
    Child, ChildNavState, ChildrenOptions, CreatedChild, NavState, Status, children, find_created,
};
use super::navigation::SimpleNavigation;
use super::{ChildFactoryError, Configuration, JsonCodec, NavigationError, PersistenceSink};

pub const DEFAULT_PANELS_KEY: &str = "panels";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelsMode {
    #[default]
    Single,
    Dual,
    Triple,
}

impl PanelsMode {
    fn resumed_count(self) -> usize {
        match self {
            PanelsMode::Single => 1,
            PanelsMode::Dual => 2,
            PanelsMode::Triple => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelsNavState<C> {
    pub main: C,
    pub details: Option<C>,
    pub extra: Option<C>,
    pub mode: PanelsMode,
}

impl<C> PanelsNavState<C> {
    pub fn new(main: C) -> Self {
        Self {
            main,
            details: None,
            extra: None,
            mode: PanelsMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: PanelsMode) -> Self {
        self.mode = mode;
        self
    }

    fn populated(&self) -> Vec<&C> {
        std::iter::once(&self.main)
            .chain(self.details.as_ref())
            .chain(self.extra.as_ref())
            .collect()
    }
}

impl<C: Clone> NavState<C> for PanelsNavState<C> {
    fn children(&self) -> Vec<ChildNavState<C>> {
        let populated = self.populated();
        let first_resumed = populated.len().saturating_sub(self.mode.resumed_count());
        populated
            .into_iter()
            .enumerate()
            .map(|(index, configuration)| {
                let status = if index >= first_resumed {
                    Status::Resumed
                } else {
                    Status::Created
                };
                ChildNavState::new(configuration.clone(), status)
            })
            .collect()
    }
}

/// Snapshot of a panels router. Panels are looked up by slot.
pub struct ChildPanels<C, T> {
    pub main: CreatedChild<C, T>,
    pub details: Option<CreatedChild<C, T>>,
    pub extra: Option<CreatedChild<C, T>>,
    pub mode: PanelsMode,
}

impl<C: Clone, T> Clone for ChildPanels<C, T> {
    fn clone(&self) -> Self {
        Self {
            main: self.main.clone(),
            details: self.details.clone(),
            extra: self.extra.clone(),
            mode: self.mode,
        }
    }
}

pub struct PanelsEvent<C> {
    transformer: Rc<dyn Fn(&PanelsNavState<C>) -> PanelsNavState<C>>,
}

impl<C> Clone for PanelsEvent<C> {
    fn clone(&self) -> Self {
        Self {
            transformer: Rc::clone(&self.transformer),
        }
    }
}

impl<C> PanelsEvent<C> {
    pub fn new(transformer: impl Fn(&PanelsNavState<C>) -> PanelsNavState<C> + 'static) -> Self {
        Self {
            transformer: Rc::new(transformer),
        }
    }

    pub fn apply(&self, state: &PanelsNavState<C>) -> PanelsNavState<C> {
        (self.transformer)(state)
    }
}

fn popped<C: Clone>(state: &PanelsNavState<C>) -> Option<PanelsNavState<C>> {
    if state.extra.is_some() {
        Some(PanelsNavState {
            extra: None,
            ..state.clone()
        })
    } else if state.details.is_some() {
        Some(PanelsNavState {
            details: None,
            ..state.clone()
        })
    } else {
        None
    }
}

pub trait PanelsNavigator<C: Configuration> {
    fn navigate(
        &self,
        transformer: impl Fn(&PanelsNavState<C>) -> PanelsNavState<C> + 'static,
    ) -> Result<(), NavigationError>;

    /// Replaces the main panel and closes the others.
    fn activate_main(&self, configuration: C) -> Result<(), NavigationError> {
        self.navigate(move |state| PanelsNavState {
            main: configuration.clone(),
            details: None,
            extra: None,
            mode: state.mode,
        })
    }

    /// Shows `configuration` as details and closes the extra panel.
    fn activate_details(&self, configuration: C) -> Result<(), NavigationError> {
        self.navigate(move |state| PanelsNavState {
            details: Some(configuration.clone()),
            extra: None,
            ..state.clone()
        })
    }

    /// Shows `configuration` as the extra panel. Ignored while no details
    /// panel is open.
    fn activate_extra(&self, configuration: C) -> Result<(), NavigationError> {
        self.navigate(move |state| {
            if state.details.is_none() {
                debug!("Extra panel requested without details, ignoring");
                return state.clone();
            }
            PanelsNavState {
                extra: Some(configuration.clone()),
                ..state.clone()
            }
        })
    }

    fn dismiss_details(&self) -> Result<(), NavigationError> {
        self.navigate(|state| PanelsNavState {
            details: None,
            extra: None,
            ..state.clone()
        })
    }

    fn dismiss_extra(&self) -> Result<(), NavigationError> {
        self.navigate(|state| PanelsNavState {
            extra: None,
            ..state.clone()
        })
    }

    /// Closes the extra panel if open, else the details panel. Main stays.
    fn pop(&self) -> Result<(), NavigationError> {
        self.navigate(|state| popped(state).unwrap_or_else(|| state.clone()))
    }

    fn set_mode(&self, mode: PanelsMode) -> Result<(), NavigationError> {
        self.navigate(move |state| PanelsNavState {
            mode,
            ..state.clone()
        })
    }
}

pub struct PanelsNavigation<C> {
    source: SimpleNavigation<PanelsEvent<C>>,
}

impl<C> Clone for PanelsNavigation<C> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
        }
    }
}

impl<C: Configuration> Default for PanelsNavigation<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Configuration> PanelsNavigation<C> {
    pub fn new() -> Self {
        Self {
            source: SimpleNavigation::new(),
        }
    }

    pub fn source(&self) -> &SimpleNavigation<PanelsEvent<C>> {
        &self.source
    }
}

impl<C: Configuration> PanelsNavigator<C> for PanelsNavigation<C> {
    fn navigate(
        &self,
        transformer: impl Fn(&PanelsNavState<C>) -> PanelsNavState<C> + 'static,
    ) -> Result<(), NavigationError> {
        self.source.navigate(PanelsEvent::new(transformer))
    }
}

type ChildFactory<C, T> = Box<dyn Fn(C, ComponentContext) -> Result<T, ChildFactoryError>>;

pub struct PanelsOptions<C, T> {
    key: String,
    source: PanelsNavigation<C>,
    initial_panels: Box<dyn Fn() -> PanelsNavState<C>>,
    handle_back_button: bool,
    persistent: bool,
    child_factory: ChildFactory<C, T>,
    sink: Option<Rc<dyn PersistenceSink>>,
}

impl<C: Configuration, T> PanelsOptions<C, T> {
    pub fn new(
        source: &PanelsNavigation<C>,
        initial_panels: impl Fn() -> PanelsNavState<C> + 'static,
        child_factory: impl Fn(C, ComponentContext) -> Result<T, ChildFactoryError> + 'static,
    ) -> Self {
        Self {
            key: DEFAULT_PANELS_KEY.to_string(),
            source: source.clone(),
            initial_panels: Box::new(initial_panels),
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

fn to_child_panels<C: Configuration, T>(
    state: &PanelsNavState<C>,
    children: &[Child<C, T>],
) -> ChildPanels<C, T> {
    let slot = |configuration: &Option<C>| {
        configuration
            .as_ref()
            .and_then(|c| find_created(children, c))
    };
    match find_created(children, &state.main) {
        Some(main) => ChildPanels {
            main,
            details: slot(&state.details),
            extra: slot(&state.extra),
            mode: state.mode,
        },
        None => unreachable!("the main panel is always live"),
    }
}

/// Builds a panels router under `ctx`.
pub fn child_panels<C, T>(
    ctx: &ComponentContext,
    options: PanelsOptions<C, T>,
) -> Result<Value<ChildPanels<C, T>>, NavigationError>
where
    C: Configuration,
    T: 'static,
{
    let mut router = ChildrenOptions::new(
        options.key,
        options.source.source,
        options.initial_panels,
        |state: &PanelsNavState<C>, event: PanelsEvent<C>| Ok(event.apply(state)),
        to_child_panels,
        options.child_factory,
    );

    if options.persistent {
        router = router.with_codec(JsonCodec::<PanelsNavState<C>>::new());
    }
    if options.handle_back_button {
        router = router.with_back_transformer(popped);
    }
    if let Some(sink) = options.sink {
        router = router.with_sink(sink);
    }

    children(ctx, router)
}
