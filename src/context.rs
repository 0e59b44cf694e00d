//! # Component Context
//!
//! The single handle every component receives: four independent capability
//! handles aggregated in one struct, cloned cheaply and passed down.
//!
//! ```text
//! ComponentContext
//! ├── lifecycle: Lifecycle            // read-only, driven by the owner
//! ├── state_keeper: StateKeeper       // saved across process death
//! ├── instance_keeper: InstanceKeeper // retained across recreation
//! └── back_handler: BackDispatcher    // chained into the parent's
//! ```
//!
//! Routers build child contexts themselves (see `router::children`).
//! [`ComponentContext::child_context`] covers permanent children that live as
//! long as their parent.

use log::debug;

use crate::essentials::{
    BackDispatcher, InstanceKeeper, KeeperError, Lifecycle, LifecycleRegistry, SavedState,
    StateKeeper,
};

#[derive(Clone)]
pub struct ComponentContext {
    pub lifecycle: Lifecycle,
    pub state_keeper: StateKeeper,
    pub instance_keeper: InstanceKeeper,
    pub back_handler: BackDispatcher,
}

impl ComponentContext {
    pub fn new(
        lifecycle: Lifecycle,
        state_keeper: StateKeeper,
        instance_keeper: InstanceKeeper,
        back_handler: BackDispatcher,
    ) -> Self {
        Self {
            lifecycle,
            state_keeper,
            instance_keeper,
            back_handler,
        }
    }

    /// Creates a permanent child under `key`. Its lifecycle mirrors this
    /// one, its saved state lives under `key` in this state keeper and its
    /// retained instances under `key` in this instance keeper.
    pub fn child_context(&self, key: &str) -> Result<ComponentContext, KeeperError> {
        let state_keeper = StateKeeper::new(self.state_keeper.consume::<SavedState>(key));
        let saver = state_keeper.clone();
        self.state_keeper.register(key, move || saver.save())?;

        let instance_keeper = match self.instance_keeper.get_or_create(key, InstanceKeeper::new) {
            Ok(keeper) => (*keeper).clone(),
            Err(e) => {
                self.state_keeper.unregister(key);
                return Err(e);
            }
        };

        let lifecycle = LifecycleRegistry::attached_to(&self.lifecycle);
        let back_handler = BackDispatcher::child(&self.back_handler, &lifecycle.lifecycle());
        debug!("Created child context '{}'", key);

        Ok(ComponentContext::new(
            lifecycle.lifecycle(),
            state_keeper,
            instance_keeper,
            back_handler,
        ))
    }

    /// Rebuilds this context as a caller-defined context type.
    pub fn convert<Ctx>(&self, factory: &impl ComponentContextFactory<Ctx>) -> Ctx {
        factory.create(
            self.lifecycle.clone(),
            self.state_keeper.clone(),
            self.instance_keeper.clone(),
            self.back_handler.clone(),
        )
    }
}

/// Builds a context of type `Ctx` from the four capabilities, for
/// applications that wrap [`ComponentContext`] in their own type.
pub trait ComponentContextFactory<Ctx> {
    fn create(
        &self,
        lifecycle: Lifecycle,
        state_keeper: StateKeeper,
        instance_keeper: InstanceKeeper,
        back_handler: BackDispatcher,
    ) -> Ctx;
}

impl<Ctx, F> ComponentContextFactory<Ctx> for F
where
    F: Fn(Lifecycle, StateKeeper, InstanceKeeper, BackDispatcher) -> Ctx,
{
    fn create(
        &self,
        lifecycle: Lifecycle,
        state_keeper: StateKeeper,
        instance_keeper: InstanceKeeper,
        back_handler: BackDispatcher,
    ) -> Ctx {
        self(lifecycle, state_keeper, instance_keeper, back_handler)
    }
}

/// The owners behind a root [`ComponentContext`], held by the host shell.
///
/// To survive recreation the host calls [`DefaultRoot::save`] before
/// destroying the lifecycle, keeps `instance_keeper`, and builds the next
/// root with [`DefaultRoot::recreate`]. On final exit it destroys both.
pub struct DefaultRoot {
    pub lifecycle: LifecycleRegistry,
    pub state_keeper: StateKeeper,
    pub instance_keeper: InstanceKeeper,
    pub back_dispatcher: BackDispatcher,
}

impl DefaultRoot {
    pub fn new(saved: Option<SavedState>) -> Self {
        Self::recreate(saved, InstanceKeeper::new())
    }

    pub fn recreate(saved: Option<SavedState>, instance_keeper: InstanceKeeper) -> Self {
        Self {
            lifecycle: LifecycleRegistry::new(),
            state_keeper: StateKeeper::new(saved),
            instance_keeper,
            back_dispatcher: BackDispatcher::new(),
        }
    }

    pub fn context(&self) -> ComponentContext {
        ComponentContext::new(
            self.lifecycle.lifecycle(),
            self.state_keeper.clone(),
            self.instance_keeper.clone(),
            self.back_dispatcher.clone(),
        )
    }

    pub fn save(&self) -> SavedState {
        self.state_keeper.save()
    }

    /// Final teardown: destroys the lifecycle, then every retained instance.
    pub fn finish(&self) {
        self.lifecycle.destroy();
        self.instance_keeper.destroy();
    }
}
