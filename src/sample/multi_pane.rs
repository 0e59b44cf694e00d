//! List/details component on top of the generic children router.
//!
//! In single-pane mode the details pane covers the list: the list drops to
//! `Created` while an article is open and back closes the article. In
//! multi-pane mode both panes are resumed side by side, the list highlights
//! the open article and back is left to whoever sits above this component.

use std::cell::Cell;
use std::rc::Rc;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::database::{Article, ArticleDatabase};
use crate::context::ComponentContext;
use crate::essentials::{BackCallback, Instance, KeeperError, Lifecycle, LifecycleHooks};
use crate::router::children::find_created;
use crate::router::{
    Child, ChildFactoryError, ChildNavState, ChildrenOptions, CreatedChild, JsonCodec, NavState,
    NavigationError, PersistenceSink, SimpleNavigation, Status, Transformer, children,
};
use crate::value::{MutableValue, ObserveLifecycleMode, Value};

/// Router key of the pane router inside the component's state keeper.
pub const PANES_KEY: &str = "panes";

const LIST_STATE_KEY: &str = "list_state";
const LOADED_ARTICLE_KEY: &str = "article";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PaneConfig {
    List,
    Details { article_id: u64 },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NavigationState {
    pub is_multi_pane: bool,
    pub article_id: Option<u64>,
}

impl NavState<PaneConfig> for NavigationState {
    /// The list is always listed, at least `Created`.
    fn children(&self) -> Vec<ChildNavState<PaneConfig>> {
        let list_status = if self.is_multi_pane || self.article_id.is_none() {
            Status::Resumed
        } else {
            Status::Created
        };
        let mut entries = vec![ChildNavState::new(PaneConfig::List, list_status)];
        if let Some(article_id) = self.article_id {
            entries.push(ChildNavState::new(
                PaneConfig::Details { article_id },
                Status::Resumed,
            ));
        }
        entries
    }
}

pub enum Pane {
    List(ArticleList),
    Details(ArticleDetails),
}

impl Pane {
    pub fn as_list(&self) -> Option<&ArticleList> {
        match self {
            Pane::List(list) => Some(list),
            Pane::Details(_) => None,
        }
    }

    pub fn as_details(&self) -> Option<&ArticleDetails> {
        match self {
            Pane::Details(details) => Some(details),
            Pane::List(_) => None,
        }
    }
}

/// What the host renders.
pub struct MultiPaneChildren {
    pub is_multi_pane: bool,
    /// Always present while the router is alive: the list entry is never
    /// `Destroyed` in [`NavigationState::children`].
    pub list: Option<CreatedChild<PaneConfig, Pane>>,
    pub details: Option<CreatedChild<PaneConfig, Pane>>,
}

impl Clone for MultiPaneChildren {
    fn clone(&self) -> Self {
        Self {
            is_multi_pane: self.is_multi_pane,
            list: self.list.clone(),
            details: self.details.clone(),
        }
    }
}

impl MultiPaneChildren {
    fn from_router(state: &NavigationState, panes: &[Child<PaneConfig, Pane>]) -> Self {
        let list = find_created(panes, &PaneConfig::List);
        let details = state
            .article_id
            .and_then(|article_id| find_created(panes, &PaneConfig::Details { article_id }));
        Self {
            is_multi_pane: state.is_multi_pane,
            list,
            details,
        }
    }

    pub fn list(&self) -> Option<&ArticleList> {
        self.list.as_ref()?.instance.as_list()
    }

    pub fn details(&self) -> Option<&ArticleDetails> {
        self.details.as_ref()?.instance.as_details()
    }
}

type PaneNavigation = SimpleNavigation<Transformer<NavigationState>>;

fn navigate(
    navigation: &PaneNavigation,
    f: impl Fn(&NavigationState) -> NavigationState + 'static,
) -> Result<(), NavigationError> {
    let transformer: Transformer<NavigationState> = Rc::new(f);
    navigation.navigate(transformer)
}

fn close_details(navigation: &PaneNavigation) -> Result<(), NavigationError> {
    navigate(navigation, |state| NavigationState {
        article_id: None,
        ..state.clone()
    })
}

pub struct MultiPaneComponent {
    navigation: PaneNavigation,
    children: Value<MultiPaneChildren>,
    nav_state: Value<NavigationState>,
}

impl MultiPaneComponent {
    /// Builds the pane router under `ctx`. With a `sink`, every change is
    /// also written out as it happens.
    pub fn new(
        ctx: &ComponentContext,
        database: Rc<dyn ArticleDatabase>,
        initial_multi_pane: bool,
        sink: Option<Rc<dyn PersistenceSink>>,
    ) -> Result<Self, NavigationError> {
        let navigation = PaneNavigation::new();
        let initial = NavigationState {
            is_multi_pane: initial_multi_pane,
            article_id: None,
        };
        let nav_state = MutableValue::new(initial.clone());

        let factory_navigation = navigation.clone();
        let factory_state = nav_state.as_value();
        let state_sink = nav_state.clone();
        let mut options = ChildrenOptions::with_transformers(
            PANES_KEY,
            navigation.clone(),
            move || initial.clone(),
            MultiPaneChildren::from_router,
            move |config: PaneConfig, child_ctx: ComponentContext| {
                create_pane(
                    config,
                    child_ctx,
                    &database,
                    &factory_navigation,
                    &factory_state,
                )
            },
        )
        .with_codec(JsonCodec::new())
        .with_on_state_changed(move |state: &NavigationState, _| state_sink.set(state.clone()));
        if let Some(sink) = sink {
            options = options.with_sink(sink);
        }

        let children = children(ctx, options)?;

        let back_navigation = navigation.clone();
        let back_callback = BackCallback::new(false, move || {
            if let Err(e) = close_details(&back_navigation) {
                warn!("Closing details on back failed: {}", e);
            }
        });
        let registration = ctx.back_handler.register(&back_callback);
        let dispatcher = ctx.back_handler.clone();
        ctx.lifecycle.subscribe(
            LifecycleHooks::new().with_destroy(move || dispatcher.unregister(registration)),
        );
        nav_state.subscribe_scoped(
            &ctx.lifecycle,
            ObserveLifecycleMode::StartStop,
            move |state: &NavigationState| {
                back_callback.set_enabled(!state.is_multi_pane && state.article_id.is_some());
            },
        );

        Ok(Self {
            navigation,
            children,
            nav_state: nav_state.as_value(),
        })
    }

    pub fn children(&self) -> Value<MultiPaneChildren> {
        self.children.clone()
    }

    pub fn navigation_state(&self) -> NavigationState {
        self.nav_state.value()
    }

    pub fn set_multi_pane(&self, is_multi_pane: bool) -> Result<(), NavigationError> {
        debug!("Multi-pane mode: {}", is_multi_pane);
        navigate(&self.navigation, move |state| NavigationState {
            is_multi_pane,
            ..state.clone()
        })
    }

    pub fn show_details(&self, article_id: u64) -> Result<(), NavigationError> {
        navigate(&self.navigation, move |state| NavigationState {
            article_id: Some(article_id),
            ..state.clone()
        })
    }

    pub fn close_details(&self) -> Result<(), NavigationError> {
        close_details(&self.navigation)
    }
}

fn create_pane(
    config: PaneConfig,
    ctx: ComponentContext,
    database: &Rc<dyn ArticleDatabase>,
    navigation: &PaneNavigation,
    state: &Value<NavigationState>,
) -> Result<Pane, ChildFactoryError> {
    match config {
        PaneConfig::List => {
            let selection = navigation.clone();
            let list = ArticleList::new(
                &ctx,
                Rc::clone(database),
                state.clone(),
                move |article_id| {
                    navigate(&selection, move |state| NavigationState {
                        article_id: Some(article_id),
                        ..state.clone()
                    })
                },
            )?;
            Ok(Pane::List(list))
        }
        PaneConfig::Details { article_id } => {
            let finished = navigation.clone();
            let details = ArticleDetails::new(
                &ctx,
                database.as_ref(),
                article_id,
                state.clone(),
                move || close_details(&finished),
            )?;
            Ok(Pane::Details(details))
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
struct ListState {
    scroll_position: usize,
}

pub struct ArticleList {
    lifecycle: Lifecycle,
    database: Rc<dyn ArticleDatabase>,
    state: Value<NavigationState>,
    scroll_position: Rc<Cell<usize>>,
    on_selected: Box<dyn Fn(u64) -> Result<(), NavigationError>>,
}

impl ArticleList {
    pub fn new(
        ctx: &ComponentContext,
        database: Rc<dyn ArticleDatabase>,
        state: Value<NavigationState>,
        on_selected: impl Fn(u64) -> Result<(), NavigationError> + 'static,
    ) -> Result<Self, KeeperError> {
        let restored: ListState = ctx.state_keeper.consume(LIST_STATE_KEY).unwrap_or_default();
        let scroll_position = Rc::new(Cell::new(restored.scroll_position));
        let supplier = Rc::clone(&scroll_position);
        ctx.state_keeper.register(LIST_STATE_KEY, move || ListState {
            scroll_position: supplier.get(),
        })?;

        Ok(Self {
            lifecycle: ctx.lifecycle.clone(),
            database,
            state,
            scroll_position,
            on_selected: Box::new(on_selected),
        })
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn articles(&self) -> Vec<Article> {
        self.database.articles()
    }

    pub fn is_toolbar_visible(&self) -> bool {
        self.state.with(|state| !state.is_multi_pane)
    }

    /// Only highlighted while both panes are visible.
    pub fn selected_article_id(&self) -> Option<u64> {
        self.state
            .with(|state| state.article_id.filter(|_| state.is_multi_pane))
    }

    pub fn scroll_position(&self) -> usize {
        self.scroll_position.get()
    }

    pub fn set_scroll_position(&self, position: usize) {
        self.scroll_position.set(position);
    }

    pub fn select(&self, article_id: u64) -> Result<(), NavigationError> {
        (self.on_selected)(article_id)
    }
}

/// Loaded once per details pane and kept across recreation.
struct LoadedArticle {
    article: Article,
}

impl Instance for LoadedArticle {}

pub struct ArticleDetails {
    lifecycle: Lifecycle,
    loaded: Rc<LoadedArticle>,
    state: Value<NavigationState>,
    on_finished: Box<dyn Fn() -> Result<(), NavigationError>>,
}

impl ArticleDetails {
    pub fn new(
        ctx: &ComponentContext,
        database: &dyn ArticleDatabase,
        article_id: u64,
        state: Value<NavigationState>,
        on_finished: impl Fn() -> Result<(), NavigationError> + 'static,
    ) -> Result<Self, ChildFactoryError> {
        let loaded = match ctx.instance_keeper.get::<LoadedArticle>(LOADED_ARTICLE_KEY) {
            Some(loaded) => loaded,
            None => {
                let article = database
                    .article(article_id)
                    .ok_or_else(|| format!("no article with id {article_id}"))?;
                debug!("Loaded article {}", article_id);
                ctx.instance_keeper
                    .put(LOADED_ARTICLE_KEY, LoadedArticle { article })?
            }
        };

        Ok(Self {
            lifecycle: ctx.lifecycle.clone(),
            loaded,
            state,
            on_finished: Box::new(on_finished),
        })
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn article(&self) -> &Article {
        &self.loaded.article
    }

    pub fn is_toolbar_visible(&self) -> bool {
        self.state.with(|state| !state.is_multi_pane)
    }

    pub fn finish(&self) -> Result<(), NavigationError> {
        (self.on_finished)()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::DefaultRoot;
    use crate::essentials::LifecycleState;
    use crate::sample::database::InMemoryArticleDatabase;
    use crate::test_support::resumed_root;

    fn database() -> Rc<dyn ArticleDatabase> {
        Rc::new(InMemoryArticleDatabase::generated(5))
    }

    fn component(root: &DefaultRoot, multi_pane: bool) -> MultiPaneComponent {
        MultiPaneComponent::new(&root.context(), database(), multi_pane, None).unwrap()
    }

    fn list_state(children: &MultiPaneChildren) -> LifecycleState {
        children.list().unwrap().lifecycle().state()
    }

    #[test]
    fn test_single_pane_details_cover_the_list_and_back_closes_them() {
        let root = resumed_root();
        let component = component(&root, false);
        assert!(!root.back_dispatcher.back());

        component.show_details(3).unwrap();

        let shown = component.children().value();
        assert_eq!(list_state(&shown), LifecycleState::Created);
        let details = shown.details().unwrap();
        assert_eq!(details.article().id, 3);
        assert_eq!(details.lifecycle().state(), LifecycleState::Resumed);
        assert!(details.is_toolbar_visible());

        assert!(root.back_dispatcher.back());

        let closed = component.children().value();
        assert!(closed.details.is_none());
        assert_eq!(list_state(&closed), LifecycleState::Resumed);
        assert_eq!(component.navigation_state().article_id, None);
    }

    #[test]
    fn test_multi_pane_keeps_both_panes_resumed_and_leaves_back_alone() {
        let root = resumed_root();
        let component = component(&root, true);

        component.children().value().list().unwrap().select(2).unwrap();

        let shown = component.children().value();
        let list = shown.list().unwrap();
        assert_eq!(list.lifecycle().state(), LifecycleState::Resumed);
        assert_eq!(list.selected_article_id(), Some(2));
        assert!(!list.is_toolbar_visible());
        assert_eq!(
            shown.details().unwrap().lifecycle().state(),
            LifecycleState::Resumed
        );
        assert!(!root.back_dispatcher.back());
    }

    #[test]
    fn test_selection_is_not_highlighted_in_single_pane() {
        let root = resumed_root();
        let component = component(&root, false);

        component.show_details(4).unwrap();

        assert_eq!(
            component.children().value().list().unwrap().selected_article_id(),
            None
        );
    }

    #[test]
    fn test_switching_mode_keeps_the_open_article() {
        let root = resumed_root();
        let component = component(&root, true);
        component.show_details(1).unwrap();
        let before = component.children().value().details.unwrap().instance;

        component.set_multi_pane(false).unwrap();

        let after = component.children().value();
        assert_eq!(list_state(&after), LifecycleState::Created);
        assert!(Rc::ptr_eq(&before, &after.details.unwrap().instance));
        assert!(root.back_dispatcher.back());
    }

    #[test]
    fn test_finish_closes_details() {
        let root = resumed_root();
        let component = component(&root, false);
        component.show_details(5).unwrap();

        component.children().value().details().unwrap().finish().unwrap();

        assert!(component.children().value().details.is_none());
    }

    #[test]
    fn test_recreation_restores_article_and_scroll_position() {
        let root = resumed_root();
        let component = component(&root, false);
        component.children().value().list().unwrap().set_scroll_position(12);
        component.show_details(3).unwrap();

        let saved = root.save();
        root.lifecycle.destroy();
        let next = DefaultRoot::recreate(Some(saved), root.instance_keeper.clone());
        next.lifecycle.drive_to(LifecycleState::Resumed);
        let restored = component_on(&next);

        let children = restored.children().value();
        assert_eq!(children.list().unwrap().scroll_position(), 12);
        assert_eq!(children.details().unwrap().article().id, 3);
        assert_eq!(restored.navigation_state().article_id, Some(3));
        assert!(next.back_dispatcher.back());
    }

    fn component_on(root: &DefaultRoot) -> MultiPaneComponent {
        // An empty database: the details pane can only come from the
        // retained instance.
        let empty: Rc<dyn ArticleDatabase> = Rc::new(InMemoryArticleDatabase::new(Vec::new()));
        MultiPaneComponent::new(&root.context(), empty, false, None).unwrap()
    }

    #[test]
    fn test_unknown_article_fails_without_changing_state() {
        let root = resumed_root();
        let component = component(&root, false);

        let result = component.show_details(99);

        assert!(matches!(result, Err(NavigationError::Factory { .. })));
        assert_eq!(component.navigation_state().article_id, None);
        assert!(component.children().value().details.is_none());
    }
}
