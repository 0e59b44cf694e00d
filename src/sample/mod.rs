//! # Sample
//!
//! A list/details article browser built on the generic children router. It
//! exists to exercise the navigation core the way an application would; the
//! host shell in `main.rs` drives it from the terminal.
//!
//! - [`database`]: in-memory articles
//! - [`multi_pane`]: the list/details component and its two panes

pub mod database;
pub mod multi_pane;

pub use database::{Article, ArticleDatabase, InMemoryArticleDatabase};
pub use multi_pane::{
    ArticleDetails, ArticleList, MultiPaneChildren, MultiPaneComponent, NavigationState, Pane,
    PaneConfig,
};
