//! Wayfinder library exports

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub mod context;
pub mod core;
pub mod essentials;
pub mod router;
pub mod sample;
pub mod value;

#[cfg(test)]
pub mod test_support;

pub use context::{ComponentContext, ComponentContextFactory, DefaultRoot};
pub use router::NavigationError;

/// What popping the last stack entry does.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PopPolicy {
    /// Leave the stack as it is.
    Ignore,
    /// Return `NavigationError::StackUnderflow`.
    Fail,
}
