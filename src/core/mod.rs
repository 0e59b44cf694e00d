//! # Host Plumbing
//!
//! Everything a host shell needs around the navigation core that is not
//! navigation itself.
//!
//! ```text
//!   config.toml ─┐
//!   env vars ────┼─▶ config::resolve ─▶ ResolvedConfig
//!   CLI flags ───┘                          │
//!                                           ▼
//!   DefaultRoot::save ─▶ persistence::save_snapshot ─▶ <state_dir>/<name>.json
//!   DefaultRoot::new  ◀─ persistence::take_snapshot ◀──┘
//! ```
//!
//! ## Modules
//!
//! - [`config`]: `~/.wayfinder/config.toml` and the override hierarchy
//! - [`persistence`]: snapshot files and the `FileSink` persistence sink

pub mod config;
pub mod persistence;
