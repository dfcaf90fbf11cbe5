//! Tooling Layer
//!
//! Command-line front end over the tree store and sync engine.

pub mod cli;
pub mod format;

pub use cli::{Cli, CliContext, Commands};
