//! Grove: Local-First Project Tree
//!
//! A folder/project hierarchy with drag-and-drop reordering, per-project
//! component data, local persistence and last-modified-wins remote sync.

pub mod config;
pub mod dnd;
pub mod error;
pub mod logging;
pub mod persistence;
pub mod store;
pub mod sync;
pub mod tooling;
pub mod tree;
pub mod types;
