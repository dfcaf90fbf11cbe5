//! Configuration
//!
//! Layered settings: built-in defaults, the global file, the workspace file
//! and `GROVE__SECTION__KEY` environment variables, in increasing precedence.

pub mod facade;
pub mod merge;
pub mod paths;
pub mod sources;
pub mod workspace;

pub use facade::ConfigLoader;
pub use paths::xdg_root as xdg;
pub use workspace::storage_paths::StorageConfig;

use crate::dnd::DragConfig;
use crate::logging::LoggingConfig;
use crate::sync::SyncConfig;
use serde::{Deserialize, Serialize};

/// Workspace file name, looked up in the workspace root
pub const WORKSPACE_CONFIG_FILE: &str = "grove.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroveConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub drag: DragConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}
