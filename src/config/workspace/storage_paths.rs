//! StorageConfig and path resolution for the workspace database.

use crate::config::xdg;
use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DB_DIR_NAME: &str = "tree.db";

/// Storage configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// sled database directory, relative to the workspace root;
    /// unset means the workspace's XDG data dir
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

impl StorageConfig {
    /// Resolve the database directory for a workspace.
    pub fn resolve_db_path(&self, workspace_root: &Path) -> Result<PathBuf, ApiError> {
        match &self.db_path {
            Some(path) => Ok(workspace_root.join(path)),
            None => Ok(xdg::workspace_data_dir(workspace_root)?.join(DB_DIR_NAME)),
        }
    }
}
