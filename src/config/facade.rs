//! ConfigLoader facade delegating to the merge service.

use super::merge::service::MergeService;
use super::GroveConfig;
use crate::error::ApiError;
use config::ConfigError;
use std::path::Path;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace from files and environment.
    pub fn load(workspace_root: &Path) -> Result<GroveConfig, ConfigError> {
        MergeService::load(workspace_root)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> Result<GroveConfig, ConfigError> {
        MergeService::load_from_file(path)
    }

    /// Write the default configuration as a TOML template.
    ///
    /// Refuses to overwrite an existing file.
    pub fn write_default(path: &Path) -> Result<(), ApiError> {
        if path.exists() {
            return Err(ApiError::ConfigError(format!(
                "Config file already exists: {}",
                path.display()
            )));
        }
        let body = toml::to_string_pretty(&GroveConfig::default())
            .map_err(|e| ApiError::ConfigError(format!("Failed to render default config: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ApiError::ConfigError(format!("Failed to create config directory: {}", e)))?;
        }
        std::fs::write(path, format!("# grove configuration\n\n{}", body))
            .map_err(|e| ApiError::ConfigError(format!("Failed to write {}: {}", path.display(), e)))
    }
}
