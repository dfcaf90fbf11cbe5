//! XDG Base Directory utilities for workspace data.

use crate::error::ApiError;
use std::path::{Component, Path, PathBuf};

/// `$XDG_DATA_HOME`, else `$HOME/.local/share`
pub fn data_home() -> Option<PathBuf> {
    if let Ok(xdg_data_home) = std::env::var("XDG_DATA_HOME") {
        return Some(PathBuf::from(xdg_data_home));
    }

    std::env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".local").join("share"))
}

/// `$XDG_CONFIG_HOME`, else `$HOME/.config`
pub fn config_home() -> Result<PathBuf, ApiError> {
    if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
        return Ok(PathBuf::from(xdg_config_home));
    }

    let home = std::env::var("HOME").map_err(|_| {
        ApiError::ConfigError("Could not determine XDG config home directory (HOME not set)".to_string())
    })?;
    Ok(PathBuf::from(home).join(".config"))
}

/// `$XDG_CONFIG_HOME/grove/config.toml`
pub fn global_config_path() -> Result<PathBuf, ApiError> {
    Ok(config_home()?.join("grove").join("config.toml"))
}

/// Mirror the canonical workspace path under `base`
///
/// `/home/user/notes` becomes `<base>/home/user/notes`.
pub fn scoped_dir(base: PathBuf, workspace_root: &Path) -> Result<PathBuf, ApiError> {
    let canonical = workspace_root.canonicalize().map_err(|e| {
        ApiError::ConfigError(format!("Failed to canonicalize workspace path: {}", e))
    })?;

    Ok(canonical
        .components()
        .fold(base, |dir, component| match component {
            Component::Normal(name) => dir.join(name),
            Component::RootDir | Component::Prefix(_) | Component::CurDir | Component::ParentDir => dir,
        }))
}

/// `$XDG_DATA_HOME/grove/<workspace_path>/`
pub fn workspace_data_dir(workspace_root: &Path) -> Result<PathBuf, ApiError> {
    let data_home = data_home().ok_or_else(|| {
        ApiError::ConfigError("Could not determine XDG data home directory (HOME not set)".to_string())
    })?;
    scoped_dir(data_home.join("grove"), workspace_root)
}
