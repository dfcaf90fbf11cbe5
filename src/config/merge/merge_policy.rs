//! Base layer every merge starts from.

use crate::config::GroveConfig;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat};

/// Builder seeded with the built-in defaults, so later layers can set
/// individual keys without restating whole sections.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let defaults = toml::to_string(&GroveConfig::default())
        .map_err(|e| ConfigError::Message(format!("failed to render defaults: {}", e)))?;
    Ok(Config::builder().add_source(File::from_str(&defaults, FileFormat::Toml)))
}
