// Configuration management module
// Handles TOML configuration loading, validation, and default locations

pub mod settings;

pub use settings::{Config, ConfigError, OllamaConfig};

/// Get the default configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::default_config_dir()
}
