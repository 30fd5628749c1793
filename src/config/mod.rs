//! Configuration loading.
//!
//! Sources, lowest precedence first:
//! - an optional TOML file (`config/default.toml` unless a path is given)
//! - environment variables prefixed `RELAY_`, with `__` between nested keys
//!   (`RELAY_SERVER__PORT=9000`)

mod settings;

use config::{Config, ConfigError, Environment, File};

use crate::config::settings::PartialSettings;

pub use settings::{
    AuthSettings, BridgeSettings, LoggingSettings, PresenceSettings, ServerSettings, Settings,
    TokenEntry,
};

pub const DEFAULT_CONFIG_PATH: &str = "config/default";

/// Load settings from the default file location and the environment.
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from(DEFAULT_CONFIG_PATH)
}

/// Load settings from `path` (extension optional) and the environment.
/// A missing file is not an error.
pub fn load_config_from(path: &str) -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(
            Environment::with_prefix("RELAY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;
    let partial: PartialSettings = config.try_deserialize()?;
    Ok(Settings::merge(partial))
}
