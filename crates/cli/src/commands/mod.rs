pub mod ask;
pub mod gateway;
pub mod onboard;
pub mod status;

use std::path::{Path, PathBuf};
use wayfarer_config::AppConfig;

/// Config file location: the explicit path, else the default.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

/// Load the config file (defaults if missing) and apply env overrides.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let result = match explicit {
        Some(path) => AppConfig::load_from(path).and_then(|mut config| {
            config.apply_env_overrides(|key| std::env::var(key).ok())?;
            Ok(config)
        }),
        None => AppConfig::load(),
    };
    let config = result.map_err(|e| format!("Failed to load config: {e}"))?;
    tracing::debug!(path = %config_path(explicit).display(), "Config loaded");
    Ok(config)
}
