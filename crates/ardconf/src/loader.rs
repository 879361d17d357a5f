//! Config file discovery, table merging, and environment variable overlay.

use crate::{ArdConfig, ConfigError};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
/// Returns paths in load order (system, user, local/cli).
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/ardmix/config.toml");
    if system.exists() {
        files.push(system);
    }

    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("ardmix/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("ardmix.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Read a TOML file into a raw table.
pub fn load_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_table(&contents, path)
}

fn parse_table(contents: &str, path: &Path) -> Result<toml::Table, ConfigError> {
    contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Load a single file as a complete config (defaults fill the gaps).
pub fn load_from_file(path: &Path) -> Result<ArdConfig, ConfigError> {
    from_table(load_table(path)?, path)
}

/// Deserialize a merged table, filling missing keys with defaults.
pub fn from_table(table: toml::Table, origin: &Path) -> Result<ArdConfig, ConfigError> {
    toml::Value::Table(table)
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::Parse {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })
}

/// Merge `overlay` into `base`, key by key. Nested tables merge recursively;
/// any other value in `overlay` replaces the one in `base`.
pub fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut ArdConfig, sources: &mut ConfigSources) {
    apply_overrides_from(config, sources, |key| env::var(key).ok());
}

/// Apply overrides using an arbitrary variable lookup.
pub fn apply_overrides_from<F>(config: &mut ArdConfig, sources: &mut ConfigSources, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("ARDMIX_HOST") {
        config.connection.host = v;
        sources.env_overrides.push("ARDMIX_HOST".to_string());
    }
    if let Some(v) = lookup("ARDMIX_PORT") {
        if let Ok(port) = v.parse() {
            config.connection.port = port;
            sources.env_overrides.push("ARDMIX_PORT".to_string());
        }
    }
    if let Some(v) = lookup("ARDMIX_SURFACE") {
        config.connection.surface = v;
        sources.env_overrides.push("ARDMIX_SURFACE".to_string());
    }

    if let Some(v) = lookup("ARDMIX_COMPONENTS").and_then(|v| parse_bool(&v)) {
        config.client.components = v;
        sources.env_overrides.push("ARDMIX_COMPONENTS".to_string());
    }
    if let Some(v) = lookup("ARDMIX_AUTO_RECONNECT").and_then(|v| parse_bool(&v)) {
        config.client.auto_reconnect = v;
        sources.env_overrides.push("ARDMIX_AUTO_RECONNECT".to_string());
    }
    if let Some(v) = lookup("ARDMIX_RECONNECT_INTERVAL_MS") {
        if let Ok(ms) = v.parse() {
            config.client.reconnect_interval_ms = ms;
            sources
                .env_overrides
                .push("ARDMIX_RECONNECT_INTERVAL_MS".to_string());
        }
    }

    if let Some(v) = lookup("ARDMIX_LOG_LEVEL") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("ARDMIX_LOG_LEVEL".to_string());
    }
    // Also support RUST_LOG
    if let Some(v) = lookup("RUST_LOG") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("RUST_LOG".to_string());
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
