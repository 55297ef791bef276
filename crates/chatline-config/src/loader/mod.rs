//! Layered configuration loader.
//!
//! Discovers the user and working-directory layers, applies runtime
//! overrides last, validates each layer's schema and produces the final
//! `ChatlineConfig`.

mod layer_io;
mod merge;
mod schema;


use crate::{ChatlineConfig, ConfigError};
use log::{debug, info};
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Default config filename in local layers.
const DEFAULT_CONFIG_FILE: &str = "chatline.json5";
/// Default config directory under the home directory.
const DEFAULT_CONFIG_DIR: &str = ".chatline";

/// Effective config plus metadata about which layers were loaded.
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    /// The merged, validated config.
    pub config: ChatlineConfig,
    /// Metadata for each layer that contributed.
    pub layers: Vec<ConfigLayer>,
}

/// Origin for a single config layer in the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayerSource {
    /// User-specific configuration.
    User,
    /// Current working directory configuration.
    Cwd,
    /// Runtime overrides (highest precedence).
    Runtime,
}

/// Metadata about a loaded config layer.
#[derive(Debug, Clone)]
pub struct ConfigLayer {
    /// Layer origin.
    pub source: ConfigLayerSource,
    /// Location on disk.
    pub path: PathBuf,
}

/// Options controlling layered config discovery and overrides.
#[derive(Debug, Clone)]
pub struct LayeredConfigOptions {
    /// Working directory used to find the cwd layer.
    pub cwd: PathBuf,
    /// Optional user config path (defaults to `~/.chatline/chatline.json5`).
    pub user_config_path: Option<PathBuf>,
    /// Runtime override config paths applied last.
    pub runtime_paths: Vec<PathBuf>,
}

impl LayeredConfigOptions {
    /// Create options with default layer locations for the provided cwd.
    pub fn new(cwd: impl AsRef<Path>) -> Self {
        Self {
            cwd: cwd.as_ref().to_path_buf(),
            user_config_path: layer_io::default_user_config_path(),
            runtime_paths: Vec::new(),
        }
    }

    /// Add a runtime override config path that is applied last.
    pub fn with_runtime_path(mut self, path: impl AsRef<Path>) -> Self {
        self.runtime_paths.push(path.as_ref().to_path_buf());
        self
    }
}

impl ChatlineConfig {
    /// Load a single config from JSON5 contents (no layering).
    pub fn load_from_str(contents: &str) -> Result<Self, ConfigError> {
        debug!("loading config from raw contents (len={})", contents.len());
        let value: Value = json5::from_str(contents)?;
        config_from_value(value, "config")
    }

    /// Load a layered config stack using explicit layer locations.
    ///
    /// Layer precedence (low -> high): user, cwd, runtime overrides.
    pub fn load_layered_with_options(
        options: LayeredConfigOptions,
    ) -> Result<LayeredConfig, ConfigError> {
        let cwd = layer_io::canonical_path(&options.cwd);
        debug!("resolved cwd for config load: {}", cwd.display());
        let mut layers = Vec::new();
        let mut merged = Value::Object(serde_json::Map::new());
        let mut seen_paths = HashSet::new();

        let mut candidates = Vec::new();
        if let Some(path) = options.user_config_path.clone() {
            candidates.push((ConfigLayerSource::User, path, false));
        }
        candidates.push((ConfigLayerSource::Cwd, cwd.join(DEFAULT_CONFIG_FILE), false));
        for path in &options.runtime_paths {
            candidates.push((ConfigLayerSource::Runtime, path.clone(), true));
        }

        for (source, path, required) in candidates {
            let loaded = if required {
                Some(layer_io::load_required_layer(source, &path)?)
            } else {
                layer_io::load_optional_layer(source, &path)?
            };
            let Some(loaded) = loaded else {
                continue;
            };
            if !seen_paths.insert(layer_io::canonical_path(&path)) {
                debug!(
                    "skipping duplicate layer (source={:?}, path={})",
                    source,
                    path.display()
                );
                continue;
            }
            merge::merge_json_values(&mut merged, &loaded.value);
            layers.push(loaded.meta);
        }

        let config = config_from_value(merged, "effective")?;
        info!("layered config loaded (layers={})", layers.len());
        Ok(LayeredConfig { config, layers })
    }

    /// Validate configuration invariants that cannot be expressed in serde.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let endpoint = self.endpoint.trim();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ConfigError::InvalidField {
                path: "endpoint".to_string(),
                message: "expected an http or https URL".to_string(),
            });
        }
        for (path, key) in [
            ("storage.history_key", &self.storage.history_key),
            ("storage.saved_key", &self.storage.saved_key),
        ] {
            let valid = !key.is_empty()
                && key
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
            if !valid {
                return Err(ConfigError::InvalidField {
                    path: path.to_string(),
                    message: "expected a non-empty key of [A-Za-z0-9_-]".to_string(),
                });
            }
        }
        if self.storage.history_key == self.storage.saved_key {
            return Err(ConfigError::Invalid(
                "storage.history_key and storage.saved_key must differ".to_string(),
            ));
        }
        Ok(())
    }
}

/// Internal representation of a loaded config layer.
#[derive(Debug, Clone)]
struct LoadedLayer {
    meta: ConfigLayer,
    value: Value,
}

fn config_from_value(value: Value, label: &str) -> Result<ChatlineConfig, ConfigError> {
    schema::validate_layer_schema(&value, label)?;
    let config: ChatlineConfig = serde_json::from_value(value)?;
    config.validate()?;
    Ok(config)
}
