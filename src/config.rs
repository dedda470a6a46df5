//! Render configuration.
//!
//! Handles loading, validating and merging `render.toml`. Values are layered:
//! stock defaults are overridden by the config file, which is overridden by
//! command-line flags.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! render_host = "https://{organization}.rokka.io"
//! default_stack = "dynamic/noop"
//! remove_safe_url_from_query = false
//!
//! [variables]
//! # Variables added to every URL built from the command line.
//! # Command-line --var values override these.
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::operations::DEFAULT_STACK;
use crate::render::{DEFAULT_RENDER_HOST, ORGANIZATION_PLACEHOLDER};
use crate::types::Variables;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// File name looked up when no config path is given.
pub const CONFIG_FILE_NAME: &str = "render.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Render configuration loaded from `render.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    /// Render host template; `{organization}` is replaced by the organization name.
    pub render_host: String,
    /// Stack used when a command is given neither a stack nor operations.
    pub default_stack: String,
    /// Print the `v` query parameter with readable JSON.
    pub remove_safe_url_from_query: bool,
    /// Variables applied to every URL built from the command line.
    pub variables: Variables,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            render_host: DEFAULT_RENDER_HOST.to_string(),
            default_stack: DEFAULT_STACK.to_string(),
            remove_safe_url_from_query: false,
            variables: Variables::new(),
        }
    }
}

impl RenderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.render_host.contains(ORGANIZATION_PLACEHOLDER) {
            return Err(ConfigError::Validation(format!(
                "render_host must contain {ORGANIZATION_PLACEHOLDER}"
            )));
        }
        if !(self.render_host.starts_with("https://") || self.render_host.starts_with("http://")) {
            return Err(ConfigError::Validation(
                "render_host must start with http:// or https://".into(),
            ));
        }
        if self.default_stack.is_empty() {
            return Err(ConfigError::Validation(
                "default_stack must not be empty".into(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(RenderConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// Tables merge key-by-key; any other overlay value replaces the base value.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value; `Ok(None)` if it does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<RenderConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: RenderConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`, falling back to stock defaults when it is missing.
pub fn load_config(path: &Path) -> Result<RenderConfig, ConfigError> {
    let overlay = load_raw_config(path)?;
    if overlay.is_some() {
        tracing::debug!(path = %path.display(), "loaded render config");
    }
    resolve_config(stock_defaults_value(), overlay)
}

/// Returns a fully-commented stock `render.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# rokka-render configuration
# ===========================
# All settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.

# Render host template. {organization} is replaced with the organization
# name when building URLs, and stripped from the hostname when reading them.
render_host = "https://{organization}.rokka.io"

# Stack used when neither --stack nor --op is given.
default_stack = "dynamic/noop"

# Print the `v` query parameter as readable JSON instead of percent-escaped.
# Same as passing --readable.
remove_safe_url_from_query = false

# Variables added to every URL built from the command line.
# Values passed with --var override these.
[variables]
# text = "hello"
"##
}
