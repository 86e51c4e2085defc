//! Project-local build overrides.
//!
//! A project may place `medley.build.json` or `medley.build.toml` next to its
//! entry module. The file is read on every unit creation, its `{entryName}`,
//! `{entryPath}` and `{projectName}` placeholders are substituted, and the
//! result is deep-merged over the role preset with [`merge_values`].

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::build::{BuildConfig, BuildParams, Role};
use crate::error::{ConfigError, Result};
use crate::server::ServerConfig;

/// Override file names, in lookup order.
pub const OVERRIDE_FILE_NAMES: [&str; 2] = ["medley.build.json", "medley.build.toml"];

/// Deep merge `update` into `target`.
///
/// Objects merge key by key, arrays concatenate (target first), and any other
/// value in `update` replaces the target. A `null` update leaves the target
/// untouched.
pub fn merge_values(target: &mut Value, update: &Value) {
    match (target, update) {
        (_, Value::Null) => {}
        (Value::Object(target_map), Value::Object(update_map)) => {
            for (key, value) in update_map {
                merge_values(target_map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
        (Value::Array(target_items), Value::Array(update_items)) => {
            target_items.extend(update_items.iter().cloned());
        }
        (target_slot, _) => {
            *target_slot = update.clone();
        }
    }
}

/// Replace `{entryName}`, `{entryPath}` and `{projectName}` in every string
/// of `value`, keys included.
pub fn substitute_params(value: &mut Value, params: &BuildParams) {
    match value {
        Value::String(s) => {
            if s.contains('{') {
                *s = substitute_str(s, params);
            }
        }
        Value::Array(items) => {
            for item in items {
                substitute_params(item, params);
            }
        }
        Value::Object(map) => {
            let entries = std::mem::take(map);
            for (key, mut item) in entries {
                substitute_params(&mut item, params);
                map.insert(substitute_str(&key, params), item);
            }
        }
        _ => {}
    }
}

fn substitute_str(s: &str, params: &BuildParams) -> String {
    s.replace("{entryName}", &params.entry_name)
        .replace("{entryPath}", &params.entry_path)
        .replace("{projectName}", &params.project_name)
}

/// Find the override file in `entry_dir`, if any.
pub fn find_override(entry_dir: &Path) -> Option<PathBuf> {
    OVERRIDE_FILE_NAMES
        .iter()
        .map(|name| entry_dir.join(name))
        .find(|path| path.is_file())
}

/// Read and substitute the override file in `entry_dir`.
///
/// Returns `Ok(None)` when the directory has no override file.
pub fn load_override(entry_dir: &Path, params: &BuildParams) -> Result<Option<Value>> {
    let Some(path) = find_override(entry_dir) else {
        return Ok(None);
    };

    let content = fs::read_to_string(&path)?;
    let is_toml = path.extension().and_then(|e| e.to_str()) == Some("toml");

    let mut value = if is_toml {
        let parsed: toml::Value =
            toml::from_str(&content).map_err(|e| ConfigError::InvalidOverride {
                path: path.clone(),
                message: e.to_string(),
            })?;
        serde_json::to_value(parsed).map_err(|e| ConfigError::InvalidOverride {
            path: path.clone(),
            message: e.to_string(),
        })?
    } else {
        serde_json::from_str(&content).map_err(|e| ConfigError::InvalidOverride {
            path: path.clone(),
            message: e.to_string(),
        })?
    };

    if !value.is_object() {
        return Err(ConfigError::InvalidOverride {
            path,
            message: "override must be a table/object at the top level".to_string(),
        });
    }

    substitute_params(&mut value, params);
    tracing::debug!(path = %path.display(), "loaded build override");
    Ok(Some(value))
}

impl BuildConfig {
    /// Merge an override value over this config.
    pub fn merged_with(&self, update: &Value) -> Result<Self> {
        let mut base =
            serde_json::to_value(self).map_err(|e| ConfigError::Extract(e.to_string()))?;
        merge_values(&mut base, update);
        serde_json::from_value(base).map_err(|e| ConfigError::Extract(e.to_string()))
    }

    /// Preset for `role` with the override file from `entry_dir` applied.
    pub fn resolve(
        role: Role,
        params: &BuildParams,
        server: &ServerConfig,
        entry_dir: &Path,
    ) -> Result<Self> {
        let preset = Self::preset(role, params, server);
        match load_override(entry_dir, params)? {
            Some(update) => preset.merged_with(&update).map_err(|e| match e {
                ConfigError::Extract(message) => ConfigError::InvalidOverride {
                    path: find_override(entry_dir).unwrap_or_else(|| entry_dir.to_path_buf()),
                    message,
                },
                other => other,
            }),
            None => Ok(preset),
        }
    }
}
