//! Layered configuration loading for the `medley` binary.
//!
//! Precedence, lowest to highest:
//!
//! 1. Built-in defaults ([`ServerConfig::default`])
//! 2. `medley.toml` in the project root, or an explicit `--config` file
//! 3. `MEDLEY_*` environment variables (`MEDLEY_PORT=3000`,
//!    `MEDLEY_BUNDLER__COMMAND='["node","build.js"]'`)
//!
//! CLI flags are layered on top by the caller.

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized, Toml},
};

use crate::error::{ConfigError, Result};
use crate::server::ServerConfig;

pub const CONFIG_FILE_NAME: &str = "medley.toml";
pub const ENV_PREFIX: &str = "MEDLEY_";

/// Searches a project root for `medley.toml` and builds the layered figment.
///
/// ```no_run
/// use medley_config::ConfigDiscovery;
///
/// let config = ConfigDiscovery::new(".").load(None).unwrap();
/// println!("listening on {}", config.server_url());
/// ```
#[derive(Debug, Clone)]
pub struct ConfigDiscovery {
    root: PathBuf,
}

impl ConfigDiscovery {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The conventional config file, if it exists.
    pub fn find(&self) -> Option<PathBuf> {
        let path = self.root.join(CONFIG_FILE_NAME);
        path.is_file().then_some(path)
    }

    /// Build the layered figment without extracting it.
    ///
    /// An explicit path must exist; the conventional file is optional.
    pub fn figment(&self, explicit: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::new().merge(Serialized::defaults(ServerConfig::default()));

        let file = match explicit {
            Some(path) => {
                let path = if path.is_relative() {
                    self.root.join(path)
                } else {
                    path.to_path_buf()
                };
                if !path.is_file() {
                    return Err(ConfigError::NotFound(path));
                }
                Some(path)
            }
            None => self.find(),
        };

        if let Some(path) = file {
            tracing::debug!(path = %path.display(), "loading config file");
            figment = match path.extension().and_then(|e| e.to_str()) {
                Some("json") => figment.merge(Json::file(&path)),
                _ => figment.merge(Toml::file(&path)),
            };
        }

        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Extract, rebase relative paths on the discovery root, and validate.
    pub fn load(&self, explicit: Option<&Path>) -> Result<ServerConfig> {
        let config: ServerConfig = self.figment(explicit)?.extract()?;
        let config = config.resolve_paths(&self.root);
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn find_returns_none_without_file() {
        let dir = TempDir::new().unwrap();
        assert!(ConfigDiscovery::new(dir.path()).find().is_none());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = ConfigDiscovery::new(dir.path())
            .figment(Some(Path::new("nope.toml")))
            .unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }
}
