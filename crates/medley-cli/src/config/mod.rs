//! Server configuration loading for the CLI.
//!
//! Priority: flags > `MEDLEY_*` environment > config file > defaults. The
//! first three layers come from [`medley_config::ConfigDiscovery`]; flags are
//! merged on top as one more serialized provider.

use crate::cli::{ConfigArgs, DevArgs};
use crate::error::Result;
use figment::providers::Serialized;
use medley_config::{ConfigDiscovery, ServerConfig};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Flags that override configuration keys. Unset flags are not serialized,
/// so they never mask a lower layer.
#[derive(Debug, Default, Clone, Serialize)]
pub struct CliOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_root: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssr_root: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_project: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_projects: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl From<&ConfigArgs> for CliOverrides {
    fn from(args: &ConfigArgs) -> Self {
        Self {
            host: args.host.clone(),
            site_root: args.site_root.clone(),
            ssr_root: args.ssr_root.clone(),
            ..Self::default()
        }
    }
}

impl From<&DevArgs> for CliOverrides {
    fn from(args: &DevArgs) -> Self {
        Self {
            port: args.port,
            default_project: args.default_project.clone(),
            max_projects: args.max_projects,
            base_url: args.base_url.clone(),
            ..Self::from(&args.config)
        }
    }
}

/// Load, rebase on `cwd` and validate the server configuration.
pub fn load(cwd: &Path, config_path: Option<&Path>, overrides: &CliOverrides) -> Result<ServerConfig> {
    let figment = ConfigDiscovery::new(cwd)
        .figment(config_path)?
        .merge(Serialized::defaults(overrides));

    let config: ServerConfig = figment.extract()?;
    let config = config.resolve_paths(cwd);
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CliError;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn flags_override_config_file() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("medley.toml"),
            "port = 9000\ndefault_project = \"shop/home\"\n",
        )
        .unwrap();

        let overrides = CliOverrides {
            port: Some(7000),
            ..CliOverrides::default()
        };
        let config = load(dir.path(), None, &overrides).unwrap();

        assert_eq!(config.port, 7000);
        assert_eq!(config.default_project, "shop/home");
    }

    #[test]
    fn relative_roots_are_rebased() {
        let dir = TempDir::new().unwrap();
        let overrides = CliOverrides {
            site_root: Some(PathBuf::from("pages")),
            ..CliOverrides::default()
        };
        let config = load(dir.path(), None, &overrides).unwrap();
        assert!(config.site_root.starts_with(dir.path()));
        assert!(config.site_root.ends_with("pages"));
    }

    #[test]
    fn missing_explicit_file_fails() {
        let dir = TempDir::new().unwrap();
        let result = load(
            dir.path(),
            Some(Path::new("nope.toml")),
            &CliOverrides::default(),
        );
        assert!(matches!(result, Err(CliError::Config(_))));
    }

    #[test]
    fn invalid_override_is_rejected() {
        let dir = TempDir::new().unwrap();
        let overrides = CliOverrides {
            max_projects: Some(0),
            ..CliOverrides::default()
        };
        assert!(load(dir.path(), None, &overrides).is_err());
    }

    #[test]
    fn base_url_flag_sets_the_api_backend() {
        let dir = TempDir::new().unwrap();
        let overrides = CliOverrides {
            base_url: Some("http://127.0.0.1:3000".to_string()),
            ..CliOverrides::default()
        };
        let config = load(dir.path(), None, &overrides).unwrap();
        assert_eq!(config.base_url.as_deref(), Some("http://127.0.0.1:3000"));
    }

    #[test]
    fn unset_flags_are_not_serialized() {
        let value = serde_json::to_value(CliOverrides::default()).unwrap();
        assert_eq!(value, serde_json::json!({}));
    }
}
