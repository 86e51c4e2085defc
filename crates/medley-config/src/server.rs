//! Process-wide development server configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Base directory every relative path below is resolved against.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Root of single-bundle ("site") projects.
    #[serde(default = "default_site_root")]
    pub site_root: PathBuf,

    /// Root of server-rendered projects.
    #[serde(default = "default_ssr_root")]
    pub ssr_root: PathBuf,

    /// Directory served verbatim for unmatched requests.
    #[serde(default = "default_static_dir")]
    pub static_dir: Option<PathBuf>,

    #[serde(default = "default_site_entry_prefix")]
    pub site_entry_prefix: String,

    #[serde(default = "default_ssr_entry_prefix")]
    pub ssr_entry_prefix: String,

    #[serde(default = "default_ssr_url_prefix")]
    pub ssr_url_prefix: String,

    #[serde(default = "default_hmr_prefix")]
    pub hmr_prefix: String,

    /// Requests below `/{api_prefix}/` are forwarded to `base_url`.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Backend the API prefix is proxied to, e.g. `http://127.0.0.1:3000`.
    /// Without it API requests fall through like any other path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// `user:password` sent to `base_url` as basic auth. Never serialized.
    #[serde(default, skip_serializing)]
    pub auth: Option<String>,

    /// SSR project the bare `/` redirects to.
    #[serde(default = "default_project")]
    pub default_project: String,

    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_ms: u64,

    /// Upper bound on projects with live compilation units. `None` keeps every
    /// project alive for the lifetime of the process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_projects: Option<usize>,

    #[serde(default = "default_watch_ignore")]
    pub watch_ignore: Vec<String>,

    #[serde(default)]
    pub bundler: BundlerSettings,

    #[serde(default)]
    pub ssr: SsrSettings,
}

/// How the external bundler is invoked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundlerSettings {
    /// Program and arguments. The merged build config is written to its stdin.
    #[serde(default = "default_bundler_command")]
    pub command: Vec<String>,

    /// Module injected ahead of browser entries to receive hot-reload events.
    #[serde(default = "default_hot_client")]
    pub hot_client: String,

    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl Default for BundlerSettings {
    fn default() -> Self {
        Self {
            command: default_bundler_command(),
            hot_client: default_hot_client(),
            env: BTreeMap::new(),
        }
    }
}

/// File names that make up a server-rendered project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SsrSettings {
    #[serde(default = "default_server_entry")]
    pub server_entry: String,

    #[serde(default = "default_client_entry")]
    pub client_entry: String,

    #[serde(default = "default_template")]
    pub template: String,

    #[serde(default = "default_server_bundle")]
    pub server_bundle: String,

    #[serde(default = "default_client_manifest")]
    pub client_manifest: String,
}

impl Default for SsrSettings {
    fn default() -> Self {
        Self {
            server_entry: default_server_entry(),
            client_entry: default_client_entry(),
            template: default_template(),
            server_bundle: default_server_bundle(),
            client_manifest: default_client_manifest(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            root: default_root(),
            site_root: default_site_root(),
            ssr_root: default_ssr_root(),
            static_dir: default_static_dir(),
            site_entry_prefix: default_site_entry_prefix(),
            ssr_entry_prefix: default_ssr_entry_prefix(),
            ssr_url_prefix: default_ssr_url_prefix(),
            hmr_prefix: default_hmr_prefix(),
            api_prefix: default_api_prefix(),
            base_url: None,
            auth: None,
            default_project: default_project(),
            debounce_ms: default_debounce_ms(),
            heartbeat_ms: default_heartbeat_ms(),
            max_projects: None,
            watch_ignore: default_watch_ignore(),
            bundler: BundlerSettings::default(),
            ssr: SsrSettings::default(),
        }
    }
}

impl ServerConfig {
    /// Socket address built from `host` and `port`.
    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ConfigError::InvalidValue {
                field: "host".to_string(),
                hint: Some(format!("'{}' is not a valid IP address: {e}", self.host)),
            })
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Rebase every relative directory on `root`, which is itself rebased on `cwd`.
    pub fn resolve_paths(mut self, cwd: &Path) -> Self {
        if self.root.is_relative() {
            self.root = cwd.join(&self.root);
        }
        let root = self.root.clone();
        let rebase = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = root.join(&*p);
            }
        };
        rebase(&mut self.site_root);
        rebase(&mut self.ssr_root);
        if let Some(dir) = self.static_dir.as_mut() {
            rebase(dir);
        }
        self
    }

    /// Path of the hot-reload endpoint for one project, e.g.
    /// `/__site_webpack_hmr/ssr/hello/world`.
    pub fn hmr_path(&self, class: &str, project: &str) -> String {
        format!("/{}/{}/{}", self.hmr_prefix, class, project)
    }

    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "port".to_string(),
                hint: Some("port must be between 1 and 65535".to_string()),
            });
        }

        if self.default_project.trim_matches('/').is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "default_project".to_string(),
                hint: Some("name an SSR project, e.g. \"hello/world\"".to_string()),
            });
        }

        if self.bundler.command.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "bundler.command".to_string(),
                hint: Some("provide at least the program to run".to_string()),
            });
        }

        if self.max_projects == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "max_projects".to_string(),
                hint: Some("omit the key to disable the limit".to_string()),
            });
        }

        if let Some(url) = &self.base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidValue {
                    field: "base_url".to_string(),
                    hint: Some(format!("'{url}' must start with http:// or https://")),
                });
            }
        }

        let prefixes = [
            ("site_entry_prefix", &self.site_entry_prefix),
            ("ssr_entry_prefix", &self.ssr_entry_prefix),
            ("ssr_url_prefix", &self.ssr_url_prefix),
            ("hmr_prefix", &self.hmr_prefix),
            ("api_prefix", &self.api_prefix),
        ];

        for (field, prefix) in prefixes {
            if prefix.is_empty() || prefix.contains('/') {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    hint: Some("must be a single non-empty path segment".to_string()),
                });
            }
        }

        for (i, (_, first)) in prefixes.iter().enumerate() {
            for (_, second) in &prefixes[i + 1..] {
                if first == second {
                    return Err(ConfigError::OverlappingPrefixes {
                        first: first.to_string(),
                        second: second.to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}

fn default_host() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    8080
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_site_root() -> PathBuf {
    PathBuf::from("src/site")
}

fn default_ssr_root() -> PathBuf {
    PathBuf::from("src/ssr")
}

fn default_static_dir() -> Option<PathBuf> {
    Some(PathBuf::from("src/static"))
}

fn default_site_entry_prefix() -> String {
    "site-res".into()
}

fn default_ssr_entry_prefix() -> String {
    "ssr-res".into()
}

fn default_ssr_url_prefix() -> String {
    "ssr".into()
}

fn default_hmr_prefix() -> String {
    "__site_webpack_hmr".into()
}

fn default_api_prefix() -> String {
    "api".into()
}

fn default_project() -> String {
    "hello/world".into()
}

fn default_debounce_ms() -> u64 {
    100
}

fn default_heartbeat_ms() -> u64 {
    2000
}

fn default_watch_ignore() -> Vec<String> {
    vec!["node_modules".to_string(), "*.log".to_string()]
}

fn default_bundler_command() -> Vec<String> {
    vec!["node".to_string(), "scripts/medley-bundle.js".to_string()]
}

fn default_hot_client() -> String {
    "medley/hot-client.js".into()
}

fn default_server_entry() -> String {
    "entry-server.js".into()
}

fn default_client_entry() -> String {
    "entry-client.js".into()
}

fn default_template() -> String {
    "app.html".into()
}

fn default_server_bundle() -> String {
    "vue-ssr-server-bundle.json".into()
}

fn default_client_manifest() -> String {
    "vue-ssr-client-manifest.json".into()
}
