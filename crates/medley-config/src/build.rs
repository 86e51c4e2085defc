//! Build configuration handed to the external bundler, plus the role presets.
//!
//! Every compilation unit starts from one of three presets:
//!
//! - [`Role::Site`]: a single browser bundle written under `/{project}`.
//! - [`Role::Client`]: the browser half of an SSR project, written under
//!   `/client/{project}` together with the client manifest.
//! - [`Role::Server`]: the node half of an SSR project, written under
//!   `/server/{project}` as a single server bundle JSON.
//!
//! Project-local overrides are merged on top with [`crate::merge`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

use crate::server::ServerConfig;

/// Which half of a project a compilation unit builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Site,
    Client,
    Server,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Site => "site",
            Role::Client => "client",
            Role::Server => "server",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs a project override file may reference as `{entryName}`,
/// `{entryPath}` and `{projectName}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildParams {
    pub entry_name: String,
    pub entry_path: String,
    pub project_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildConfig {
    #[serde(default = "default_mode")]
    pub mode: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    /// Entry name to the list of modules that make it up, in load order.
    pub entry: IndexMap<String, Vec<String>>,

    pub output: OutputOptions,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub externals: Vec<Value>,

    #[serde(default)]
    pub module: ModuleOptions,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub devtool: Option<String>,

    /// Options the server does not interpret; passed to the bundler untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputOptions {
    /// Directory inside the in-memory store, always absolute (`/client/foo`).
    pub path: String,

    /// File name pattern; `[name]` expands to the entry name.
    #[serde(default = "default_filename")]
    pub filename: String,

    pub public_path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library_target: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleOptions {
    #[serde(default)]
    pub rules: Vec<Value>,
}

impl OutputOptions {
    /// File name for `entry_name` after expanding the `[name]` pattern.
    pub fn file_for(&self, entry_name: &str) -> String {
        self.filename.replace("[name]", entry_name)
    }

    /// Store path for a file emitted into this output directory.
    pub fn join(&self, file: &str) -> String {
        format!(
            "{}/{}",
            self.path.trim_end_matches('/'),
            file.trim_start_matches('/')
        )
    }
}

impl BuildConfig {
    /// Preset for `role`, before any project override is applied.
    pub fn preset(role: Role, params: &BuildParams, server: &ServerConfig) -> Self {
        match role {
            Role::Site => Self::site(params, server),
            Role::Client => Self::client(params, server),
            Role::Server => Self::server(params, server),
        }
    }

    fn base(params: &BuildParams) -> Self {
        let mut extra = Map::new();
        extra.insert(
            "resolve".to_string(),
            json!({
                "extensions": [".js", ".mjs", ".vue", ".json", ".ts"],
            }),
        );

        Self {
            mode: default_mode(),
            target: None,
            entry: IndexMap::new(),
            output: OutputOptions {
                path: format!("/{}", params.project_name),
                filename: default_filename(),
                public_path: String::new(),
                library_target: None,
            },
            externals: Vec::new(),
            module: ModuleOptions {
                rules: style_rules(&params.entry_path),
            },
            plugins: Vec::new(),
            devtool: Some("cheap-module-eval-source-map".to_string()),
            extra,
        }
    }

    fn site(params: &BuildParams, server: &ServerConfig) -> Self {
        let mut config = Self::base(params);
        config.entry.insert(
            params.entry_name.clone(),
            vec![
                hot_client_entry(server, "site", &params.project_name),
                params.entry_path.clone(),
            ],
        );
        config.output.path = format!("/{}", params.project_name);
        config.output.public_path =
            format!("/{}/{}/", server.site_entry_prefix, params.project_name);
        config.plugins = vec![json!({ "name": "hot-module-replacement" })];
        config
    }

    fn client(params: &BuildParams, server: &ServerConfig) -> Self {
        let mut config = Self::base(params);
        config.entry.insert(
            params.entry_name.clone(),
            vec![
                hot_client_entry(server, "ssr", &params.project_name),
                params.entry_path.clone(),
            ],
        );
        config.output.path = format!("/client/{}", params.project_name);
        config.output.public_path =
            format!("/{}/{}/", server.ssr_entry_prefix, params.project_name);
        config.plugins = vec![
            json!({ "name": "ssr-client-manifest", "filename": server.ssr.client_manifest }),
            json!({ "name": "hot-module-replacement" }),
        ];
        config
    }

    fn server(params: &BuildParams, server: &ServerConfig) -> Self {
        let mut config = Self::base(params);
        config.target = Some("node".to_string());
        config
            .entry
            .insert(params.entry_name.clone(), vec![params.entry_path.clone()]);
        config.output.path = format!("/server/{}", params.project_name);
        config.output.public_path =
            format!("/{}/{}/", server.ssr_entry_prefix, params.project_name);
        config.output.library_target = Some("commonjs2".to_string());
        config.externals = vec![json!({ "nodeExternals": { "allowlist": ["\\.css$"] } })];
        config.plugins = vec![
            json!({ "name": "ssr-server-bundle", "filename": server.ssr.server_bundle }),
        ];
        config
    }

    /// Name of the first entry, which names the primary emitted file.
    pub fn primary_entry(&self) -> Option<&str> {
        self.entry.keys().next().map(String::as_str)
    }
}

fn hot_client_entry(server: &ServerConfig, class: &str, project: &str) -> String {
    format!(
        "{}?{}",
        server.bundler.hot_client,
        server.hmr_path(class, project)
    )
}

fn style_rules(entry_path: &str) -> Vec<Value> {
    let loaders = |lang: &str| -> Value {
        json!({
            "test": format!("\\.{lang}$"),
            "use": ["style", "css", "postcss", lang],
            "options": { "sourceMap": true, "entryPath": entry_path },
        })
    };

    vec![
        json!({
            "test": "\\.css$",
            "use": ["style", "css", "postcss"],
            "options": { "sourceMap": true, "entryPath": entry_path },
        }),
        loaders("scss"),
        loaders("less"),
    ]
}

fn default_mode() -> String {
    "development".to_string()
}

fn default_filename() -> String {
    "[name].js".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> BuildParams {
        BuildParams {
            entry_name: "app".to_string(),
            entry_path: "/src/ssr/hello/world/entry-client.js".to_string(),
            project_name: "hello/world".to_string(),
        }
    }

    #[test]
    fn site_preset_injects_hot_client_first() {
        let config = BuildConfig::preset(Role::Site, &params(), &ServerConfig::default());
        let modules = &config.entry["app"];
        assert_eq!(
            modules[0],
            "medley/hot-client.js?/__site_webpack_hmr/site/hello/world"
        );
        assert_eq!(modules[1], "/src/ssr/hello/world/entry-client.js");
        assert_eq!(config.output.path, "/hello/world");
        assert_eq!(config.output.public_path, "/site-res/hello/world/");
    }

    #[test]
    fn client_and_server_write_to_separate_trees() {
        let server = ServerConfig::default();
        let client = BuildConfig::preset(Role::Client, &params(), &server);
        let node = BuildConfig::preset(Role::Server, &params(), &server);

        assert_eq!(client.output.path, "/client/hello/world");
        assert_eq!(node.output.path, "/server/hello/world");
        assert_eq!(node.target.as_deref(), Some("node"));
        assert_eq!(node.output.library_target.as_deref(), Some("commonjs2"));
        assert_eq!(node.entry["app"].len(), 1);
    }

    #[test]
    fn output_helpers() {
        let config = BuildConfig::preset(Role::Site, &params(), &ServerConfig::default());
        assert_eq!(config.output.file_for("index"), "index.js");
        assert_eq!(config.output.join("index.js"), "/hello/world/index.js");
        assert_eq!(config.primary_entry(), Some("app"));
    }

    #[test]
    fn serializes_camel_case() {
        let config = BuildConfig::preset(Role::Server, &params(), &ServerConfig::default());
        let value = serde_json::to_value(&config).unwrap();
        assert!(value["output"].get("publicPath").is_some());
        assert!(value["output"].get("libraryTarget").is_some());
        assert!(value.get("resolve").is_some());
        assert!(value.get("extra").is_none());
    }
}
