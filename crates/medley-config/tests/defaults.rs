//! Defaults every deployment starts from.

use medley_config::{BuildConfig, BuildParams, Role, ServerConfig};
use std::path::PathBuf;

#[test]
fn server_defaults_match_documented_values() {
    let config = ServerConfig::default();
    assert_eq!(config.host, "127.0.0.1");
    assert_eq!(config.port, 8080);
    assert_eq!(config.site_entry_prefix, "site-res");
    assert_eq!(config.ssr_entry_prefix, "ssr-res");
    assert_eq!(config.ssr_url_prefix, "ssr");
    assert_eq!(config.hmr_prefix, "__site_webpack_hmr");
    assert_eq!(config.api_prefix, "api");
    assert_eq!(config.base_url, None);
    assert_eq!(config.default_project, "hello/world");
    assert_eq!(config.heartbeat_ms, 2000);
    assert_eq!(config.max_projects, None);
    assert_eq!(config.site_root, PathBuf::from("src/site"));
    assert_eq!(config.ssr_root, PathBuf::from("src/ssr"));
    assert_eq!(config.static_dir, Some(PathBuf::from("src/static")));
}

#[test]
fn ssr_file_names() {
    let ssr = ServerConfig::default().ssr;
    assert_eq!(ssr.server_entry, "entry-server.js");
    assert_eq!(ssr.client_entry, "entry-client.js");
    assert_eq!(ssr.template, "app.html");
    assert_eq!(ssr.server_bundle, "vue-ssr-server-bundle.json");
    assert_eq!(ssr.client_manifest, "vue-ssr-client-manifest.json");
}

#[test]
fn empty_toml_deserializes_to_defaults() {
    let config: ServerConfig = toml::from_str("").unwrap();
    assert_eq!(config, ServerConfig::default());
}

#[test]
fn client_preset_emits_manifest_plugin() {
    let server = ServerConfig::default();
    let params = BuildParams {
        entry_name: "app".to_string(),
        entry_path: "/srv/ssr/shop/entry-client.js".to_string(),
        project_name: "shop".to_string(),
    };
    let config = BuildConfig::preset(Role::Client, &params, &server);

    assert!(config.plugins.iter().any(|p| {
        p["name"] == "ssr-client-manifest" && p["filename"] == "vue-ssr-client-manifest.json"
    }));
    assert_eq!(config.output.public_path, "/ssr-res/shop/");
}
