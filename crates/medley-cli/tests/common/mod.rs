//! Shared fixtures for the dev server integration tests.

#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use medley_cli::dev::testing::ScriptedBundler;
use medley_cli::dev::{build_router, DevState, SharedState};
use medley_config::ServerConfig;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

pub const APP_HTML: &str =
    "<!DOCTYPE html><html><head><title>app</title></head><body><!--vue-ssr-outlet--></body></html>";

/// Workspace with two site projects, two SSR projects and a static dir.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path();

        for project in ["site/foo", "site/bar/baz"] {
            fs::create_dir_all(root.join(project)).unwrap();
            fs::write(root.join(project).join("index.js"), "export default 1").unwrap();
        }
        for project in ["ssr/projA", "ssr/projB"] {
            let project_dir = root.join(project);
            fs::create_dir_all(&project_dir).unwrap();
            fs::write(project_dir.join("app.html"), APP_HTML).unwrap();
            fs::write(project_dir.join("entry-client.js"), "").unwrap();
            fs::write(project_dir.join("entry-server.js"), "").unwrap();
        }
        fs::create_dir_all(root.join("static")).unwrap();
        fs::write(root.join("static/hello.txt"), "hello from static").unwrap();

        Self { dir }
    }

    pub fn config(&self) -> ServerConfig {
        let root = self.dir.path();
        ServerConfig {
            root: root.to_path_buf(),
            site_root: root.join("site"),
            ssr_root: root.join("ssr"),
            static_dir: Some(root.join("static")),
            heartbeat_ms: 60_000,
            ..ServerConfig::default()
        }
    }

    pub fn state(&self, bundler: ScriptedBundler) -> SharedState {
        self.state_with(self.config(), bundler)
    }

    pub fn state_with(&self, config: ServerConfig, bundler: ScriptedBundler) -> SharedState {
        DevState::new(config, Arc::new(bundler))
            .without_watching()
            .into_shared()
    }
}

pub fn router(state: &SharedState) -> Router {
    build_router(state.clone())
}

pub async fn get(router: &Router, uri: &str) -> Response {
    send(router, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

pub async fn send(router: &Router, request: Request<Body>) -> Response {
    router.clone().oneshot(request).await.unwrap()
}

pub async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn get_text(router: &Router, uri: &str) -> (StatusCode, String) {
    let response = get(router, uri).await;
    let status = response.status();
    (status, body_text(response).await)
}
