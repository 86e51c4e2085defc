//! Forwarding of `/api/...` to a configured backend.

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::response::IntoResponse;
use axum::Router;
use common::{body_text, get, get_text, router, send, Workspace};
use medley_cli::dev::testing::ScriptedBundler;
use medley_config::ServerConfig;
use tokio::net::TcpListener;

/// Backend that answers with what it received.
async fn echo(request: Request<Body>) -> impl IntoResponse {
    let (parts, body) = request.into_parts();
    let body = to_bytes(body, usize::MAX).await.unwrap();
    let authorization = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();
    let host = parts
        .headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let mut headers = HeaderMap::new();
    headers.insert("x-upstream", "echo".parse().unwrap());
    let text = format!(
        "{} {}\n{}\n{}\n{}",
        parts.method,
        parts.uri,
        authorization,
        host,
        String::from_utf8_lossy(&body)
    );
    (StatusCode::CREATED, headers, text)
}

/// Start the echo backend and return its base URL.
async fn spawn_backend() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, Router::new().fallback(echo))
            .await
            .unwrap();
    });
    format!("http://{addr}")
}

fn with_backend(workspace: &Workspace, base_url: &str, auth: Option<&str>) -> ServerConfig {
    ServerConfig {
        base_url: Some(base_url.to_string()),
        auth: auth.map(str::to_string),
        ..workspace.config()
    }
}

#[tokio::test]
async fn api_requests_reach_the_backend() {
    let workspace = Workspace::new();
    let base_url = spawn_backend().await;
    let state = workspace.state_with(
        with_backend(&workspace, &base_url, Some("user:pass")),
        ScriptedBundler::echo(),
    );
    let app = router(&state);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/items?x=1")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"name":"widget"}"#))
        .unwrap();
    let response = send(&app, request).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.headers()["x-upstream"], "echo");
    let body = body_text(response).await;
    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines[0], "POST /api/items?x=1");
    assert_eq!(lines[1], "Basic dXNlcjpwYXNz");
    assert_eq!(lines[2], base_url.trim_start_matches("http://"));
    assert_eq!(lines[3], r#"{"name":"widget"}"#);
}

#[tokio::test]
async fn get_without_auth_is_forwarded_as_is() {
    let workspace = Workspace::new();
    let base_url = spawn_backend().await;
    let state = workspace.state_with(
        with_backend(&workspace, &format!("{base_url}/"), None),
        ScriptedBundler::echo(),
    );
    let app = router(&state);

    let (status, body) = get_text(&app, "/api/users").await;
    assert_eq!(status, StatusCode::CREATED);
    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines[0], "GET /api/users");
    assert_eq!(lines[1], "-");
    assert_eq!(state.registry.len(), 0);
}

#[tokio::test]
async fn unreachable_backend_is_a_bad_gateway() {
    let workspace = Workspace::new();
    let state = workspace.state_with(
        with_backend(&workspace, "http://127.0.0.1:1", None),
        ScriptedBundler::echo(),
    );
    let app = router(&state);

    let (status, body) = get_text(&app, "/api/users").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body.contains("Bad gateway"), "{body}");
}

#[tokio::test]
async fn api_without_backend_falls_through() {
    let workspace = Workspace::new();
    let state = workspace.state(ScriptedBundler::echo());
    let app = router(&state);

    assert!(state.proxy.is_none());
    assert_eq!(get(&app, "/api/users").await.status(), StatusCode::NOT_FOUND);
}
