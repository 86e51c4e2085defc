//! HTTP front of the dev server.
//!
//! A single fallback handler classifies each request by its first path
//! segment and hands it to the site, SSR, SSR asset or hot-reload flow, or
//! to the API proxy when a backend is configured. A flow that has nothing to
//! serve passes the request on to the static directory, the favicon, the `/`
//! redirect and finally the 404 page.

use crate::dev::{
    pages, resolve, BuildFailure, DevError, HotHub, ProjectKey, RenderContext, Route,
    SharedState,
};
use crate::error::{CliError, Result};
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, Method, StatusCode},
    response::{Html, IntoResponse, Response},
    Router,
};
use std::sync::Arc;
use tower::ServiceExt;
use tower_http::compression::CompressionLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use super::registry::ProjectClass;
use super::router::is_compilable;
use super::store::content_type_for;

/// Development server.
pub struct DevServer {
    state: SharedState,
}

impl DevServer {
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }

    /// Bind the configured address and serve until the task is dropped.
    ///
    /// # Errors
    ///
    /// Returns error if the address is invalid or cannot be bound.
    pub async fn start(self) -> Result<()> {
        let addr = self.state.config.addr()?;
        let server_url = self.state.config.server_url();

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| CliError::Server(format!("Failed to bind to {}: {}", addr, e)))?;

        crate::ui::success(&format!("Development server running at {}", server_url));
        crate::ui::info(&format!(
            "SSR pages under {}/{}/, site assets under {}/{}/",
            server_url,
            self.state.config.ssr_url_prefix,
            server_url,
            self.state.config.site_entry_prefix
        ));

        axum::serve(listener, build_router(self.state))
            .await
            .map_err(|e| CliError::Server(format!("Server error: {}", e)))?;

        Ok(())
    }
}

/// Build the axum router over `state`.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .fallback(dispatch)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn dispatch(State(state): State<SharedState>, request: Request) -> Response {
    let path = request.uri().path().to_string();
    let url = request
        .uri()
        .path_and_query()
        .map_or_else(|| path.clone(), |pq| pq.as_str().to_string());

    let route = Route::classify(&state.config, &path);
    if let (Route::Api, Some(proxy)) = (&route, &state.proxy) {
        return proxy
            .forward(request)
            .await
            .unwrap_or_else(IntoResponse::into_response);
    }

    let outcome = match route {
        Route::SiteAsset { rest } => serve_site(&state, rest).await,
        Route::Ssr { rest } => render_ssr(&state, &url, rest).await,
        Route::SsrAsset { rest } => Ok(serve_ssr_asset(&state, rest)),
        Route::Hot { class, rest } => Ok(Some(subscribe_hot(&state, class, rest))),
        Route::Api | Route::Other => Ok(None),
    };

    match outcome {
        Ok(Some(response)) => response,
        Ok(None) => passthrough(&state, &path, request).await,
        Err(e) => e.into_response(),
    }
}

fn asset_response(path: &str, content: Arc<[u8]>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type_for(path)),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from(content.to_vec()),
    )
        .into_response()
}

/// Site flow: serve from the store, or create the project's unit and wait
/// for its first build.
async fn serve_site(state: &SharedState, rest: &str) -> Result<Option<Response>, DevError> {
    if let Some(content) = state.site_store.read_file(rest) {
        return Ok(Some(asset_response(rest, content)));
    }
    if !is_compilable(rest) {
        return Ok(None);
    }
    let Some(project) = resolve(rest, &state.config.site_root) else {
        return Ok(None);
    };

    let (unit, created) = state.ensure_site_unit(&project, &state.site_entry(rest))?;
    if !created {
        return Err(DevError::BuildInFlight {
            project: project.to_string(),
        });
    }

    unit.wait_for_build(0).await;
    if let Some(summary) = unit.last_build().filter(|s| !s.errors.is_empty()) {
        return Err(DevError::Build(BuildFailure {
            errors: summary.errors,
        }));
    }

    let served = std::iter::once(rest.to_string())
        .chain(unit.primary_output())
        .find_map(|path| {
            state
                .site_store
                .read_file(&path)
                .map(|content| asset_response(&path, content))
        });
    served
        .map(Some)
        .ok_or_else(|| DevError::NotFound(rest.to_string()))
}

/// SSR flow: make sure both units exist, then render with the cached
/// renderer or answer with the interim page.
async fn render_ssr(
    state: &SharedState,
    url: &str,
    rest: &str,
) -> Result<Option<Response>, DevError> {
    let Some(project) = resolve(rest, &state.config.ssr_root) else {
        return Ok(None);
    };
    state.ensure_ssr_units(&project)?;

    let Some(renderer) = state.renderers.get(&project) else {
        tracing::debug!(%project, "renderer not ready, serving interim page");
        return Ok(Some(
            (
                [(header::CACHE_CONTROL, "no-cache")],
                Html(pages::interim(project.as_str())),
            )
                .into_response(),
        ));
    };

    let html = renderer
        .render(&RenderContext::new(url))
        .await
        .map_err(|e| DevError::Render {
            project: project.to_string(),
            message: e.to_string(),
        })?;
    Ok(Some(Html(html).into_response()))
}

fn serve_ssr_asset(state: &SharedState, rest: &str) -> Option<Response> {
    let path = state.ssr_asset_path(rest);
    state
        .ssr_store
        .read_file(&path)
        .map(|content| asset_response(&path, content))
}

fn subscribe_hot(state: &SharedState, class: ProjectClass, rest: &str) -> Response {
    let unit = resolve(rest, state.root_for(class)).and_then(|project| {
        let key = ProjectKey::new(class, project);
        state.hot_unit(&key).map(|unit| (key, unit))
    });

    let stream = match unit {
        Some((key, unit)) => state.hot.subscribe(&key, &unit),
        None => {
            tracing::debug!(path = rest, "no unit for hot subscriber, sending reload");
            HotHub::reload_stream()
        }
    };
    state.hot.response(stream)
}

/// Static directory, favicon, `/` redirect, 404.
async fn passthrough(state: &SharedState, path: &str, request: Request) -> Response {
    let readable = matches!(*request.method(), Method::GET | Method::HEAD);
    if let (Some(dir), true) = (&state.config.static_dir, readable) {
        let Ok(response) = ServeDir::new(dir).oneshot(request).await;
        if response.status() != StatusCode::NOT_FOUND {
            return response.into_response();
        }
    }

    if path == "/favicon.ico" {
        return match tokio::fs::read(state.config.root.join("favicon.ico")).await {
            Ok(icon) => ([(header::CONTENT_TYPE, "image/x-icon")], icon).into_response(),
            Err(_) => StatusCode::NO_CONTENT.into_response(),
        };
    }

    if path == "/" {
        let target = format!(
            "/{}/{}",
            state.config.ssr_url_prefix,
            state.config.default_project.trim_matches('/')
        );
        return (StatusCode::FOUND, [(header::LOCATION, target)]).into_response();
    }

    DevError::NotFound(path.to_string()).into_response()
}
