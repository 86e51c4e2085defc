//! Per-request failures of the dev server.
//!
//! A [`DevError`] never stops the process. Handlers return it and axum turns
//! it into a response through [`IntoResponse`].

use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use medley_config::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

use super::bundler::BuildFailure;
use super::pages;

#[derive(Debug, Error)]
pub enum DevError {
    #[error("not found: {0}")]
    NotFound(String),

    /// A site request raced the first build of its project.
    #[error("project '{project}' is compiling, please refresh")]
    BuildInFlight { project: String },

    #[error("build failed: {0}")]
    Build(#[from] BuildFailure),

    #[error("failed to render '{project}': {message}")]
    Render { project: String, message: String },

    #[error("page template not found: {}", .0.display())]
    MissingTemplate(PathBuf),

    #[error("bundle for '{project}' not found in the output store: {path}")]
    MissingBundle { project: String, path: String },

    #[error("bundle for '{project}' at {path} is not valid: {message}")]
    InvalidBundle {
        project: String,
        path: String,
        message: String,
    },

    /// The `/api` upstream could not be reached.
    #[error("proxy to {target} failed: {message}")]
    Proxy { target: String, message: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Internal(String),
}

impl DevError {
    pub fn status(&self) -> StatusCode {
        match self {
            DevError::NotFound(_) => StatusCode::NOT_FOUND,
            DevError::BuildInFlight { .. } => StatusCode::OK,
            DevError::Proxy { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn heading(&self) -> &'static str {
        match self {
            DevError::Build(_) => "Build failed",
            DevError::Render { .. } => "Render failed",
            DevError::MissingTemplate(_) => "Page template missing",
            DevError::MissingBundle { .. } => "Bundle missing",
            DevError::InvalidBundle { .. } => "Invalid bundle",
            DevError::Proxy { .. } => "Bad gateway",
            DevError::Config(_) => "Invalid build configuration",
            _ => "Internal error",
        }
    }
}

impl IntoResponse for DevError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            DevError::NotFound(path) => (status, Html(pages::not_found(path))).into_response(),
            DevError::BuildInFlight { .. } => (
                status,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                self.to_string(),
            )
                .into_response(),
            _ => {
                tracing::error!(error = %self, "request failed");
                (status, Html(pages::error(self.heading(), &self.to_string()))).into_response()
            }
        }
    }
}
