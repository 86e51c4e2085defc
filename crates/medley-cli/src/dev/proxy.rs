//! Forwarding of `/{api_prefix}/...` to the backend at `base_url`.
//!
//! The request path and query are appended to `base_url` unchanged, so
//! `/api/users?page=2` goes to `{base_url}/api/users?page=2`. The upstream
//! sees its own `Host`, and `auth` (`user:password`) is sent as basic auth.
//! Bodies are buffered and forwarded byte for byte.

use axum::body::{to_bytes, Body};
use axum::extract::Request;
use axum::http::{HeaderMap, HeaderName};
use axum::response::Response;

use super::error::DevError;

/// Largest request body the proxy will buffer.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ApiProxy {
    client: reqwest::Client,
    base_url: String,
    auth: Option<(String, Option<String>)>,
}

impl ApiProxy {
    pub fn new(base_url: &str, auth: Option<&str>) -> Self {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        let auth = auth
            .filter(|credentials| !credentials.is_empty())
            .map(|credentials| match credentials.split_once(':') {
                Some((user, password)) => (user.to_string(), Some(password.to_string())),
                None => (credentials.to_string(), None),
            });

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        }
    }

    /// Upstream URL for a request's path and query.
    pub fn target_for(&self, path_and_query: &str) -> String {
        format!("{}{}", self.base_url, path_and_query)
    }

    pub async fn forward(&self, request: Request) -> Result<Response, DevError> {
        let (parts, body) = request.into_parts();
        let path_and_query = parts
            .uri
            .path_and_query()
            .map_or_else(|| parts.uri.path(), |pq| pq.as_str());
        let target = self.target_for(path_and_query);
        let failed = |message: String| DevError::Proxy {
            target: target.clone(),
            message,
        };

        let body = to_bytes(body, MAX_BODY_BYTES)
            .await
            .map_err(|e| failed(format!("failed to read request body: {e}")))?;

        let mut upstream = self
            .client
            .request(parts.method.clone(), &target)
            .headers(forwardable(&parts.headers));
        if let Some((user, password)) = &self.auth {
            upstream = upstream.basic_auth(user, password.as_ref());
        }
        if !body.is_empty() {
            upstream = upstream.body(body);
        }

        let response = upstream.send().await.map_err(|e| failed(e.to_string()))?;
        let status = response.status();
        tracing::debug!(method = %parts.method, %target, %status, "api request proxied");

        let mut builder = Response::builder().status(status);
        if let Some(headers) = builder.headers_mut() {
            headers.extend(forwardable(response.headers()));
        }
        let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;
        builder
            .body(Body::from(bytes))
            .map_err(|e| DevError::Internal(e.to_string()))
    }
}

/// Headers that describe one hop and are rebuilt on the next.
fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "host"
            | "content-length"
            | "transfer-encoding"
            | "te"
            | "trailer"
            | "upgrade"
            | "proxy-connection"
    )
}

fn forwardable(headers: &HeaderMap) -> HeaderMap {
    headers
        .iter()
        .filter(|(name, _)| !is_hop_by_hop(name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}
