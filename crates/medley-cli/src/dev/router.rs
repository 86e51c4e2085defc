//! URL classification.
//!
//! Every prefix is a single path segment and the prefixes are validated to be
//! distinct, so the first segment alone decides the route.

use medley_config::ServerConfig;

use super::registry::ProjectClass;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route<'a> {
    /// `/{site_entry_prefix}/...`: a file of a site project.
    SiteAsset { rest: &'a str },
    /// `/{ssr_url_prefix}/...`: a page of an SSR project.
    Ssr { rest: &'a str },
    /// `/{ssr_entry_prefix}/...`: a client asset of an SSR project.
    SsrAsset { rest: &'a str },
    /// `/{hmr_prefix}/{site|ssr}/...`: a hot-reload subscription.
    Hot { class: ProjectClass, rest: &'a str },
    /// `/{api_prefix}/...`: forwarded to the backend when one is configured.
    Api,
    Other,
}

impl<'a> Route<'a> {
    /// `rest` keeps its leading `/` and is `/` when nothing follows the prefix.
    pub fn classify(config: &ServerConfig, path: &'a str) -> Self {
        let Some(trimmed) = path.strip_prefix('/') else {
            return Route::Other;
        };
        let (first, rest) = split_segment(trimmed);

        if first == config.site_entry_prefix {
            Route::SiteAsset { rest }
        } else if first == config.ssr_url_prefix {
            Route::Ssr { rest }
        } else if first == config.ssr_entry_prefix {
            Route::SsrAsset { rest }
        } else if first == config.hmr_prefix {
            let (class, rest) = split_segment(rest.trim_start_matches('/'));
            match ProjectClass::parse(class) {
                Some(class) => Route::Hot { class, rest },
                None => Route::Other,
            }
        } else if first == config.api_prefix {
            Route::Api
        } else {
            Route::Other
        }
    }
}

/// Split `a/b/c` into `("a", "/b/c")`; a lone segment yields `("a", "/")`.
fn split_segment(path: &str) -> (&str, &str) {
    match path.find('/') {
        Some(at) => (&path[..at], &path[at..]),
        None => (path, "/"),
    }
}

/// Extensions the site flow compiles on demand. Anything else is left to the
/// static file handler.
pub fn is_compilable(path: &str) -> bool {
    let file = path.rsplit('/').next().unwrap_or(path);
    let Some((_, extension)) = file.rsplit_once('.') else {
        return false;
    };
    ["js", "ts", "json"]
        .iter()
        .any(|known| extension.eq_ignore_ascii_case(known))
}
