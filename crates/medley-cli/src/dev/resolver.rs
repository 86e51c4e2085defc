//! Maps a URL path to the project that owns it.
//!
//! A project is any directory nesting under a root. For
//! `/hello/world/index.js` under `src/site`, the resolver probes
//! `src/site/hello`, then `src/site/hello/world`, then
//! `src/site/hello/world/index.js`, and returns the longest prefix that is a
//! directory (`hello/world`).

use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Path of a project relative to its root, e.g. `hello/world`.
///
/// Cheap to clone; the only key used by the registry, the stores, the renderer
/// cache and the hot-reload hub.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ProjectIdentity(Arc<str>);

impl ProjectIdentity {
    pub fn new(path: impl AsRef<str>) -> Self {
        Self(Arc::from(path.as_ref().trim_matches('/')))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ProjectIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Longest directory prefix of `url_path` under `root`.
///
/// Returns `None` for `/`, for paths with fewer than two `/`-separated parts,
/// and when not even the first segment is a directory. Probing stops at the
/// first empty, `.` or `..` segment, so the result never escapes `root`.
/// Filesystem errors count as "not a directory". Nothing is cached.
pub fn resolve(url_path: &str, root: &Path) -> Option<ProjectIdentity> {
    if url_path == "/" {
        return None;
    }

    let segments: Vec<&str> = url_path.split('/').collect();
    if segments.len() < 2 {
        return None;
    }

    let mut dir = root.to_path_buf();
    let mut matched = 0;

    for segment in &segments[1..] {
        if segment.is_empty() || *segment == "." || *segment == ".." {
            break;
        }
        dir.push(segment);
        if !dir.is_dir() {
            break;
        }
        matched += 1;
    }

    if matched == 0 {
        return None;
    }

    Some(ProjectIdentity::new(segments[1..=matched].join("/")))
}
