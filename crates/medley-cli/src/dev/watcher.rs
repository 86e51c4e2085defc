//! File system watcher feeding compilation units.
//!
//! One watcher covers every source directory of a unit. Changes under
//! dependency folders, log files, hidden paths and the configured ignore
//! patterns are filtered out before they reach the unit; the unit itself
//! debounces what remains.

use crate::error::{CliError, Result};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// File change event type.
#[derive(Debug, Clone)]
pub enum FileChange {
    /// File was modified
    Modified(PathBuf),
    /// File was created
    Created(PathBuf),
    /// File was removed
    Removed(PathBuf),
}

impl FileChange {
    /// Get the path affected by this change.
    pub fn path(&self) -> &Path {
        match self {
            FileChange::Modified(p) | FileChange::Created(p) | FileChange::Removed(p) => p,
        }
    }
}

/// Recursive watcher over a set of roots.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    roots: Vec<PathBuf>,
}

impl FileWatcher {
    /// Start watching `roots` recursively.
    ///
    /// # Errors
    ///
    /// Returns an error if a root does not exist or the platform watcher
    /// cannot be created.
    pub fn new(
        roots: &[PathBuf],
        ignore_patterns: Vec<String>,
    ) -> Result<(Self, mpsc::Receiver<FileChange>)> {
        if let Some(missing) = roots.iter().find(|root| !root.exists()) {
            return Err(CliError::FileNotFound(missing.clone()));
        }

        let (tx, rx) = mpsc::channel(100);
        let watched = roots.to_vec();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let Ok(event) = res else {
                return;
            };
            for path in &event.paths {
                let Some(root) = watched.iter().find(|root| path.starts_with(root)) else {
                    continue;
                };
                if Self::should_ignore(path, root, &ignore_patterns) {
                    continue;
                }

                let change = match event.kind {
                    notify::EventKind::Create(_) => FileChange::Created(path.clone()),
                    notify::EventKind::Modify(_) => FileChange::Modified(path.clone()),
                    notify::EventKind::Remove(_) => FileChange::Removed(path.clone()),
                    _ => continue,
                };

                // A full channel already has a rebuild pending.
                let _ = tx.try_send(change);
            }
        })?;

        for root in roots {
            watcher.watch(root, RecursiveMode::Recursive)?;
        }

        Ok((
            Self {
                _watcher: watcher,
                roots: roots.to_vec(),
            },
            rx,
        ))
    }

    /// Check if a path should be ignored.
    fn should_ignore(path: &Path, root: &Path, ignore_patterns: &[String]) -> bool {
        let Ok(rel_path) = path.strip_prefix(root) else {
            return true;
        };

        let path_str = rel_path.to_string_lossy();

        for pattern in ignore_patterns {
            if let Some(suffix) = pattern.strip_prefix('*') {
                if path_str.ends_with(suffix) {
                    return true;
                }
            } else if path_str.starts_with(pattern.as_str())
                || path_str.contains(&format!("/{}", pattern))
            {
                return true;
            }
        }

        rel_path.components().any(|component| {
            component
                .as_os_str()
                .to_str()
                .is_some_and(|name| name.starts_with('.') && name != "." && name != "..")
        })
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}
