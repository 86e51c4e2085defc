//! Compilation units: one watching build per `(project, role)`.
//!
//! A unit is a background task. It builds once on creation, writes the
//! emitted assets into its output store, runs its emit hooks, and then waits
//! for a file change or an explicit [`CompilationUnit::invalidate`] to build
//! again. Builds inside one unit never overlap, so emits are observed in the
//! order the builds complete.
//!
//! A failed build leaves the previous output in the store untouched.

use async_trait::async_trait;
use medley_config::{BuildConfig, Role};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use super::bundler::Bundler;
use super::hot::{BuildSummary, HotEvent};
use super::resolver::ProjectIdentity;
use super::store::MemoryFs;
use super::watcher::{FileChange, FileWatcher};
use crate::ui;

/// Build status tracking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildStatus {
    /// No build has been performed yet
    NotStarted,
    /// Build is currently in progress
    InProgress { started_at: Instant },
    /// Build completed successfully
    Success { duration_ms: u64 },
    /// Build failed with error
    Failed { error: String },
}

impl BuildStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, BuildStatus::Success { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            BuildStatus::Failed { error } => Some(error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnitKey {
    pub project: ProjectIdentity,
    pub role: Role,
}

impl UnitKey {
    pub fn new(project: ProjectIdentity, role: Role) -> Self {
        Self { project, role }
    }
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.project, self.role)
    }
}

/// Runs after a unit's assets have been written to the store and before the
/// build is reported as finished. `config` is the unit's merged build config,
/// so `config.output` says where the assets landed.
#[async_trait]
pub trait EmitHook: Send + Sync {
    async fn after_emit(&self, key: &UnitKey, config: &BuildConfig);
}

#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub ignore: Vec<String>,
    pub debounce: Duration,
}

/// Everything needed to start a unit.
pub struct UnitSpec {
    pub key: UnitKey,
    pub config: BuildConfig,
    pub store: Arc<MemoryFs>,
    pub hooks: Vec<Arc<dyn EmitHook>>,
    /// `None` disables file watching; the unit then only rebuilds on
    /// [`CompilationUnit::invalidate`].
    pub watch: Option<WatchOptions>,
}

struct UnitShared {
    key: UnitKey,
    config: BuildConfig,
    store: Arc<MemoryFs>,
    hooks: Vec<Arc<dyn EmitHook>>,
    bundler: Arc<dyn Bundler>,
    status: RwLock<BuildStatus>,
    last: RwLock<Option<BuildSummary>>,
    /// Store paths this unit has written, across all of its builds.
    emitted: RwLock<BTreeSet<String>>,
    events: broadcast::Sender<HotEvent>,
    completed: watch::Sender<u64>,
}

pub struct CompilationUnit {
    shared: Arc<UnitShared>,
    rebuild: mpsc::Sender<()>,
    task: JoinHandle<()>,
    _watcher: Mutex<Option<FileWatcher>>,
}

impl CompilationUnit {
    /// Start the unit's build task. Must be called inside a tokio runtime.
    pub fn spawn(spec: UnitSpec, bundler: Arc<dyn Bundler>) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        let (completed, _) = watch::channel(0);
        let (rebuild, rebuild_rx) = mpsc::channel(8);

        let (watcher, changes, debounce) = match &spec.watch {
            Some(options) => {
                let roots = bundler.watch_roots(&spec.config);
                match FileWatcher::new(&roots, options.ignore.clone()) {
                    Ok((watcher, rx)) => (Some(watcher), Some(rx), options.debounce),
                    Err(e) => {
                        tracing::warn!(unit = %spec.key, error = %e, "file watching disabled");
                        (None, None, options.debounce)
                    }
                }
            }
            None => (None, None, Duration::ZERO),
        };

        let shared = Arc::new(UnitShared {
            key: spec.key,
            config: spec.config,
            store: spec.store,
            hooks: spec.hooks,
            bundler,
            status: RwLock::new(BuildStatus::NotStarted),
            last: RwLock::new(None),
            emitted: RwLock::new(BTreeSet::new()),
            events,
            completed,
        });

        tracing::info!(unit = %shared.key, output = %shared.config.output.path, "compilation unit created");

        let task = tokio::spawn(run(shared.clone(), rebuild_rx, changes, debounce));

        Arc::new(Self {
            shared,
            rebuild,
            task,
            _watcher: Mutex::new(watcher),
        })
    }

    pub fn key(&self) -> &UnitKey {
        &self.shared.key
    }

    pub fn config(&self) -> &BuildConfig {
        &self.shared.config
    }

    pub fn status(&self) -> BuildStatus {
        self.shared.status.read().clone()
    }

    /// Summary of the most recent finished build.
    pub fn last_build(&self) -> Option<BuildSummary> {
        self.shared.last.read().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HotEvent> {
        self.shared.events.subscribe()
    }

    /// Request a rebuild. Requests made while a build runs coalesce into one.
    pub fn invalidate(&self) {
        let _ = self.rebuild.try_send(());
    }

    /// Wait until more than `after` builds have finished; returns the new count.
    pub async fn wait_for_build(&self, after: u64) -> u64 {
        let mut rx = self.shared.completed.subscribe();
        let count = match rx.wait_for(|count| *count > after).await {
            Ok(count) => *count,
            Err(_) => after,
        };
        count
    }

    /// Store paths written by this unit so far.
    pub fn emitted_paths(&self) -> Vec<String> {
        self.shared.emitted.read().iter().cloned().collect()
    }

    /// Delete everything this unit wrote from its store. Files of other
    /// units, including projects nested below this one, are left alone.
    pub fn remove_outputs(&self) -> usize {
        let paths = std::mem::take(&mut *self.shared.emitted.write());
        paths
            .iter()
            .filter(|path| self.shared.store.remove_file(path))
            .count()
    }

    /// Store path of the file emitted for the first entry.
    pub fn primary_output(&self) -> Option<String> {
        let config = &self.shared.config;
        config
            .primary_entry()
            .map(|entry| config.output.join(&config.output.file_for(entry)))
    }
}

impl Drop for CompilationUnit {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    shared: Arc<UnitShared>,
    mut rebuild_rx: mpsc::Receiver<()>,
    mut changes: Option<mpsc::Receiver<FileChange>>,
    debounce: Duration,
) {
    loop {
        shared.build_once().await;

        tokio::select! {
            request = rebuild_rx.recv() => {
                if request.is_none() {
                    break;
                }
            }
            Some(change) = next_change(&mut changes) => {
                tracing::debug!(unit = %shared.key, path = %change.path().display(), "source changed");
                tokio::time::sleep(debounce).await;
                if let Some(rx) = changes.as_mut() {
                    while rx.try_recv().is_ok() {}
                }
            }
        }

        while rebuild_rx.try_recv().is_ok() {}
    }
}

async fn next_change(changes: &mut Option<mpsc::Receiver<FileChange>>) -> Option<FileChange> {
    match changes {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

impl UnitShared {
    async fn build_once(&self) {
        let name = self.key.role.to_string();
        *self.status.write() = BuildStatus::InProgress {
            started_at: Instant::now(),
        };
        let _ = self.events.send(HotEvent::Building { name: name.clone() });
        tracing::debug!(unit = %self.key, "build started");

        let started = Instant::now();
        let result = self.bundler.build(&self.config).await;
        let duration_ms = started.elapsed().as_millis() as u64;
        let generation = *self.completed.borrow() + 1;

        let (errors, warnings) = match result {
            Ok(emit) => {
                let files = emit.assets.len();
                for (path, content) in emit.assets {
                    let target = self.config.output.join(&path);
                    self.store.write_file(&target, content);
                    self.emitted.write().insert(target);
                }
                for hook in &self.hooks {
                    hook.after_emit(&self.key, &self.config).await;
                }
                *self.status.write() = BuildStatus::Success { duration_ms };
                tracing::info!(unit = %self.key, files, duration_ms, "build finished");
                (Vec::new(), emit.warnings)
            }
            Err(failure) => {
                *self.status.write() = BuildStatus::Failed {
                    error: failure.to_string(),
                };
                tracing::warn!(unit = %self.key, duration_ms, errors = failure.errors.len(), "build failed");
                (failure.errors, Vec::new())
            }
        };

        ui::print_build_summary(
            self.key.project.as_str(),
            self.key.role.as_str(),
            duration_ms,
            &errors,
            &warnings,
        );

        let summary = BuildSummary {
            name,
            time: duration_ms,
            hash: format!("{}-{}", self.key.role, generation),
            errors,
            warnings,
        };
        *self.last.write() = Some(summary.clone());
        let _ = self.events.send(HotEvent::Built(summary));
        self.completed.send_replace(generation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dev::bundler::{BuildFailure, Emit};
    use crate::dev::testing::ScriptedBundler;
    use medley_config::{BuildParams, ServerConfig};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn spec(store: Arc<MemoryFs>, hooks: Vec<Arc<dyn EmitHook>>) -> UnitSpec {
        let params = BuildParams {
            entry_name: "index".to_string(),
            entry_path: "/srv/site/foo/index.js".to_string(),
            project_name: "foo".to_string(),
        };
        UnitSpec {
            key: UnitKey::new(ProjectIdentity::new("foo"), Role::Site),
            config: BuildConfig::preset(Role::Site, &params, &ServerConfig::default()),
            store,
            hooks,
            watch: None,
        }
    }

    struct CountingHook(AtomicUsize);

    #[async_trait]
    impl EmitHook for CountingHook {
        async fn after_emit(&self, _key: &UnitKey, _config: &BuildConfig) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn first_build_writes_store_and_runs_hooks() {
        let store = Arc::new(MemoryFs::new());
        let hook = Arc::new(CountingHook(AtomicUsize::new(0)));
        let unit = CompilationUnit::spawn(
            spec(store.clone(), vec![hook.clone()]),
            Arc::new(ScriptedBundler::echo()),
        );

        assert_eq!(unit.wait_for_build(0).await, 1);
        assert!(store.exists("/foo/index.js"));
        assert_eq!(unit.primary_output().as_deref(), Some("/foo/index.js"));
        assert_eq!(hook.0.load(Ordering::SeqCst), 1);
        assert!(unit.status().is_success());
        assert_eq!(unit.last_build().unwrap().hash, "site-1");
    }

    #[tokio::test]
    async fn invalidate_rebuilds_in_place() {
        let store = Arc::new(MemoryFs::new());
        let unit = CompilationUnit::spawn(spec(store.clone(), vec![]), Arc::new(ScriptedBundler::echo()));
        unit.wait_for_build(0).await;
        let mut events = unit.subscribe();

        unit.invalidate();
        assert_eq!(unit.wait_for_build(1).await, 2);
        assert_eq!(
            store.read_to_string("/foo/index.js").unwrap(),
            "/* /foo build 1 */"
        );

        assert!(matches!(events.recv().await.unwrap(), HotEvent::Building { .. }));
        assert!(matches!(events.recv().await.unwrap(), HotEvent::Built(_)));
    }

    #[tokio::test]
    async fn failed_build_keeps_previous_output() {
        let store = Arc::new(MemoryFs::new());
        let bundler = ScriptedBundler::new(|config, n| {
            if n == 0 {
                Ok(Emit::new().with_asset(config.output.file_for("index"), "good"))
            } else {
                Err(BuildFailure::new("Unexpected token"))
            }
        });
        let unit = CompilationUnit::spawn(spec(store.clone(), vec![]), Arc::new(bundler));
        unit.wait_for_build(0).await;

        unit.invalidate();
        unit.wait_for_build(1).await;

        assert_eq!(unit.status().error(), Some("Unexpected token"));
        assert_eq!(store.read_to_string("/foo/index.js").unwrap(), "good");
        assert_eq!(unit.last_build().unwrap().errors, vec!["Unexpected token"]);
    }

    #[tokio::test]
    async fn remove_outputs_leaves_nested_projects_alone() {
        let store = Arc::new(MemoryFs::new());
        store.write_file("/foo/nested/index.js", b"written by foo/nested".to_vec());
        let unit = CompilationUnit::spawn(spec(store.clone(), vec![]), Arc::new(ScriptedBundler::echo()));
        unit.wait_for_build(0).await;

        assert_eq!(unit.emitted_paths(), vec!["/foo/index.js".to_string()]);
        assert_eq!(unit.remove_outputs(), 1);
        assert!(!store.exists("/foo/index.js"));
        assert!(store.exists("/foo/nested/index.js"));
        assert!(unit.emitted_paths().is_empty());
    }

    #[test]
    fn build_status_predicates() {
        let status = BuildStatus::InProgress {
            started_at: Instant::now(),
        };
        assert!(!status.is_success());
        assert!(BuildStatus::Success { duration_ms: 3 }.is_success());
        assert!(BuildStatus::NotStarted.error().is_none());
    }
}
