//! Shared dev server state.
//!
//! One [`DevState`] lives for the whole process and is handed to every
//! request as [`SharedState`]. It owns the two output stores, the unit
//! registry, the renderer cache, the build coordinator and the hot hub, and
//! knows how to create the units a request needs.

use medley_config::{BuildConfig, BuildParams, Role, ServerConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::bundler::Bundler;
use super::coordinator::BuildCoordinator;
use super::error::DevError;
use super::hot::HotHub;
use super::proxy::ApiProxy;
use super::registry::{CompilerRegistry, ProjectClass, ProjectKey};
use super::renderer::{BundleRendererFactory, RendererCache, RendererFactory};
use super::resolver::{resolve, ProjectIdentity};
use super::store::MemoryFs;
use super::unit::{CompilationUnit, EmitHook, UnitKey, UnitSpec, WatchOptions};

/// Entry name every SSR unit builds under.
const SSR_ENTRY_NAME: &str = "app";

pub struct DevState {
    pub config: Arc<ServerConfig>,
    /// Output of site units, laid out as `/{project}/...`.
    pub site_store: Arc<MemoryFs>,
    /// Output of SSR units, laid out as `/client/{project}/...` and
    /// `/server/{project}/...`.
    pub ssr_store: Arc<MemoryFs>,
    pub registry: CompilerRegistry,
    pub renderers: Arc<RendererCache>,
    pub coordinator: Arc<BuildCoordinator>,
    pub hot: HotHub,
    /// Forwards `/{api_prefix}/...` when `base_url` is set.
    pub proxy: Option<ApiProxy>,
    bundler: Arc<dyn Bundler>,
    watch: bool,
}

/// Shared state handle passed to every request.
pub type SharedState = Arc<DevState>;

impl DevState {
    pub fn new(config: ServerConfig, bundler: Arc<dyn Bundler>) -> Self {
        Self::with_factory(config, bundler, Arc::new(BundleRendererFactory))
    }

    pub fn with_factory(
        config: ServerConfig,
        bundler: Arc<dyn Bundler>,
        factory: Arc<dyn RendererFactory>,
    ) -> Self {
        let ssr_store = Arc::new(MemoryFs::new());
        let renderers = Arc::new(RendererCache::new());
        let coordinator = Arc::new(BuildCoordinator::new(
            ssr_store.clone(),
            renderers.clone(),
            factory,
            config.ssr_root.clone(),
            config.ssr.clone(),
        ));
        let hot = HotHub::new(Duration::from_millis(config.heartbeat_ms));
        let proxy = config
            .base_url
            .as_deref()
            .map(|base_url| ApiProxy::new(base_url, config.auth.as_deref()));

        Self {
            config: Arc::new(config),
            site_store: Arc::new(MemoryFs::new()),
            ssr_store,
            registry: CompilerRegistry::new(),
            renderers,
            coordinator,
            hot,
            proxy,
            bundler,
            watch: true,
        }
    }

    /// Turn off file watching for units created from now on.
    pub fn without_watching(mut self) -> Self {
        self.watch = false;
        self
    }

    pub fn into_shared(self) -> SharedState {
        Arc::new(self)
    }

    fn watch_options(&self) -> Option<WatchOptions> {
        self.watch.then(|| WatchOptions {
            ignore: self.config.watch_ignore.clone(),
            debounce: Duration::from_millis(self.config.debounce_ms),
        })
    }

    pub fn root_for(&self, class: ProjectClass) -> &Path {
        match class {
            ProjectClass::Site => &self.config.site_root,
            ProjectClass::Ssr => &self.config.ssr_root,
        }
    }

    /// The unit that feeds hot events for a project, if it exists. SSR pages
    /// follow their client build.
    pub fn hot_unit(&self, project: &ProjectKey) -> Option<Arc<CompilationUnit>> {
        let role = match project.class {
            ProjectClass::Site => Role::Site,
            ProjectClass::Ssr => Role::Client,
        };
        self.registry.get(&project.unit(role))
    }

    /// Get or create the site unit of `project`, building `entry_path`.
    ///
    /// `created` is true only for the request whose call created the unit.
    pub fn ensure_site_unit(
        &self,
        project: &ProjectIdentity,
        entry_path: &Path,
    ) -> Result<(Arc<CompilationUnit>, bool), DevError> {
        let key = UnitKey::new(project.clone(), Role::Site);
        if let Some(unit) = self.registry.get(&key) {
            self.registry.touch(&key.project_key());
            return Ok((unit, false));
        }

        let entry_name = entry_path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| DevError::NotFound(entry_path.display().to_string()))?
            .to_string();
        let params = BuildParams {
            entry_name,
            entry_path: entry_path.display().to_string(),
            project_name: project.to_string(),
        };
        let entry_dir = entry_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config.site_root.join(project.as_str()));

        let result = self.registry.get_or_create(key, |key| {
            self.spawn_unit(key, &params, &entry_dir, Vec::new(), self.site_store.clone())
        })?;
        if result.1 {
            self.evict_beyond_limit(&result.0.key().project_key());
        }
        Ok(result)
    }

    /// Get or create both units of an SSR project.
    pub fn ensure_ssr_units(&self, project: &ProjectIdentity) -> Result<bool, DevError> {
        let project_dir = self.config.ssr_root.join(project.as_str());
        let mut created = false;

        for role in ProjectClass::Ssr.roles() {
            let entry = match role {
                Role::Server => &self.config.ssr.server_entry,
                _ => &self.config.ssr.client_entry,
            };
            let params = BuildParams {
                entry_name: SSR_ENTRY_NAME.to_string(),
                entry_path: project_dir.join(entry).display().to_string(),
                project_name: project.to_string(),
            };
            let hooks: Vec<Arc<dyn EmitHook>> = vec![self.coordinator.clone()];

            let (_, fresh) = self
                .registry
                .get_or_create(UnitKey::new(project.clone(), *role), |key| {
                    self.spawn_unit(key, &params, &project_dir, hooks, self.ssr_store.clone())
                })?;
            created |= fresh;
        }

        if created {
            self.evict_beyond_limit(&ProjectKey::new(ProjectClass::Ssr, project.clone()));
        }
        Ok(created)
    }

    fn spawn_unit(
        &self,
        key: &UnitKey,
        params: &BuildParams,
        entry_dir: &Path,
        hooks: Vec<Arc<dyn EmitHook>>,
        store: Arc<MemoryFs>,
    ) -> Result<Arc<CompilationUnit>, DevError> {
        let config = BuildConfig::resolve(key.role, params, &self.config, entry_dir)?;
        Ok(CompilationUnit::spawn(
            UnitSpec {
                key: key.clone(),
                config,
                store,
                hooks,
                watch: self.watch_options(),
            },
            self.bundler.clone(),
        ))
    }

    fn evict_beyond_limit(&self, keep: &ProjectKey) {
        let Some(max) = self.config.max_projects else {
            return;
        };
        for victim in self.registry.lru_victims(max, keep) {
            self.evict(&victim);
        }
    }

    /// Drop everything held for `project`: units, store files, renderer,
    /// pairing slots and hot notifier.
    ///
    /// Only files the project's own units emitted are removed, so a nested
    /// project such as `bar/qux` keeps its output when `bar` is evicted.
    pub fn evict(&self, project: &ProjectKey) {
        let units = self.registry.remove_project(project);
        let files: usize = units.iter().map(|unit| unit.remove_outputs()).sum();
        if project.class == ProjectClass::Ssr {
            self.renderers.remove(&project.project);
            self.coordinator.forget(&project.project);
        }
        self.hot.remove(project);
        tracing::info!(%project, units = units.len(), files, "project evicted");
    }

    /// Store path for a client asset of an SSR project. `rest` is the part of
    /// the URL after the SSR asset prefix. The client unit's output directory
    /// is used when the project has one, otherwise `/client{rest}`.
    pub fn ssr_asset_path(&self, rest: &str) -> String {
        let from_unit = resolve(rest, &self.config.ssr_root).and_then(|project| {
            let unit = self
                .registry
                .get(&UnitKey::new(project.clone(), Role::Client))?;
            let file = rest.trim_start_matches('/').strip_prefix(project.as_str())?;
            Some(unit.config().output.join(file))
        });
        from_unit.unwrap_or_else(|| format!("/client{}", rest))
    }

    /// Site entry file for a request path below the site prefix.
    pub fn site_entry(&self, rest: &str) -> PathBuf {
        self.config.site_root.join(rest.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dev::testing::ScriptedBundler;
    use tempfile::TempDir;

    fn state(dir: &TempDir, max_projects: Option<usize>) -> DevState {
        let config = ServerConfig {
            site_root: dir.path().join("site"),
            ssr_root: dir.path().join("ssr"),
            max_projects,
            ..ServerConfig::default()
        };
        DevState::new(config, Arc::new(ScriptedBundler::echo())).without_watching()
    }

    #[tokio::test]
    async fn site_unit_is_named_after_the_requested_file() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir, None);
        let project = ProjectIdentity::new("foo");

        let (unit, created) = state
            .ensure_site_unit(&project, &state.site_entry("/foo/index.js"))
            .unwrap();
        assert!(created);
        assert_eq!(unit.primary_output().as_deref(), Some("/foo/index.js"));

        let (again, created) = state
            .ensure_site_unit(&project, &state.site_entry("/foo/other.js"))
            .unwrap();
        assert!(!created);
        assert!(Arc::ptr_eq(&unit, &again));
    }

    #[tokio::test]
    async fn ssr_units_are_created_once() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir, None);
        let project = ProjectIdentity::new("hello/world");

        assert!(state.ensure_ssr_units(&project).unwrap());
        assert!(!state.ensure_ssr_units(&project).unwrap());
        assert_eq!(state.registry.len(), 2);
        assert!(state
            .hot_unit(&ProjectKey::new(ProjectClass::Ssr, project))
            .is_some());
    }

    #[tokio::test]
    async fn limit_evicts_least_recent_project() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir, Some(1));
        let a = ProjectIdentity::new("a");
        let b = ProjectIdentity::new("b");

        let (unit_a, _) = state.ensure_site_unit(&a, &state.site_entry("/a/index.js")).unwrap();
        unit_a.wait_for_build(0).await;
        assert!(state.site_store.exists("/a/index.js"));

        state.ensure_site_unit(&b, &state.site_entry("/b/index.js")).unwrap();

        assert!(!state.registry.contains(&UnitKey::new(a, Role::Site)));
        assert!(!state.site_store.exists("/a/index.js"));
        assert_eq!(state.registry.len(), 1);
    }

    #[tokio::test]
    async fn eviction_keeps_output_of_nested_project() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir, Some(2));
        let bar = ProjectIdentity::new("bar");
        let qux = ProjectIdentity::new("bar/qux");

        for (project, path) in [(&bar, "/bar/index.js"), (&qux, "/bar/qux/index.js")] {
            let (unit, _) = state.ensure_site_unit(project, &state.site_entry(path)).unwrap();
            unit.wait_for_build(0).await;
        }
        state
            .ensure_site_unit(&ProjectIdentity::new("foo"), &state.site_entry("/foo/index.js"))
            .unwrap();

        assert!(!state.registry.contains(&UnitKey::new(bar, Role::Site)));
        assert!(!state.site_store.exists("/bar/index.js"));
        assert!(state.registry.contains(&UnitKey::new(qux, Role::Site)));
        assert!(state.site_store.exists("/bar/qux/index.js"));
    }
}
