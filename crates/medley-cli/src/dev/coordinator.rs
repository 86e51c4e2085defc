//! Pairs the client and server builds of an SSR project.
//!
//! Each SSR project has two slots, one per role. An emit fills its slot from
//! the output store. Once both slots are filled every emit, from either role,
//! re-reads the page template and publishes a fresh renderer:
//!
//! ```text
//! NoBundles -> Partial(client|server) -> Complete -> Complete ...
//! ```
//!
//! The two units are not ordered against each other, so a new server bundle
//! can briefly be paired with the previous manifest (or the other way round)
//! until the second emit lands.

use async_trait::async_trait;
use dashmap::DashMap;
use medley_config::{BuildConfig, OutputOptions, Role, SsrSettings};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::error::DevError;
use super::renderer::{
    ClientManifest, RenderOptions, RendererCache, RendererFactory, ServerBundle,
};
use super::resolver::ProjectIdentity;
use super::store::MemoryFs;
use super::unit::{EmitHook, UnitKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairState {
    NoBundles,
    /// Only the given role has emitted.
    Partial(Role),
    Complete,
}

#[derive(Default)]
struct Slots {
    server: Option<ServerBundle>,
    client: Option<ClientManifest>,
}

impl Slots {
    fn state(&self) -> PairState {
        match (&self.client, &self.server) {
            (None, None) => PairState::NoBundles,
            (Some(_), None) => PairState::Partial(Role::Client),
            (None, Some(_)) => PairState::Partial(Role::Server),
            (Some(_), Some(_)) => PairState::Complete,
        }
    }
}

pub struct BuildCoordinator {
    store: Arc<MemoryFs>,
    renderers: Arc<RendererCache>,
    factory: Arc<dyn RendererFactory>,
    ssr_root: PathBuf,
    settings: SsrSettings,
    options: RenderOptions,
    slots: DashMap<ProjectIdentity, Arc<Mutex<Slots>>>,
}

impl BuildCoordinator {
    pub fn new(
        store: Arc<MemoryFs>,
        renderers: Arc<RendererCache>,
        factory: Arc<dyn RendererFactory>,
        ssr_root: PathBuf,
        settings: SsrSettings,
    ) -> Self {
        Self {
            store,
            renderers,
            factory,
            ssr_root,
            settings,
            options: RenderOptions::default(),
            slots: DashMap::new(),
        }
    }

    /// Store path of the artifact `role` contributes to the pair, inside the
    /// emitting unit's output directory.
    pub fn artifact_path(&self, output: &OutputOptions, role: Role) -> Option<String> {
        match role {
            Role::Server => Some(output.join(&self.settings.server_bundle)),
            Role::Client => Some(output.join(&self.settings.client_manifest)),
            Role::Site => None,
        }
    }

    pub fn template_path(&self, project: &ProjectIdentity) -> PathBuf {
        self.ssr_root.join(project.as_str()).join(&self.settings.template)
    }

    fn slots_for(&self, project: &ProjectIdentity) -> Arc<Mutex<Slots>> {
        self.slots.entry(project.clone()).or_default().clone()
    }

    /// Record an emit of `role` for `project`, whose assets were written
    /// under `output`, and reassemble when both slots are filled.
    ///
    /// On error the slots and the published renderer are left as they were.
    pub async fn on_emit(
        &self,
        project: &ProjectIdentity,
        role: Role,
        output: &OutputOptions,
    ) -> Result<PairState, DevError> {
        let path = self
            .artifact_path(output, role)
            .ok_or_else(|| DevError::Internal(format!("'{role}' builds are not paired")))?;
        let slots = self.slots_for(project);
        let mut slots = slots.lock().await;

        let raw = self.store.read_file(&path).ok_or_else(|| DevError::MissingBundle {
            project: project.to_string(),
            path: path.clone(),
        })?;
        let invalid = |e: serde_json::Error| DevError::InvalidBundle {
            project: project.to_string(),
            path: path.clone(),
            message: e.to_string(),
        };

        let mut next_server = slots.server.clone();
        let mut next_client = slots.client.clone();
        match role {
            Role::Server => next_server = Some(serde_json::from_slice(&raw).map_err(invalid)?),
            _ => next_client = Some(serde_json::from_slice(&raw).map_err(invalid)?),
        }

        if let (Some(bundle), Some(manifest)) = (&next_server, &next_client) {
            let template_path = self.template_path(project);
            let template = match tokio::fs::read_to_string(&template_path).await {
                Ok(template) => template,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(DevError::MissingTemplate(template_path));
                }
                Err(e) => {
                    return Err(DevError::Internal(format!(
                        "failed to read {}: {e}",
                        template_path.display()
                    )));
                }
            };

            let renderer = self
                .factory
                .assemble(bundle.clone(), manifest.clone(), template, &self.options)
                .map_err(|e| DevError::Render {
                    project: project.to_string(),
                    message: e.to_string(),
                })?;
            let generation = self.renderers.insert(project.clone(), renderer);
            tracing::info!(%project, trigger = %role, generation, "renderer assembled");
        }

        slots.server = next_server;
        slots.client = next_client;
        Ok(slots.state())
    }

    pub async fn state(&self, project: &ProjectIdentity) -> PairState {
        match self.slots.get(project).map(|s| s.clone()) {
            Some(slots) => slots.lock().await.state(),
            None => PairState::NoBundles,
        }
    }

    /// Drop both slots of `project`.
    pub fn forget(&self, project: &ProjectIdentity) {
        self.slots.remove(project);
    }
}

#[async_trait]
impl EmitHook for BuildCoordinator {
    async fn after_emit(&self, key: &UnitKey, config: &BuildConfig) {
        match self.on_emit(&key.project, key.role, &config.output).await {
            Ok(state) => tracing::debug!(unit = %key, ?state, "emit recorded"),
            Err(e) => tracing::error!(unit = %key, error = %e, "renderer not assembled"),
        }
    }
}
