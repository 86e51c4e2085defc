//! Deterministic [`Bundler`] for tests.
//!
//! [`ScriptedBundler`] answers every build with a closure instead of running a
//! process. Wrapping it with [`ScriptedBundler::gated`] makes each build wait
//! for an explicit [`BuildGate::release`], so a test can decide exactly when
//! (and in which order) units emit.

use async_trait::async_trait;
use medley_config::BuildConfig;
use serde_json::json;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

use super::bundler::{BuildFailure, Bundler, Emit};

type Script = dyn Fn(&BuildConfig, usize) -> Result<Emit, BuildFailure> + Send + Sync;

pub struct ScriptedBundler {
    script: Box<Script>,
    builds: AtomicUsize,
    gate: Option<Arc<Semaphore>>,
}

/// Lets gated builds finish, one permit per build.
#[derive(Clone)]
pub struct BuildGate(Arc<Semaphore>);

impl BuildGate {
    pub fn release(&self, builds: usize) {
        self.0.add_permits(builds);
    }
}

impl ScriptedBundler {
    /// `script` receives the config and the zero-based build number across
    /// every unit using this bundler.
    pub fn new(
        script: impl Fn(&BuildConfig, usize) -> Result<Emit, BuildFailure> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Box::new(script),
            builds: AtomicUsize::new(0),
            gate: None,
        }
    }

    pub fn gated(mut self) -> (Self, BuildGate) {
        let semaphore = Arc::new(Semaphore::new(0));
        self.gate = Some(semaphore.clone());
        (self, BuildGate(semaphore))
    }

    /// Emits the primary file with a body naming the project path and build
    /// number, for site and SSR units alike. SSR units also get a server
    /// bundle or client manifest whose markup includes the build number.
    pub fn echo() -> Self {
        Self::new(|config, n| Ok(echo_emit(config, n)))
    }
}

#[async_trait]
impl Bundler for ScriptedBundler {
    async fn build(&self, config: &BuildConfig) -> Result<Emit, BuildFailure> {
        let n = self.builds.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|_| BuildFailure::new("gate closed"))?
                .forget();
        }
        (self.script)(config, n)
    }

    fn watch_roots(&self, _config: &BuildConfig) -> Vec<PathBuf> {
        Vec::new()
    }
}

/// File name a preset's SSR plugin writes, if it has one.
pub fn plugin_filename(config: &BuildConfig, plugin: &str) -> Option<String> {
    config
        .plugins
        .iter()
        .find(|p| p["name"] == plugin)
        .and_then(|p| p["filename"].as_str())
        .map(str::to_string)
}

/// Server bundle whose single entry renders `markup` (a minijinja template).
pub fn server_bundle_json(markup: &str) -> String {
    json!({
        "entry": "main.js",
        "files": { "main.js": markup },
        "maps": {},
    })
    .to_string()
}

pub fn client_manifest_json(public_path: &str, initial: &[&str]) -> String {
    json!({
        "publicPath": public_path,
        "all": initial,
        "initial": initial,
        "async": [],
        "modules": {},
    })
    .to_string()
}

fn echo_emit(config: &BuildConfig, n: usize) -> Emit {
    let entry = config.primary_entry().unwrap_or("main");
    let primary = config.output.file_for(entry);
    let mut emit = Emit::new().with_asset(
        primary.clone(),
        format!("/* {} build {} */", config.output.path, n),
    );

    if let Some(file) = plugin_filename(config, "ssr-server-bundle") {
        let markup = format!("<main data-build=\"{}\">{{{{ url }}}}</main>", n);
        emit = emit.with_asset(file, server_bundle_json(&markup));
    }
    if let Some(file) = plugin_filename(config, "ssr-client-manifest") {
        let versioned = format!("{}?v={}", primary, n);
        emit = emit.with_asset(
            file,
            client_manifest_json(&config.output.public_path, &[versioned.as_str()]),
        );
    }
    emit
}
