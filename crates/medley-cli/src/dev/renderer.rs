//! Server-side renderers and the per-project renderer cache.
//!
//! A renderer is assembled from three inputs: the server bundle emitted by
//! the server unit, the client manifest emitted by the client unit, and the
//! project's `app.html` page template. Assembly happens in the build
//! coordinator; request handlers only ever read the cache.

use async_trait::async_trait;
use dashmap::DashMap;
use minijinja::{context, AutoEscape, Environment};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use super::resolver::ProjectIdentity;

/// Placeholder in `app.html` replaced by the rendered markup.
pub const OUTLET: &str = "<!--vue-ssr-outlet-->";

/// Mount point used when the template has no outlet comment.
const APP_MOUNT: &str = "<div id=\"app\"></div>";

/// Server bundle as written by the `ssr-server-bundle` plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerBundle {
    pub entry: String,
    pub files: BTreeMap<String, String>,
    #[serde(default)]
    pub maps: BTreeMap<String, serde_json::Value>,
}

/// Client manifest as written by the `ssr-client-manifest` plugin.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientManifest {
    pub public_path: String,
    pub all: Vec<String>,
    pub initial: Vec<String>,
    #[serde(rename = "async")]
    pub async_files: Vec<String>,
    pub modules: BTreeMap<String, serde_json::Value>,
}

impl ClientManifest {
    fn href(&self, file: &str) -> String {
        format!("{}{}", self.public_path, file)
    }

    fn is_stylesheet(file: &str) -> bool {
        file.split('?').next().is_some_and(|f| f.ends_with(".css"))
    }

    fn is_script(file: &str) -> bool {
        file.split('?').next().is_some_and(|f| f.ends_with(".js"))
    }
}

/// Per-request render input.
#[derive(Debug, Clone, Serialize)]
pub struct RenderContext {
    pub url: String,
}

impl RenderContext {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Inject the manifest's initial stylesheets and scripts into the page.
    pub inject: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { inject: true }
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("server bundle entry '{0}' is not among its files")]
    MissingEntry(String),

    #[error(transparent)]
    Template(#[from] minijinja::Error),
}

#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, context: &RenderContext) -> Result<String, RenderError>;
}

/// Builds renderers out of a matched bundle/manifest pair.
pub trait RendererFactory: Send + Sync {
    fn assemble(
        &self,
        bundle: ServerBundle,
        manifest: ClientManifest,
        template: String,
        options: &RenderOptions,
    ) -> Result<Arc<dyn Renderer>, RenderError>;
}

/// Renders the bundle's entry file as a minijinja template and places the
/// markup into the page template.
pub struct BundleRenderer {
    env: Environment<'static>,
    entry: String,
    head: String,
    body: String,
    template: String,
}

impl BundleRenderer {
    pub fn new(
        bundle: ServerBundle,
        manifest: &ClientManifest,
        template: String,
        options: &RenderOptions,
    ) -> Result<Self, RenderError> {
        if !bundle.files.contains_key(&bundle.entry) {
            return Err(RenderError::MissingEntry(bundle.entry));
        }

        let mut env = Environment::new();
        // Bundle files are markup, whatever their extension.
        env.set_auto_escape_callback(|_| AutoEscape::None);
        for (name, source) in bundle.files {
            env.add_template_owned(name, source)?;
        }

        let (head, body) = if options.inject {
            let head: String = manifest
                .initial
                .iter()
                .filter(|f| ClientManifest::is_stylesheet(f))
                .map(|f| format!("<link rel=\"stylesheet\" href=\"{}\">", manifest.href(f)))
                .collect();
            let body: String = manifest
                .initial
                .iter()
                .filter(|f| ClientManifest::is_script(f))
                .map(|f| format!("<script src=\"{}\" defer></script>", manifest.href(f)))
                .collect();
            (head, body)
        } else {
            (String::new(), String::new())
        };

        Ok(Self {
            env,
            entry: bundle.entry,
            head,
            body,
            template,
        })
    }

    fn compose(&self, markup: &str) -> String {
        let mut page = if self.template.contains(OUTLET) {
            self.template.replacen(OUTLET, markup, 1)
        } else if self.template.contains(APP_MOUNT) {
            self.template.replacen(APP_MOUNT, markup, 1)
        } else {
            insert_before(&self.template, "</body>", markup)
        };

        if !self.head.is_empty() {
            page = insert_before(&page, "</head>", &self.head);
        }
        if !self.body.is_empty() {
            page = insert_before(&page, "</body>", &self.body);
        }
        page
    }
}

/// Insert `fragment` before the last `tag`, or append it when `tag` is absent.
fn insert_before(html: &str, tag: &str, fragment: &str) -> String {
    match html.rfind(tag) {
        Some(at) => format!("{}{}{}", &html[..at], fragment, &html[at..]),
        None => format!("{}{}", html, fragment),
    }
}

#[async_trait]
impl Renderer for BundleRenderer {
    async fn render(&self, context: &RenderContext) -> Result<String, RenderError> {
        let markup = self
            .env
            .get_template(&self.entry)?
            .render(context! { url => &context.url })?;
        Ok(self.compose(&markup))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BundleRendererFactory;

impl RendererFactory for BundleRendererFactory {
    fn assemble(
        &self,
        bundle: ServerBundle,
        manifest: ClientManifest,
        template: String,
        options: &RenderOptions,
    ) -> Result<Arc<dyn Renderer>, RenderError> {
        Ok(Arc::new(BundleRenderer::new(
            bundle, &manifest, template, options,
        )?))
    }
}

#[derive(Clone)]
struct CachedRenderer {
    renderer: Arc<dyn Renderer>,
    generation: u64,
}

/// Latest assembled renderer per SSR project.
///
/// Entries are replaced whole; a request holding an older handle finishes
/// with it.
#[derive(Default)]
pub struct RendererCache {
    entries: DashMap<ProjectIdentity, CachedRenderer>,
}

impl RendererCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, project: &ProjectIdentity) -> Option<Arc<dyn Renderer>> {
        self.entries.get(project).map(|e| e.renderer.clone())
    }

    /// Publish `renderer` for `project`; returns how many renderers have been
    /// published for it, this one included.
    pub fn insert(&self, project: ProjectIdentity, renderer: Arc<dyn Renderer>) -> u64 {
        let mut entry = self.entries.entry(project).or_insert_with(|| CachedRenderer {
            renderer: renderer.clone(),
            generation: 0,
        });
        entry.renderer = renderer;
        entry.generation += 1;
        entry.generation
    }

    pub fn remove(&self, project: &ProjectIdentity) {
        self.entries.remove(project);
    }

    /// Number of renderers published for `project`; 0 if none.
    pub fn generation(&self, project: &ProjectIdentity) -> u64 {
        self.entries.get(project).map_or(0, |e| e.generation)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
