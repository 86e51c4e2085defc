//! Development server: on-demand builds for many projects behind one port.
//!
//! Requests are classified by [`Route`]. The [`resolve`]r turns a URL into a
//! [`ProjectIdentity`]; the [`CompilerRegistry`] creates one watching
//! [`CompilationUnit`] per project and role on first request; units write
//! into [`MemoryFs`] stores; the [`BuildCoordinator`] pairs the client and
//! server builds of SSR projects into renderers held by the
//! [`RendererCache`]; and the [`HotHub`] streams build events to browsers.

mod bundler;
mod coordinator;
mod error;
mod hot;
pub mod pages;
mod proxy;
mod registry;
mod renderer;
mod resolver;
mod router;
mod server;
mod state;
mod store;
mod unit;
mod watcher;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use bundler::{BuildFailure, Bundler, CommandBundler, Emit};
pub use coordinator::{BuildCoordinator, PairState};
pub use error::DevError;
pub use hot::{BuildSummary, EventStream, HotEvent, HotHub, Notifier};
pub use proxy::ApiProxy;
pub use registry::{CompilerRegistry, ProjectClass, ProjectKey};
pub use renderer::{
    BundleRenderer, BundleRendererFactory, ClientManifest, RenderContext, RenderError,
    RenderOptions, Renderer, RendererCache, RendererFactory, ServerBundle, OUTLET,
};
pub use resolver::{resolve, ProjectIdentity};
pub use router::{is_compilable, Route};
pub use server::{build_router, DevServer};
pub use state::{DevState, SharedState};
pub use store::{content_type_for, MemoryFs};
pub use unit::{BuildStatus, CompilationUnit, EmitHook, UnitKey, UnitSpec, WatchOptions};
pub use watcher::{FileChange, FileWatcher};
