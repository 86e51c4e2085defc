//! Configuration for the Medley multi-project development server.
//!
//! - [`server`] holds the process-wide [`ServerConfig`] (ports, roots, URL prefixes).
//! - [`build`] holds the per-unit [`BuildConfig`] handed to the bundler and the
//!   role presets used for site, SSR client and SSR server builds.
//! - [`merge`] deep-merges project-local override files over those presets.
//! - [`discovery`] layers defaults, `medley.toml` and `MEDLEY_*` variables.

pub mod build;
pub mod discovery;
pub mod error;
pub mod merge;
pub mod server;

pub use build::{BuildConfig, BuildParams, ModuleOptions, OutputOptions, Role};
pub use discovery::{ConfigDiscovery, CONFIG_FILE_NAME, ENV_PREFIX};
pub use error::{ConfigError, Result};
pub use merge::{load_override, merge_values, substitute_params, OVERRIDE_FILE_NAMES};
pub use server::{BundlerSettings, ServerConfig, SsrSettings};
