//! Medley CLI - on-demand development server for many front-end projects.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line definition (clap)
//! - [`commands`] - `dev` and `check`
//! - [`config`] - Layered configuration loading (figment)
//! - [`dev`] - The development server: resolver, unit registry, output
//!   stores, SSR coordination, hot reload and HTTP routing
//! - [`error`] - Error types with actionable messages
//! - [`logger`] - Structured logging with tracing
//! - [`ui`] - Terminal status lines
//!
//! # Example
//!
//! ```rust,no_run
//! use medley_cli::dev::{build_router, CommandBundler, DevState};
//! use medley_config::ServerConfig;
//! use std::sync::Arc;
//!
//! let config = ServerConfig::default();
//! let bundler = CommandBundler::new(&config.bundler, &config.root).unwrap();
//! let router = build_router(DevState::new(config, Arc::new(bundler)).into_shared());
//! # let _ = router;
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod dev;
pub mod error;
pub mod logger;
pub mod ui;

pub use error::{CliError, Result, ResultExt};
