//! Miette diagnostic conversion for CLI errors.

use crate::dev::DevError;
use crate::error::CliError;
use medley_config::ConfigError;
use miette::Report;

/// Convert CliError to miette Report
pub fn cli_error_to_miette(err: CliError) -> Report {
    match err {
        CliError::Config(e) => config_error_to_miette(e),
        CliError::Dev(DevError::Build(failure)) => {
            miette::miette!("Build failed:\n{}", failure.errors.join("\n"))
        }
        CliError::Server(msg) => miette::miette!(
            "Server error: {}\n\nHint: another process may already be listening; try --port",
            msg
        ),
        _ => miette::miette!("{}", err),
    }
}

fn config_error_to_miette(err: ConfigError) -> Report {
    match err {
        ConfigError::NotFound(path) => miette::miette!(
            "Config file not found: {}\n\nHint: create medley.toml or pass --config <path>",
            path.display()
        ),
        ConfigError::OverlappingPrefixes { first, second } => miette::miette!(
            "URL prefixes '{}' and '{}' overlap\n\nHint: every prefix must be a distinct path segment",
            first,
            second
        ),
        other => miette::miette!("Configuration error: {}", other),
    }
}
