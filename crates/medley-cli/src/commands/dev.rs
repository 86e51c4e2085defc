//! Development server command implementation.
//!
//! Loads the configuration, wires the external bundler into the shared state,
//! starts the HTTP server and waits for Ctrl+C. Nothing is built up front:
//! every project is compiled on its first request.

use crate::cli::DevArgs;
use crate::config::{self, CliOverrides};
use crate::dev::{CommandBundler, DevServer, DevState};
use crate::error::{CliError, Result, ResultExt};
use crate::ui;
use std::sync::Arc;
use tokio::signal;

/// Execute the dev command.
///
/// # Errors
///
/// Returns errors for invalid configuration, an empty bundler command and
/// server startup failures. Build and render failures are reported per
/// request and never end the command.
pub async fn execute(args: DevArgs) -> Result<()> {
    ui::info("Starting development server...");

    let cwd = std::env::current_dir().context("Failed to read the working directory")?;
    let overrides = CliOverrides::from(&args);
    let config = config::load(&cwd, args.config.config.as_deref(), &overrides)?;

    ui::info(&format!("Site projects: {}", config.site_root.display()));
    ui::info(&format!("SSR projects: {}", config.ssr_root.display()));
    if let Some(max) = config.max_projects {
        ui::info(&format!("Keeping at most {} projects compiling", max));
    }
    for root in [&config.site_root, &config.ssr_root] {
        if !root.is_dir() {
            ui::warning(&format!("{} does not exist yet", root.display()));
        }
    }

    let bundler = CommandBundler::new(&config.bundler, &config.root).ok_or_else(|| {
        CliError::InvalidArgument("bundler.command must name a program".to_string())
    })?;
    tracing::debug!(command = ?config.bundler.command, "using command bundler");

    let landing = format!(
        "{}/{}/{}",
        config.server_url(),
        config.ssr_url_prefix,
        config.default_project.trim_matches('/')
    );
    let state = DevState::new(config, Arc::new(bundler)).into_shared();

    let server = DevServer::new(state.clone());
    let mut server_handle = tokio::spawn(server.start());

    if args.open {
        open_browser(&landing);
    }

    ui::info("Press Ctrl+C to stop");

    tokio::select! {
        _ = signal::ctrl_c() => {
            ui::info("Shutting down development server...");
            server_handle.abort();
        }
        result = &mut server_handle => {
            match result {
                Ok(Ok(())) => ui::warning("Server task completed unexpectedly"),
                Ok(Err(e)) => return Err(e),
                Err(e) => return Err(CliError::Server(e.to_string())),
            }
        }
    }

    tracing::info!(units = state.registry.len(), "stopping compilation units");
    ui::success("Development server stopped");
    Ok(())
}

/// Open `url` in the default browser.
fn open_browser(url: &str) {
    use std::process::Command;

    let result = if cfg!(target_os = "macos") {
        Command::new("open").arg(url).spawn()
    } else if cfg!(target_os = "windows") {
        Command::new("cmd").args(["/C", "start", url]).spawn()
    } else {
        Command::new("xdg-open").arg(url).spawn()
    };

    match result {
        Ok(_) => ui::info(&format!("Opened browser at {}", url)),
        Err(e) => ui::warning(&format!("Failed to open browser: {}", e)),
    }
}
