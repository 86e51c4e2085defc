//! `medley check`: load and validate the configuration.

use crate::cli::CheckArgs;
use crate::config::{self, CliOverrides};
use crate::error::{Result, ResultExt};
use crate::ui;
use medley_config::ServerConfig;

/// Execute the check command.
///
/// Prints the resolved configuration as JSON on stdout and warns about
/// directories that do not exist.
pub async fn execute(args: CheckArgs) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to read the working directory")?;
    let overrides = CliOverrides::from(&args.config);
    let config = config::load(&cwd, args.config.config.as_deref(), &overrides)?;

    println!("{}", serde_json::to_string_pretty(&config)?);

    let missing = missing_dirs(&config);
    for dir in &missing {
        ui::warning(&format!("{} does not exist", dir));
    }

    if missing.is_empty() {
        ui::success("Configuration is valid");
    } else {
        ui::success("Configuration is valid (with warnings)");
    }
    Ok(())
}

fn missing_dirs(config: &ServerConfig) -> Vec<String> {
    let mut dirs = vec![
        ("site_root", &config.site_root),
        ("ssr_root", &config.ssr_root),
    ];
    if let Some(dir) = &config.static_dir {
        dirs.push(("static_dir", dir));
    }

    dirs.into_iter()
        .filter(|(_, path)| !path.is_dir())
        .map(|(key, path)| format!("{} ({})", key, path.display()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn reports_missing_roots() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("src/site")).unwrap();

        let config = ServerConfig::default().resolve_paths(dir.path());
        let missing = missing_dirs(&config);

        assert_eq!(missing.len(), 2);
        assert!(missing[0].starts_with("ssr_root"));
        assert!(missing[1].starts_with("static_dir"));
        assert!(!missing.iter().any(|m| m.starts_with("site_root")));
    }
}
