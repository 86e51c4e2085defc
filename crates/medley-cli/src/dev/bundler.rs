//! The seam to the external bundler.
//!
//! The dev server never transforms modules itself. A [`Bundler`] receives a
//! fully merged [`BuildConfig`] and returns the emitted assets; the
//! compilation unit writes them into the output store.

use async_trait::async_trait;
use medley_config::{BuildConfig, BundlerSettings};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Assets produced by one successful build, keyed by path relative to
/// `output.path`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Emit {
    pub assets: BTreeMap<String, Vec<u8>>,
    pub warnings: Vec<String>,
}

impl Emit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_asset(mut self, path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.assets.insert(path.into(), content.into());
        self
    }
}

/// A build that produced errors instead of output.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{}", .errors.join("\n"))]
pub struct BuildFailure {
    pub errors: Vec<String>,
}

impl BuildFailure {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            errors: vec![error.into()],
        }
    }
}

#[async_trait]
pub trait Bundler: Send + Sync + 'static {
    /// Run one complete build of `config`.
    async fn build(&self, config: &BuildConfig) -> Result<Emit, BuildFailure>;

    /// Directories whose changes should trigger a rebuild.
    ///
    /// Defaults to the parent directory of every entry module given as an
    /// absolute path. Query-suffixed modules (the hot client) are skipped.
    fn watch_roots(&self, config: &BuildConfig) -> Vec<PathBuf> {
        let roots: BTreeSet<PathBuf> = config
            .entry
            .values()
            .flatten()
            .filter(|module| !module.contains('?'))
            .map(Path::new)
            .filter(|path| path.is_absolute())
            .filter_map(|path| path.parent().map(Path::to_path_buf))
            .collect();
        roots.into_iter().collect()
    }
}

/// Runs an external command per build.
///
/// The merged config is written to the command's stdin as JSON. On exit
/// status zero, stdout is either an emit report
///
/// ```json
/// { "assets": { "app.js": "..." }, "errors": [], "warnings": [] }
/// ```
///
/// or, if it does not parse as one, the raw contents of the primary output
/// file (`output.filename` with `[name]` set to the first entry). A non-zero
/// exit is a [`BuildFailure`] carrying stderr.
#[derive(Debug, Clone)]
pub struct CommandBundler {
    program: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    cwd: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EmitReport {
    assets: BTreeMap<String, String>,
    #[serde(default)]
    errors: Vec<String>,
    #[serde(default)]
    warnings: Vec<String>,
}

impl CommandBundler {
    /// Returns `None` when `settings.command` is empty.
    pub fn new(settings: &BundlerSettings, cwd: impl Into<PathBuf>) -> Option<Self> {
        let (program, args) = settings.command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
            env: settings.env.clone(),
            cwd: cwd.into(),
        })
    }

    fn parse_output(stdout: &[u8], config: &BuildConfig) -> Result<Emit, BuildFailure> {
        if let Ok(report) = serde_json::from_slice::<EmitReport>(stdout) {
            if !report.errors.is_empty() {
                return Err(BuildFailure {
                    errors: report.errors,
                });
            }
            return Ok(Emit {
                assets: report
                    .assets
                    .into_iter()
                    .map(|(path, content)| (path, content.into_bytes()))
                    .collect(),
                warnings: report.warnings,
            });
        }

        let entry = config
            .primary_entry()
            .ok_or_else(|| BuildFailure::new("build config has no entry"))?;
        Ok(Emit::new().with_asset(config.output.file_for(entry), stdout.to_vec()))
    }
}

#[async_trait]
impl Bundler for CommandBundler {
    async fn build(&self, config: &BuildConfig) -> Result<Emit, BuildFailure> {
        let payload = serde_json::to_vec(config)
            .map_err(|e| BuildFailure::new(format!("failed to serialize build config: {e}")))?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .envs(&self.env)
            .current_dir(&self.cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BuildFailure::new(format!("failed to spawn '{}': {e}", self.program)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&payload)
                .await
                .map_err(|e| BuildFailure::new(format!("failed to write build config: {e}")))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| BuildFailure::new(format!("bundler did not finish: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let errors: Vec<String> = stderr
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(str::to_string)
                .collect();
            return Err(if errors.is_empty() {
                BuildFailure::new(format!("bundler exited with {}", output.status))
            } else {
                BuildFailure { errors }
            });
        }

        Self::parse_output(&output.stdout, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medley_config::{BuildParams, Role, ServerConfig};

    fn config() -> BuildConfig {
        let params = BuildParams {
            entry_name: "index".to_string(),
            entry_path: "/srv/site/foo/index.js".to_string(),
            project_name: "foo".to_string(),
        };
        BuildConfig::preset(Role::Site, &params, &ServerConfig::default())
    }

    #[test]
    fn report_output_is_parsed() {
        let stdout = br#"{"assets":{"index.js":"ok"},"warnings":["w"]}"#;
        let emit = CommandBundler::parse_output(stdout, &config()).unwrap();
        assert_eq!(emit.assets["index.js"], b"ok");
        assert_eq!(emit.warnings, vec!["w"]);
    }

    #[test]
    fn report_errors_are_a_failure() {
        let stdout = br#"{"assets":{},"errors":["Module not found"]}"#;
        let err = CommandBundler::parse_output(stdout, &config()).unwrap_err();
        assert_eq!(err.errors, vec!["Module not found"]);
    }

    #[test]
    fn raw_output_becomes_primary_file() {
        let emit = CommandBundler::parse_output(b"console.log(1)", &config()).unwrap();
        assert_eq!(emit.assets["index.js"], b"console.log(1)");
    }

    #[test]
    fn empty_command_is_rejected() {
        let settings = BundlerSettings {
            command: vec![],
            ..BundlerSettings::default()
        };
        assert!(CommandBundler::new(&settings, "/").is_none());
    }

    #[test]
    fn default_watch_roots_skip_hot_client() {
        let bundler = CommandBundler::new(&BundlerSettings::default(), "/").unwrap();
        assert_eq!(
            bundler.watch_roots(&config()),
            vec![PathBuf::from("/srv/site/foo")]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_command_and_reads_stdout() {
        let settings = BundlerSettings {
            command: vec![
                "sh".to_string(),
                "-c".to_string(),
                "cat > /dev/null; printf 'bundled'".to_string(),
            ],
            ..BundlerSettings::default()
        };
        let bundler = CommandBundler::new(&settings, std::env::temp_dir()).unwrap();
        let emit = bundler.build(&config()).await.unwrap();
        assert_eq!(emit.assets["index.js"], b"bundled");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_carries_stderr() {
        let settings = BundlerSettings {
            command: vec![
                "sh".to_string(),
                "-c".to_string(),
                "cat > /dev/null; echo 'syntax error' >&2; exit 2".to_string(),
            ],
            ..BundlerSettings::default()
        };
        let bundler = CommandBundler::new(&settings, std::env::temp_dir()).unwrap();
        let err = bundler.build(&config()).await.unwrap_err();
        assert_eq!(err.errors, vec!["syntax error"]);
    }
}
