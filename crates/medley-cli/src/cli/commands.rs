use clap::{Args, Subcommand};
use std::path::PathBuf;

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the development server
    ///
    /// Projects under the site and SSR roots are compiled the first time
    /// they are requested and rebuilt whenever their sources change.
    Dev(DevArgs),

    /// Validate configuration
    ///
    /// Loads medley.toml, environment overrides and flags, validates the
    /// result and prints the resolved settings as JSON.
    Check(CheckArgs),
}

/// Settings shared by every command that loads the server configuration.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Path to the config file (defaults to ./medley.toml when present)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, value_name = "IP")]
    pub host: Option<String>,

    /// Root of single-bundle projects
    #[arg(long, value_name = "DIR")]
    pub site_root: Option<PathBuf>,

    /// Root of server-rendered projects
    #[arg(long, value_name = "DIR")]
    pub ssr_root: Option<PathBuf>,
}

/// Arguments for the dev command
#[derive(Args, Debug)]
pub struct DevArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Port for the development server
    #[arg(short, long, value_name = "PORT")]
    pub port: Option<u16>,

    /// SSR project `/` redirects to, e.g. hello/world
    #[arg(long, value_name = "PROJECT")]
    pub default_project: Option<String>,

    /// Keep at most this many projects compiling; least recently used
    /// projects are dropped first
    #[arg(long, value_name = "N")]
    pub max_projects: Option<usize>,

    /// Backend that requests under /api/ are proxied to
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Open the browser on the default project once the server is up
    #[arg(long)]
    pub open: bool,
}

/// Arguments for the check command
#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}
