//! Command-line interface definition for Medley.
//!
//! # Command Structure
//!
//! - `medley dev` - Start the multi-project development server
//! - `medley check` - Validate configuration and print the resolved settings

mod commands;

use clap::Parser;

pub use commands::{CheckArgs, Command, ConfigArgs, DevArgs};

/// Medley - on-demand development server for many front-end projects
#[derive(Parser, Debug)]
#[command(
    name = "medley",
    version,
    about = "On-demand development server for many front-end projects",
    long_about = "Medley serves every project under its site and SSR roots from one port.\n\
                  A project is built the first time it is requested, kept in watch mode,\n\
                  and pushes build events to the browser over Server-Sent Events."
)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_dev_overrides() {
        let cli = Cli::try_parse_from([
            "medley",
            "dev",
            "--port",
            "9000",
            "--default-project",
            "shop/home",
            "--max-projects",
            "4",
            "--open",
        ])
        .unwrap();

        let Command::Dev(args) = cli.command else {
            panic!("expected dev command");
        };
        assert_eq!(args.port, Some(9000));
        assert_eq!(args.default_project.as_deref(), Some("shop/home"));
        assert_eq!(args.max_projects, Some(4));
        assert!(args.open);
        assert!(args.config.host.is_none());
    }

    #[test]
    fn global_flags_work_after_subcommand() {
        let cli = Cli::try_parse_from(["medley", "check", "--verbose"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::Check(_)));
    }

    #[test]
    fn verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["medley", "-v", "-q", "check"]).is_err());
    }
}
