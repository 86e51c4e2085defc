//! Logging setup built on `tracing`.
//!
//! Verbosity is chosen in this order:
//! 1. `--verbose`: DEBUG for medley crates, INFO for request tracing
//! 2. `--quiet`: ERROR only
//! 3. `RUST_LOG`
//! 4. Default: INFO for medley crates
//!
//! ```rust,no_run
//! use medley_cli::logger::init_logger;
//!
//! init_logger(false, false, false);
//! tracing::info!(project = "hello/world", "unit created");
//! ```

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const VERBOSE_FILTER: &str = "medley_cli=debug,medley_config=debug,tower_http=info";
const QUIET_FILTER: &str = "medley_cli=error,medley_config=error";
const DEFAULT_FILTER: &str = "medley_cli=info,medley_config=info";

/// Pick the filter for the given flags. `RUST_LOG` only applies when neither
/// flag is set.
pub fn filter_for(verbose: bool, quiet: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new(VERBOSE_FILTER)
    } else if quiet {
        EnvFilter::new(QUIET_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }
}

/// Install the global subscriber. Call once, before anything logs.
pub fn init_logger(verbose: bool, quiet: bool, no_color: bool) {
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_ansi(!no_color)
        .compact();

    // A second initialisation (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter_for(verbose, quiet))
        .with(fmt_layer)
        .try_init();
}

/// Respects `NO_COLOR` and `FORCE_COLOR`, then falls back to TTY detection.
pub fn should_use_colors() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if std::env::var_os("FORCE_COLOR").is_some() {
        return true;
    }
    console::Term::stderr().features().colors_supported()
}
