//! Terminal output helpers.
//!
//! ```no_run
//! use medley_cli::ui;
//!
//! ui::init_colors(false);
//! ui::success("Development server running at http://127.0.0.1:8080");
//! ui::print_build_summary("hello/world", "client", 412, &[], &[]);
//! ```

mod messages;

use owo_colors::OwoColorize;
use std::time::Duration;

pub use messages::{diagnostics, error, info, success, warning};

/// Apply `--no-color` and the environment to owo-colors' global override.
pub fn init_colors(no_color: bool) {
    let enabled = !no_color && crate::logger::should_use_colors();
    owo_colors::set_override(enabled);
}

pub fn format_duration(duration: Duration) -> String {
    let ms = duration.as_millis();
    if ms < 1000 {
        format!("{}ms", ms)
    } else {
        format!("{:.2}s", duration.as_secs_f64())
    }
}

/// One line per finished build, followed by its diagnostics.
pub fn print_build_summary(
    project: &str,
    role: &str,
    duration_ms: u64,
    errors: &[String],
    warnings: &[String],
) {
    let took = format_duration(Duration::from_millis(duration_ms));
    if errors.is_empty() {
        eprintln!(
            "{} {} {} in {}",
            "✓".green().bold(),
            project.bold(),
            format!("[{}]", role).dimmed(),
            took
        );
    } else {
        eprintln!(
            "{} {} {} failed after {}",
            "✗".red().bold(),
            project.bold(),
            format!("[{}]", role).dimmed(),
            took
        );
    }
    diagnostics("errors:", errors);
    diagnostics("warnings:", warnings);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    }

    #[test]
    fn test_print_build_summary() {
        print_build_summary("hello/world", "site", 12, &[], &[]);
        print_build_summary("hello/world", "server", 12, &["boom".to_string()], &[]);
    }
}
