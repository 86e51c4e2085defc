//! Status lines printed to stderr.

use owo_colors::OwoColorize;

pub fn success(message: &str) {
    eprintln!("{} {}", "✓".green().bold(), message);
}

pub fn info(message: &str) {
    eprintln!("{} {}", "ℹ".blue().bold(), message);
}

pub fn warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow().bold(), message.yellow());
}

pub fn error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message.red());
}

/// Print a block of bundler diagnostics, one per line, under a heading.
pub fn diagnostics(heading: &str, lines: &[String]) {
    if lines.is_empty() {
        return;
    }
    eprintln!("{}", heading.bold());
    for line in lines {
        eprintln!("  {}", line.dimmed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_messages() {
        success("Success message");
        info("Info message");
        warning("Warning message");
        error("Error message");
        diagnostics("warnings", &["unused export".to_string()]);
        diagnostics("empty", &[]);
    }
}
