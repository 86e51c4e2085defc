//! Command implementations for the Medley CLI.
//!
//! - [`dev`] - Multi-project development server
//! - [`check`] - Configuration validation
//!
//! Each command provides an `execute` function that takes the parsed command
//! arguments and returns a Result.

pub mod check;
pub mod dev;

pub use check::execute as check_execute;
pub use dev::execute as dev_execute;
