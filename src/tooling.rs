//! Tooling & Integration Layer
//!
//! Command-line surface over the namespace coordinator.

pub mod cli;

pub use cli::{Cli, CliContext, Commands};
