//! CLI command handlers.

pub mod config;
pub mod generate;
pub mod prompt;
