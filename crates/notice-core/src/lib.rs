//! Core notice library (config, prompts, provider, stream processing, rendering).

pub mod config;
pub mod core;
pub mod logging;
pub mod prompts;
pub mod providers;
pub mod render;
pub mod stream;
