//! Config command handlers.

use anyhow::{Context, Result};
use notice_core::config::{self, Config};
use notice_core::providers::openai::API_KEY_ENV;

pub fn path() {
    println!("{}", config::paths::config_path().display());
}

pub fn init() -> Result<()> {
    let config_path = config::paths::config_path();
    Config::init(&config_path)
        .with_context(|| format!("init config at {}", config_path.display()))?;
    tracing::debug!(path = %config_path.display(), "config initialized");

    println!("Created config at {}", config_path.display());
    println!("Set [provider].api_key there or export {API_KEY_ENV} before `notice generate`.");
    Ok(())
}

/// Prints the default template; `cargo xtask update-default-config` captures it.
pub fn generate() -> Result<()> {
    let toml = Config::generate().context("generate default config")?;
    print!("{toml}");
    Ok(())
}
