//! Prompt command handler.

use anyhow::{Context, Result};
use notice_core::prompts::{RequestParameters, build_prompt};

/// Prints the prompts that `generate` would send.
pub fn run(params: &RequestParameters) -> Result<()> {
    let prompt = build_prompt(params).context("build prompt")?;
    println!("# system\n\n{}\n\n# user\n\n{}", prompt.system, prompt.user);
    Ok(())
}
