//! Generate command handler.

use std::path::PathBuf;

use anyhow::{Context, Result};
use notice_core::config::Config;
use notice_core::prompts::{RequestParameters, build_prompt};
use notice_core::providers::openai::{ChatCompletionsClient, ChatCompletionsConfig};

use crate::modes;

pub struct GenerateRunOptions<'a> {
    pub config: &'a Config,
    pub params: &'a RequestParameters,
    pub model_override: Option<&'a str>,
    pub html: Option<PathBuf>,
    pub show_reasoning: bool,
    pub quiet: bool,
}

pub async fn run(options: GenerateRunOptions<'_>) -> Result<()> {
    let prompt = build_prompt(options.params).context("build prompt")?;

    let client_config = ChatCompletionsConfig::from_config(options.config, options.model_override)
        .context("resolve provider settings")?;
    let client = ChatCompletionsClient::new(client_config)?;

    tracing::info!(
        model = client.model(),
        unit = %options.params.unit,
        event = %options.params.event,
        "generating notice"
    );

    let exec_opts = modes::exec::ExecOptions {
        show_reasoning: options.show_reasoning,
        quiet: options.quiet,
        html: options.html,
    };

    modes::exec::run_generate(&client, &prompt, &options.params.user, &exec_opts).await
}
