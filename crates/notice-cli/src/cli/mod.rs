//! CLI entry and dispatch.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use notice_core::config;
use notice_core::core::interrupt;
use notice_core::logging::{self, LogTarget};
use notice_core::prompts::RequestParameters;

mod commands;

#[derive(Parser)]
#[command(name = "notice")]
#[command(version)]
#[command(about = "Streaming railway notice generator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Write logs to ${NOTICE_HOME}/logs/notice.log instead of stderr
    #[arg(long, global = true)]
    log_file: bool,
}

/// Form fields; each overrides the `[form]` value from config.
#[derive(clap::Args, Debug, Clone, Default)]
struct FormArgs {
    /// Issuing unit (发文单位)
    #[arg(long)]
    unit: Option<String>,

    /// Weather or event type (天气类型)
    #[arg(long)]
    event: Option<String>,

    /// Start date (起始日期)
    #[arg(long)]
    start_date: Option<String>,

    /// End date (结束日期)
    #[arg(long)]
    end_date: Option<String>,

    /// Affected lines (涉及线路)
    #[arg(long)]
    scope: Option<String>,

    /// Attachment reference (附件), pass "" to omit
    #[arg(long)]
    attachment: Option<String>,

    /// Requester identifier sent as the API `user` field
    #[arg(long)]
    user: Option<String>,
}

impl FormArgs {
    fn apply(self, mut params: RequestParameters) -> RequestParameters {
        let overrides = [
            (self.unit, &mut params.unit),
            (self.event, &mut params.event),
            (self.start_date, &mut params.start_date),
            (self.end_date, &mut params.end_date),
            (self.scope, &mut params.scope),
            (self.attachment, &mut params.attachment),
            (self.user, &mut params.user),
        ];
        for (value, field) in overrides {
            if let Some(value) = value {
                *field = value;
            }
        }
        params
    }
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Generate a notice and stream it from the model
    Generate {
        #[command(flatten)]
        form: FormArgs,

        /// Override the model from config
        #[arg(short, long)]
        model: Option<String>,

        /// Also write a standalone HTML page to this path
        #[arg(long, value_name = "PATH")]
        html: Option<PathBuf>,

        /// Print the reasoning (思考过程) to stderr after the stream ends
        #[arg(long)]
        show_reasoning: bool,

        /// Do not echo raw fragments to stderr while streaming
        #[arg(short, long)]
        quiet: bool,
    },

    /// Print the system and user prompts without sending them
    Prompt {
        #[command(flatten)]
        form: FormArgs,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
    /// Generate a fresh config from Rust defaults (for xtask)
    Generate,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = config::Config::load().context("load config")?;

    let log_target = if cli.log_file || config.log_to_file {
        LogTarget::File(config::paths::logs_dir())
    } else {
        LogTarget::Stderr
    };
    let _log_guard = logging::init(&log_target)?;

    interrupt::init()?;

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli.command, config).await })
}

async fn dispatch(command: Commands, config: config::Config) -> Result<()> {
    match command {
        Commands::Generate {
            form,
            model,
            html,
            show_reasoning,
            quiet,
        } => {
            let params = form.apply(config.form.clone());
            commands::generate::run(commands::generate::GenerateRunOptions {
                config: &config,
                params: &params,
                model_override: model.as_deref(),
                html,
                show_reasoning,
                quiet,
            })
            .await
        }

        Commands::Prompt { form } => {
            let params = form.apply(config.form.clone());
            commands::prompt::run(&params)
        }

        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
            ConfigCommands::Generate => commands::config::generate(),
        },
    }
}
