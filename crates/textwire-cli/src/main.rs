use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use textwire::providers::factory::get_handler;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

mod commands;
mod configuration;
mod error;

use configuration::Settings;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML settings file, layered under TEXTWIRE_* environment variables
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send a prompt and stream the reply
    Run {
        /// System prompt
        #[arg(short, long, default_value = "")]
        system: String,

        #[arg(required = true)]
        prompt: Vec<String>,
    },

    /// List the models the provider offers
    Models,

    /// Show the configured model as JSON
    Model,

    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Command::Version = cli.command {
        return commands::version::execute().await;
    }

    let settings = Settings::new(cli.config.as_deref()).context("Failed to load settings")?;
    let handler = get_handler(settings.provider.into_config())?;

    match cli.command {
        Command::Run { system, prompt } => {
            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("interrupted, cancelling request");
                    on_interrupt.cancel();
                }
            });

            let prompt = prompt.join(" ");
            commands::run::execute(
                handler.as_ref(),
                &system,
                &prompt,
                cancel,
                &mut std::io::stdout(),
            )
            .await
        }
        Command::Models => commands::models::execute(handler.as_ref()).await,
        Command::Model => commands::model::execute(handler.as_ref()).await,
        Command::Version => commands::version::execute().await,
    }
}
