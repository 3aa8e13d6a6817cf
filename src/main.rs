//! Main entry point for the CQL-to-ELM client CLI

#![forbid(unsafe_code)]

use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cql2elm_client::cli::commands::{self, Commands};
use cql2elm_client::{ClientConfig, ElmTranslator};

/// Translate CQL to ELM through a translation web service
#[derive(Parser, Debug)]
#[command(name = "cql2elm", version, about, long_about = None)]
struct Args {
    /// Translation service URL (overrides config and CQL_TO_ELM_WEBSERVICE_URL)
    #[arg(long)]
    url: Option<String>,

    /// Config file (TOML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("cql2elm_client={0},cql2elm={0}", log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config =
        ClientConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(url) = args.url {
        config.webservice_url = url;
    }

    let translator = ElmTranslator::new(config).context("Failed to create translator")?;

    match args.command {
        Commands::Convert {
            main,
            libs,
            library_dir,
            recursive,
            output,
            allow_errors,
        } => {
            commands::handle_convert(
                &translator,
                main,
                libs,
                library_dir,
                recursive,
                output,
                allow_errors,
            )
            .await?;
        }
        Commands::Raw {
            file,
            output,
            allow_errors,
        } => {
            commands::handle_raw(&translator, file, output, allow_errors).await?;
        }
    }

    Ok(())
}
