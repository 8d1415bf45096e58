mod cli;

use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use media_relay::{ContentReference, MediaPipeline, RelayConfig, classify};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::cli::{Args, Commands};

const DEFAULT_LOG_FILTER: &str = "media_relay=info,relay=info";

#[tokio::main]
async fn main() {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    init_logging(args.verbose, args.json);

    if let Err(e) = run(args).await {
        error!("{e:#}");
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    if let Commands::Classify { url } = &args.command {
        println!("{}", classify(url));
        return Ok(());
    }

    let mut config = RelayConfig::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(media_dir) = args.media_dir {
        config.media_dir = media_dir;
    }
    info!(media_dir = %config.media_dir.display(), "configuration loaded");

    let pipeline = MediaPipeline::from_config(&config)?;

    match args.command {
        Commands::Fetch { url, id, normalize } => {
            let reference = ContentReference::new(url, id);
            let output = if normalize {
                serde_json::to_string_pretty(&pipeline.process(&reference).await?)?
            } else {
                serde_json::to_string_pretty(&pipeline.acquire(&reference).await?)?
            };
            println!("{output}");
        }
        Commands::Normalize { path } => {
            let result = pipeline.normalize(&path, pipeline.transcode_spec()).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Classify { .. } => {}
    }

    Ok(())
}

fn init_logging(verbose: bool, json: bool) {
    let filter = if verbose {
        EnvFilter::new("media_relay=debug,relay=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}
