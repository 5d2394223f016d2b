//! complaint-rag CLI entry point.

mod cli;
mod commands;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json);

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Ingest { input, index, embedder, clean, all_products } => {
            commands::ingest(&config, &input, &index, embedder, clean, all_products).await
        }
        Commands::Ask { index, embedder, top_k, question } => {
            commands::ask(&config, &index, embedder, top_k, &question).await
        }
        Commands::Eval { index, embedder } => commands::eval(&config, &index, embedder).await,
    }
}
