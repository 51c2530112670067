use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod dashboard;
mod error;
mod ml;
mod web;

use crate::config::Config;
use crate::dashboard::Dataset;
use crate::ml::MLEngine;
use crate::web::{DashboardServer, PredictionServer};

#[derive(Parser)]
#[command(name = "traffic-insights")]
#[command(about = "Traffic prediction API and traffic dataset dashboard")]
struct Cli {
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the /predict and /predict_lr endpoints
    Serve {
        #[arg(long)]
        bind: Option<String>,
    },
    /// Serve the filterable dashboard over the traffic dataset
    Dashboard {
        #[arg(long)]
        bind: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::from_file(&cli.config)?;

    let mut server_handle: JoinHandle<Result<()>> = match cli.command {
        Command::Serve { bind } => {
            info!("Starting traffic prediction service");

            let ml_engine = Arc::new(MLEngine::new(&config.prediction).await?);
            let server = PredictionServer::new(ml_engine);
            let bind_address = bind.unwrap_or(config.prediction.bind_address);

            tokio::spawn(async move { server.start(&bind_address).await })
        }
        Command::Dashboard { bind } => {
            info!("Starting traffic dashboard");

            let dataset = Arc::new(Dataset::load(&config.dashboard.dataset_path)?);
            let server = DashboardServer::new(dataset);
            let bind_address = bind.unwrap_or(config.dashboard.bind_address);

            tokio::spawn(async move { server.start(&bind_address).await })
        }
    };

    // Wait for shutdown signal or for the server to stop on its own
    tokio::select! {
        result = &mut server_handle => {
            result??;
            warn!("Server stopped unexpectedly");
        }
        signal = signal::ctrl_c() => {
            signal?;
            info!("Shutdown signal received, stopping server...");
            server_handle.abort();
        }
    }

    Ok(())
}
