//! Demo client for the trace-context propagation layer.
//!
//! Loads an optional TOML configuration, activates a telemetry backend when
//! one is configured, and sends instrumented requests.
//!
//! ```text
//! obs-demo --config demo.toml send https://api.example.com/hello
//! obs-demo id
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use observability_client::{BackendSelection, ObservabilityClient, ObservabilityOptions};

#[derive(Parser)]
#[command(name = "obs-demo")]
#[command(about = "Demo client for the observability propagation layer", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Own origin used when no configuration file is given.
    #[arg(long, default_value = "http://localhost:8080")]
    origin: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send an instrumented GET request and print the response
    Send { url: String },
    /// Print the session correlation identifier
    Id,
}

#[derive(Debug, Deserialize)]
struct DemoConfig {
    interception: ObservabilityOptions,
    backend: Option<BackendSelection>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "observability_client=debug,obs_demo=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => toml::from_str(&std::fs::read_to_string(path)?)?,
        None => DemoConfig {
            interception: ObservabilityOptions::new(cli.origin.clone()),
            backend: None,
        },
    };

    let client = ObservabilityClient::new(config.interception)?;
    tracing::info!(correlation_id = %client.correlation_id(), "observability client ready");

    if let Some(selection) = config.backend {
        if let Err(error) = client.activate_backend(selection).await {
            tracing::error!(%error, "backend not activated; continuing without one");
        }
    }

    match cli.command {
        Commands::Send { url } => {
            let request = reqwest::Request::new(reqwest::Method::GET, url.parse()?);
            let response = client.dispatch(request).await?;
            let status = response.status();
            let body = response.text().await?;
            match serde_json::from_str::<serde_json::Value>(&body) {
                Ok(json) => println!("{}\n{}", status, serde_json::to_string_pretty(&json)?),
                Err(_) => println!("{}\n{}", status, body),
            }
        }
        Commands::Id => println!("{}", client.correlation_id()),
    }

    client.shutdown();
    Ok(())
}
