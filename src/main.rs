//! Congestion Relay
//!
//! Run with: cargo run --bin congestion-relay -- [--config PATH]
//!
//! Mirrors the upstream congestion topic into the in-memory table,
//! republishes state changes downstream and serves the table over HTTP.
//! See `config.rs` for the environment variables that override the file.

use anyhow::Context;
use clap::Parser;
use congestion_relay::api::{serve, AppState};
use congestion_relay::config::{generate_default_config, Config, LogFormat, LoggingConfig};
use congestion_relay::link::MqttConnector;
use congestion_relay::relay::{Connectors, RelayController};
use congestion_relay::store::EntityStateTable;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "congestion-relay")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Relays stadium congestion events between MQTT brokers and serves the latest state over HTTP")]
struct Args {
    /// Path to a TOML config file (default: standard locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print a commented default config file and exit
    #[arg(long)]
    print_config: bool,

    /// Override the API port
    #[arg(long)]
    api_port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.print_config {
        print!("{}", generate_default_config());
        return Ok(());
    }

    // Loader warnings go to a bootstrap subscriber until the configured one exists
    let config =
        tracing::subscriber::with_default(bootstrap_subscriber(), || load_config(&args))?;

    init_tracing(&config.logging);

    tracing::info!("Starting congestion relay v{}", env!("CARGO_PKG_VERSION"));

    let table = Arc::new(EntityStateTable::new());
    let relay = RelayController::start(
        &config,
        Arc::clone(&table),
        Connectors::shared(Arc::new(MqttConnector)),
    );

    let state = AppState::new(table, relay.monitor());
    let served = serve(state, &config.api).await;

    relay.shutdown().await;
    served?;

    tracing::info!("Congestion relay shutdown complete");
    Ok(())
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load_with_env(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => Config::load_default(),
    };
    if let Some(port) = args.api_port {
        config.api.port = port;
    }
    config.validate()?;
    Ok(config)
}

/// Plain stderr output for messages emitted before the config is known
fn bootstrap_subscriber() -> impl tracing::Subscriber + Send + Sync {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "congestion_relay=info".into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish()
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("congestion_relay={},tower_http=info", logging.level).into()
    });

    let (pretty, json) = match logging.format {
        LogFormat::Pretty => (Some(tracing_subscriber::fmt::layer()), None),
        LogFormat::Json => (None, Some(tracing_subscriber::fmt::layer().json())),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty)
        .with(json)
        .init();
}
