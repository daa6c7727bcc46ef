use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};
use tradedesk_core::DeskConfig;

use tradedesk_server::db::MockDb;

#[derive(Parser, Debug)]
#[command(author, version, about = "Mock REST backend for the tradedesk support desk", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "tradedesk.toml")]
    config: String,

    /// Seed document; overrides `server.seed_path`.
    #[arg(long)]
    seed: Option<PathBuf>,

    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let mut config = match DeskConfig::load_or_default(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let seed = args.seed.or_else(|| config.seed_path().map(PathBuf::from));
    let db = match seed {
        Some(path) => match MockDb::load(&path) {
            Ok(db) => db,
            Err(e) => {
                eprintln!("Failed to load seed data from {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => {
            tracing::warn!("No seed data configured, starting with empty collections");
            MockDb::empty()
        }
    };

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    tradedesk_server::http::start_http_server(Arc::new(db), &config.server, tx.subscribe()).await?;

    Ok(())
}
