//! Genius Loci gateway binary.
//!
//! Serves the observer WebSocket endpoint, owns the session dispatcher and
//! drives the (console) audio player from a packaged mapping.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use loci_gw::api::{self, ApiState, ObserverHub, DEFAULT_LISTEN_ADDR};
use loci_gw::dispatch::Dispatcher;
use loci_gw::mapping::{self, MappingStore};
use loci_gw::player::ConsolePlayer;
use loci_gw::registry::SubscriberRegistry;
use loci_gw::resources::PackDir;
use loci_gw::session::Session;
use loci_gw::status::StatusCell;

/// Genius Loci gateway - ambient audio for companion observers
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the resource pack (mappings.json plus tracks/)
    #[arg(short, long, env = "LOCI_PACK_DIR", default_value = "pack")]
    pack_dir: PathBuf,

    /// Address to listen on for observer connections
    #[arg(long, env = "LOCI_LISTEN", default_value = DEFAULT_LISTEN_ADDR)]
    listen: SocketAddr,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Check the mapping against the pack and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level)?;

    info!("Starting Genius Loci gateway...");
    info!("Resource pack: {}", args.pack_dir.display());

    let pack = PackDir::new(&args.pack_dir);

    // Handle mapping check
    if args.check {
        return check_mapping(&pack).await;
    }

    // Wire up the session: player and status sinks, the mapping store over
    // the pack, and the dispatcher that owns them all.
    let player = Arc::new(ConsolePlayer::new());
    let status = Arc::new(StatusCell::new());
    let hub = Arc::new(ObserverHub::new());
    let mapping = Arc::new(MappingStore::new(Arc::new(pack), player.clone()));
    let registry = SubscriberRegistry::new(hub.clone(), mapping.clone());
    let session = Session::new(player, status.clone());
    let dispatcher = Dispatcher::spawn(session, registry, mapping);

    let state = Arc::new(ApiState {
        hub,
        dispatcher,
        status,
    });

    // Set up shutdown signal
    let shutdown = shutdown_signal();

    run_app(state, args.listen, shutdown).await?;

    info!("Genius Loci gateway shutdown complete");
    Ok(())
}

async fn run_app(
    state: Arc<ApiState>,
    listen: SocketAddr,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<()> {
    tokio::pin!(shutdown);

    tokio::select! {
        result = api::start_server(state, listen) => result,
        _ = &mut shutdown => {
            info!("Shutdown signal received, stopping event loop");
            Ok(())
        }
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");
    info!("Shutdown signal received");
}

/// Report the state of the mapping file against the pack contents.
async fn check_mapping(pack: &PackDir) -> Result<()> {
    use colored::*;

    println!("\n{}", "=== Checking mapping data ===".bold().cyan());
    println!("  Pack: {}", pack.root().display().to_string().yellow());

    let document = mapping::read_document(pack).await?;

    println!("\n{}", "Tables:".bold());
    println!("  Tracks:   {}", document.tracks.len().to_string().green());
    println!("  Settings: {}", document.settings.len().to_string().green());
    println!("  Areas:    {}", document.areas.len().to_string().green());

    let missing = document.missing_tracks(pack).await;
    if missing.is_empty() {
        println!("\n{}", "✅ Every track file is present!".green().bold());
        return Ok(());
    }

    println!("\n{}", "Missing track files:".bold());
    for (location, file) in &missing {
        println!("  {} -> {}", location.yellow(), file.red());
    }

    anyhow::bail!("{} track file(s) missing from the pack", missing.len())
}
