//! Main Entrypoint for the Companion MCP Server
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing logging on stderr (stdout carries the MCP transport).
//! 3. Creating working directories and loading the animation catalog.
//! 4. Wiring the media components into the tool service.
//! 5. Serving tools over stdio until the client disconnects.

use anyhow::Context;
use clap::{Parser, Subcommand};
use companion_core::voice::{Voice, VoiceInfo};
use companion_service::config::Config;
use companion_service::startup::{build_service, load_catalog, prepare_directories};
use rmcp::ServiceExt;
use tracing::info;

#[derive(Parser)]
#[command(name = "companion")]
#[command(about = "Voice, avatar and GIF tools for a desktop companion, served over MCP")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the MCP server on stdio (default)
    Serve,
    /// Print the available voices
    Voices,
    /// Print the animations in the catalog
    Animations,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Voices => {
            for voice in Voice::ALL {
                let info = VoiceInfo::from(voice);
                println!(
                    "{:<20} {:<8} {:<6} {:<10} {}",
                    info.id, info.name, info.language, info.style, info.pitch
                );
            }
            Ok(())
        }
        Commands::Animations => {
            let catalog = load_catalog(&config)?;
            for animation in catalog.list() {
                println!(
                    "{:<16} {:<20} {} frames @ {} fps{}{}",
                    animation.id,
                    animation.name,
                    animation.frames.len(),
                    animation.fps,
                    if animation.looping { ", loops" } else { "" },
                    if animation.builtin { "" } else { " (custom)" }
                );
            }
            Ok(())
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    // --- 3. Prepare Working State ---
    prepare_directories(&config)?;
    let catalog = load_catalog(&config)?;
    info!(
        animations = catalog.len(),
        catalog = %config.catalog_path.display(),
        "Configuration loaded. Initializing companion..."
    );

    // --- 4. Build Services ---
    let service = build_service(&config, catalog)?;

    // --- 5. Serve ---
    info!("Serving companion tools on stdio");
    let running = service
        .serve(rmcp::transport::stdio())
        .await
        .context("Failed to start MCP server")?;
    let reason = running.waiting().await?;
    info!(?reason, "Client disconnected. Shutting down.");
    Ok(())
}
