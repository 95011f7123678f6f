//! pagehit - one analytics hit per rendered page
//!
//! Serves page templates and tracking links, forwarding at most one
//! analytics hit per request to a Measurement Protocol collector.

mod render;
mod server;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use pagehit_core::delivery::CollectClient;
use pagehit_core::Config;

use crate::server::AppState;

#[derive(Parser)]
#[command(name = "pagehit")]
#[command(about = "Send one analytics hit per rendered page")]
#[command(version)]
struct Args {
    /// Config file (default: $XDG_CONFIG_HOME/pagehit/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the page host and tracking endpoints
    Serve {
        /// Address to listen on (default: from config)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Show tracking configuration
    Status,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("failed to load configuration")?;

    match args.verbose {
        0 => {}
        1 => config.logging.level = "debug".to_string(),
        _ => config.logging.level = "trace".to_string(),
    }

    match args.command.unwrap_or(Command::Serve { bind: None }) {
        Command::Serve { bind } => cmd_serve(config, bind),
        Command::Status => cmd_status(&config),
    }
}

fn cmd_serve(mut config: Config, bind: Option<String>) -> Result<()> {
    let _log_guard = pagehit_core::logging::init(&config.logging, true)
        .context("failed to initialize logging")?;

    if let Some(bind) = bind {
        config.server.bind = bind;
    }
    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("invalid bind address: {}", config.server.bind))?;

    if !config.tracking.is_ready() {
        tracing::warn!("Tracking is disabled or has no tracking id; no hits will be sent");
    }

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime.block_on(async move {
        let delivery = CollectClient::new().context("failed to build HTTP client")?;
        let app = server::router(AppState::new(&config, Arc::new(delivery)));

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {}", addr))?;
        tracing::info!(
            addr = %addr,
            templates = %config.server.templates_dir.display(),
            delivery_mode = config.tracking.delivery_mode.as_str(),
            "pagehit listening"
        );

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

        tracing::info!("pagehit stopped");
        Ok::<(), anyhow::Error>(())
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

fn cmd_status(config: &Config) -> Result<()> {
    println!("pagehit Configuration");
    println!("=====================");
    println!();

    let tracking = &config.tracking;

    println!("Tracking enabled:  {}", tracking.tracking_enabled);
    println!(
        "Tracking id:       {}",
        if tracking.tracking_id.trim().is_empty() {
            "<not set>"
        } else {
            tracking.tracking_id.as_str()
        }
    );
    println!("Ready:             {}", tracking.is_ready());
    println!("Auto page views:   {}", tracking.auto_send_page_view);
    println!("Endpoint:          {}", tracking.endpoint_url);
    println!("Delivery mode:     {}", tracking.delivery_mode.as_str());
    println!("Timeout:           {}s", tracking.timeout_secs);
    println!("Bot filtering:     {}", tracking.filter_bot_user_agents);
    if !tracking.custom_dimensions.is_empty() {
        println!("Custom dimensions:");
        for (key, value) in &tracking.custom_dimensions {
            println!("  {:<6} {}", key, value);
        }
    }

    println!();
    println!("SEO titles:        {}", config.seo.render_enabled);
    println!("Bind address:      {}", config.server.bind);
    println!("Templates:         {}", config.server.templates_dir.display());
    println!("Control panel:     /{}", config.server.cp_trigger);
    println!();
    println!("Config file:       {}", Config::config_path().display());
    println!(
        "Log files:         {}",
        pagehit_core::logging::log_file_pattern().display()
    );

    if !tracking.is_ready() {
        println!();
        println!("No hits will be sent. Enable tracking in config.toml:");
        println!();
        println!("  [tracking]");
        println!("  tracking_enabled = true");
        println!("  tracking_id = \"UA-XXXXXXX-1\"");
    }

    Ok(())
}
