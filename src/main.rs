mod api;
mod config;
mod console;
mod panel;
mod relay;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{info, warn};

use crate::config::Config;
use crate::panel::{HttpRelayClient, Panel};

#[derive(Parser, Debug)]
#[command(name = "cf-dns-panel")]
#[command(about = "View and edit Cloudflare DNS records through a small relay service")]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the relay service (default)
    Serve,
    /// Open the interactive record editor against a running relay
    Console {
        /// Relay base URL; defaults to the configured local port
        #[arg(short, long)]
        relay: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration first (before logger init)
    let config = Config::load(&args.config)?;

    // Initialize logger with config log level (env var takes precedence)
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&config.server.log_level)
    ).init();

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, &args.config).await,
        Command::Console { relay } => {
            let relay = relay
                .unwrap_or_else(|| format!("http://127.0.0.1:{}", config.server.port));
            info!("Using relay at {}", relay);
            let panel = Panel::new(HttpRelayClient::new(&relay));
            let runtime = tokio::runtime::Handle::current();
            tokio::task::spawn_blocking(move || console::run(panel, runtime)).await?
        }
    }
}

async fn serve(config: Config, config_path: &str) -> Result<()> {
    info!("Loading configuration from: {}", config_path);
    if !config.has_api_token() {
        warn!("CLOUDFLARE_API_TOKEN is not set; upstream calls will be rejected");
    }
    info!("Allowed origins: {:?}", config.cors.allowed_origins);

    let app = api::create_router(config.clone())?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Server listening on http://{}", addr);
    info!("Relaying to {}", config.cloudflare.api_base);

    axum::serve(listener, app).await?;

    Ok(())
}
