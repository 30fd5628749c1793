//! CLI for TokenRelay
//!
//! Subcommands:
//! - `server`: run the client WebSocket listener and the backend bridge
//! - `emit`: write one message to a running bridge (useful for smoke tests)

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};

use tokenrelay::config::{DEFAULT_CONFIG_PATH, load_config_from};
use tokenrelay::handler::{HandlerRegistry, StaticTokenAuthenticator};
use tokenrelay::presence::SledPresenceStore;
use tokenrelay::router::Message;
use tokenrelay::transport::bind;
use tokenrelay::transport::bridge::{emit, start_bridge_server};
use tokenrelay::transport::websocket::start_websocket_server;
use tokenrelay::utils::error::Result;
use tokenrelay::utils::logging;
use tokenrelay::worker::WorkerPool;

#[derive(Parser)]
#[command(name = "tokenrelay")]
enum Command {
    /// Start the WebSocket listener and the backend bridge
    Server {
        /// Configuration file, with or without extension
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: String,
    },
    /// Send one JSON message to a backend bridge
    Emit {
        /// Bridge address to connect to
        #[arg(long, default_value = "127.0.0.1:8081")]
        addr: String,
        /// Message to send, e.g. '{"Type":"event","AuthToken":"T1"}'
        #[arg(long)]
        json: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let result = match Command::parse() {
        Command::Server { config } => run_server(&config).await,
        Command::Emit { addr, json } => {
            logging::init("info");
            run_emit(&addr, &json).await
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // No-op when the server already installed a subscriber.
            logging::init("info");
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run_server(config_path: &str) -> Result<()> {
    let settings = load_config_from(config_path)?;
    logging::init(&settings.logging.level);

    let presence = Arc::new(SledPresenceStore::open(&settings.presence.path)?);
    let authenticator = Arc::new(StaticTokenAuthenticator::from_settings(&settings.auth));
    let handlers = Arc::new(HandlerRegistry::with_builtins(authenticator, presence.clone()));
    let pool = Arc::new(WorkerPool::new(settings.server.workers, handlers));
    info!(workers = pool.workers().len(), "worker pool ready");

    let ws_listener = bind(&settings.server.address()).await?;
    let bridge_listener = bind(&settings.bridge.address()).await?;

    tokio::select! {
        _ = start_websocket_server(ws_listener, pool.clone(), settings.server.clone()) => {
            error!("WebSocket server exited unexpectedly.");
        }
        _ = start_bridge_server(bridge_listener, pool.clone(), settings.bridge.clone()) => {
            error!("Backend bridge exited unexpectedly.");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    if let Err(e) = presence.flush() {
        warn!(error = %e, "failed to flush presence store");
    }
    Ok(())
}

async fn run_emit(addr: &str, json: &str) -> Result<()> {
    // Validate locally so a typo does not silently vanish on the relay side.
    let message = Message::decode(json)?;
    emit(addr, &message).await?;
    info!(%addr, "message sent to bridge");
    Ok(())
}
