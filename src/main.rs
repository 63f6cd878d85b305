//! Multi-room WebSocket Chat Server - Entry Point
//!
//! Loads configuration and accounts, starts one actor per room, then
//! accepts connections.

use std::env;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use roomchat::{handle_connection, Accounts, ChatServer, Config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=roomchat=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("roomchat=info")),
        )
        .init();

    let mut config = Config::from_env()?;

    // Bind address from command line overrides the environment
    if let Some(addr) = env::args().nth(1) {
        config.bind_address = addr;
    }
    info!("Configuration loaded: {:?}", config);

    let accounts = Accounts::load(&config.user_file)?;
    info!(
        "Loaded {} account(s), admin is {}",
        accounts.len(),
        accounts.admin().unwrap_or("nobody")
    );

    // Room creation failures (capacity, audit files) are fatal
    let server = Arc::new(ChatServer::from_config(&config, accounts).await?);

    let listener = TcpListener::bind(&config.bind_address).await?;
    info!("WebSocket Chat Server listening on {}", config.bind_address);

    // Connection accept loop
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("New connection from {}", addr);
                let server = Arc::clone(&server);

                // Spawn handler task for each connection
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, addr, server).await {
                        error!("Connection handler error: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
