use anyhow::{Context, Result};
use axum::{routing::any, Router};
use beacon_server::{ws_handler, Server};
use clap::Parser;
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// WebRTC signaling and mesh-coordination server.
#[derive(Parser)]
#[command(name = "beacon", version)]
struct Args {
    /// Port to listen on.
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// Allowed origin pattern; `*` matches any run of characters.
    /// Repeat for multiple patterns.
    #[arg(long = "origin", default_values_t = [String::from("*")])]
    origins: Vec<String>,

    /// Only relay TURN candidates; STUN servers are omitted from relay
    /// peer configurations.
    #[arg(long)]
    turn_only: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let server = Server::new(&args.origins, args.turn_only);

    let app = Router::new()
        .route("/", any(ws_handler))
        .with_state(server);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "signaling server listening");

    axum::serve(listener, app)
        .await
        .context("server terminated")?;

    Ok(())
}
