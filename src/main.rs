//! `scaffold-bridge` binary: serve the operation table over TCP or stdio.
//!
//! Ships with the [`NullEngine`]; a deployment embeds the crate and supplies
//! a real engine instead.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use scaffold_bridge::config::Config;
use scaffold_bridge::{Engine, MessageConnection, NullEngine, ServerConnection, SERVER_SOURCE};

#[derive(Debug, Parser)]
#[command(name = "scaffold-bridge", version, about = "Remote-UI bridge for a project-configuration core")]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Serve on a TCP address instead of stdio.
    #[arg(long, conflicts_with = "stdio")]
    listen: Option<SocketAddr>,
    /// Serve on stdin/stdout (the default).
    #[arg(long)]
    stdio: bool,
}

fn null_engine(_toolbox: scaffold_bridge::Toolbox) -> Arc<dyn Engine> {
    Arc::new(NullEngine)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(listen) = cli.listen {
        config.listen = Some(listen);
    }
    if cli.stdio {
        config.listen = None;
    }

    // Logs go to stderr; stdout may be the transport.
    let filter = EnvFilter::try_new(&config.log_filter)
        .with_context(|| format!("invalid log filter {:?}", config.log_filter))?;
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    match config.listen {
        Some(addr) => serve_tcp(addr).await,
        None => serve_stdio().await,
    }
}

async fn serve_tcp(addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "listening");
    loop {
        let (stream, peer) = listener.accept().await.context("accepting connection")?;
        tracing::info!(%peer, "connection accepted");
        tokio::spawn(async move {
            let (reader, writer) = stream.into_split();
            let conn = MessageConnection::new(SERVER_SOURCE, reader, writer);
            let server = ServerConnection::new(conn, null_engine);
            if let Err(err) = server.listen().await {
                tracing::warn!(%peer, %err, "connection task failed");
            }
        });
    }
}

async fn serve_stdio() -> anyhow::Result<()> {
    tracing::info!("serving on stdio");
    let conn = MessageConnection::new(SERVER_SOURCE, tokio::io::stdin(), tokio::io::stdout());
    let server = ServerConnection::new(conn, null_engine);
    server.listen().await.context("stdio read loop")?;
    Ok(())
}
