use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use stagelink_registry::SessionRegistry;
use stagelink_server::http_api::{self, AppState};
use stagelink_server::ws_server::WsServer;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "stagelinkd", about = "Multi-device prototype session orchestrator")]
struct Cli {
    /// HTTP API listen address
    #[arg(long, env = "STAGELINK_HTTP_ADDR", default_value = "127.0.0.1:8787")]
    http_addr: SocketAddr,

    /// WebSocket listen address for device connections
    #[arg(long, env = "STAGELINK_WS_ADDR", default_value = "127.0.0.1:8788")]
    ws_addr: SocketAddr,

    /// Public base URL embedded in join links
    #[arg(long, env = "STAGELINK_PUBLIC_URL", default_value = "http://localhost:8787")]
    public_url: String,

    /// Maximum concurrent device connections
    #[arg(long, default_value_t = 256)]
    max_connections: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing. Respects RUST_LOG env var, defaults to info.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let registry = Arc::new(SessionRegistry::new());
    let cancel = CancellationToken::new();

    let ws_server = WsServer::new(cli.ws_addr, Arc::clone(&registry), cancel.clone())
        .with_max_connections(cli.max_connections);
    let ws_handle = tokio::spawn(async move { ws_server.run().await });

    let app = http_api::router(AppState {
        registry,
        public_url: cli.public_url.trim_end_matches('/').to_owned(),
    });
    let http_listener = tokio::net::TcpListener::bind(cli.http_addr).await?;
    tracing::info!(addr = %cli.http_addr, "http api listening");
    let http_cancel = cancel.clone();
    let http_handle = tokio::spawn(async move {
        axum::serve(http_listener, app)
            .with_graceful_shutdown(async move { http_cancel.cancelled().await })
            .await
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    cancel.cancel();

    ws_handle.await??;
    http_handle.await??;

    Ok(())
}
