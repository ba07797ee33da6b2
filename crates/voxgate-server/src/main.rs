//! Voxgate Server - local HTTP gateway for speech, synthesis and chat

use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod error;
mod state;

use state::AppState;
use voxgate_core::{Gateway, GatewayConfig};

#[derive(Debug, Parser)]
#[command(name = "voxgate-server", version, about = "Local speech, synthesis and chat gateway")]
struct Args {
    /// Address to bind
    #[arg(long, env = "VOXGATE_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to bind; overrides REALTIME_PROCESSING_PORT
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "voxgate_server=debug,voxgate_core=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = GatewayConfig::from_env();
    if let Some(port) = args.port {
        config.port = port;
    }
    info!(
        "Starting realtime gateway on port {} (STT={}:{}, TTS={}, LLM={})",
        config.port,
        config.stt.backend.as_str(),
        config.stt.model,
        config.tts.backend.as_str(),
        config.llm.provider.as_str()
    );

    let addr = format!("{}:{}", args.host, config.port);
    let gateway = Gateway::new(config)?;
    let state = AppState::new(gateway);

    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        },
    }
}
