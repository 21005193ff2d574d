use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use streamscribe::{create_router, AppState, CaptureSession, Config, ConnectivityGate};
use tracing::info;

/// Chunked live-audio transcription pipeline
#[derive(Debug, Parser)]
#[command(name = "streamscribe", version)]
struct Args {
    /// Path to the configuration file (extension optional)
    #[arg(long, default_value = "config/streamscribe")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("streamscribe v0.1.0");
    info!("Loaded config: {}", cfg.service.name);
    info!("Delivery endpoint: {}", cfg.delivery.endpoint_url);

    let gate = Arc::new(ConnectivityGate::new(true));
    let session = CaptureSession::new(cfg.session_config(), Arc::clone(&gate));
    let state = AppState::new(session, gate, cfg.capture.clone());

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, create_router(state)).await?;

    Ok(())
}
