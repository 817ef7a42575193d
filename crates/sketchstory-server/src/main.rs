use std::sync::Arc;

use clap::Parser;
use sketchstory_server::{AppState, Cli, ServerConfig, router};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sketchstory_server=info,tower_http=info".into()),
        )
        .init();

    let config = ServerConfig::from(Cli::parse());
    let addr = config.addr;
    info!(
        "Keeping up to {} stroke(s) per session, channel capacity {}",
        config.max_history, config.channel_capacity
    );

    let app = router(Arc::new(AppState::new(config)));

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    info!("SketchStory relay server listening on {}", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
