//! Footprint server: loads a model config, runs the configured migration and serves the footprint routes.
//!
//! Run from `server/`: `cargo run` (or `cargo run -p footprint-server` with `FOOTPRINT_CONFIG=server/footprint.json`)
//! Config path from `FOOTPRINT_CONFIG` (default `footprint.json`), bind address from `FOOTPRINT_BIND`.

use footprint_sdk::{common_routes, footprint_routes, load_from_path, AppState, FootprintService};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("footprint_sdk=info,footprint_server=info")),
        )
        .init();

    let config_path = std::env::var("FOOTPRINT_CONFIG").unwrap_or_else(|_| "footprint.json".into());
    let config = load_from_path(&config_path).await?;
    let state = AppState::new(FootprintService::initialize(&config).await?);

    let app = common_routes(state.clone()).nest("/api/v1", footprint_routes(state.clone()));
    let bind = std::env::var("FOOTPRINT_BIND").unwrap_or_else(|_| "127.0.0.1:3000".into());
    let listener = TcpListener::bind(&bind).await?;
    tracing::info!("footprint server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;
    state.service.close().await;
    Ok(())
}
