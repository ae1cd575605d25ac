use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::{HeaderName, Method, header};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use x402_gateway::config::Config;
use x402_gateway::facilitator::{Facilitator, TestModeFacilitator};
use x402_gateway::sig_down::SigDown;
use x402_gateway::state::context::AppState;
use x402_gateway::state::snapshot;
use x402_gateway::{discovery, rest, rpc, telemetry};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    telemetry::init();

    let config = Config::load()?;
    let sig_down = SigDown::try_new()?;
    let cancellation_token = sig_down.cancellation_token();

    let snapshot_path = config.snapshot_path().clone();
    let snapshot_interval = Duration::from_secs(config.snapshot_interval_seconds());
    let loaded_snapshot = snapshot::load(&snapshot_path).await;

    let facilitator: Arc<dyn Facilitator> = Arc::new(TestModeFacilitator);
    let host = config.host();
    let port = config.port();
    let state = Arc::new(AppState::new(config, facilitator, loaded_snapshot).await);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-payment"),
            HeaderName::from_static("x-payment-response"),
            HeaderName::from_static("payment-signature"),
            HeaderName::from_static("payment-required"),
            HeaderName::from_static("x-a2a-extensions"),
        ])
        .expose_headers([
            HeaderName::from_static("x-payment-response"),
            HeaderName::from_static("payment-response"),
            HeaderName::from_static("payment-required"),
            HeaderName::from_static("x-a2a-extensions"),
        ]);

    let app: Router = Router::new()
        .merge(rpc::routes())
        .merge(rest::routes())
        .merge(discovery::routes())
        .with_state(state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let snapshot_task = tokio::spawn(periodic_snapshot(state.clone(), snapshot_path.clone(), snapshot_interval, cancellation_token.clone()));

    let listener = TcpListener::bind((host, port)).await?;
    info!(%host, port, "x402 gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancellation_token.cancelled().await })
        .await?;

    snapshot_task.abort();
    if let Err(error) = snapshot::save(&snapshot_path, &state.snapshot().await).await {
        error!(%error, "failed to persist final snapshot");
    }

    Ok(())
}

async fn periodic_snapshot(state: Arc<AppState>, path: std::path::PathBuf, interval: Duration, cancellation_token: tokio_util::sync::CancellationToken) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                if let Err(error) = snapshot::save(&path, &state.snapshot().await).await {
                    error!(%error, "periodic snapshot save failed");
                }
            }
            _ = cancellation_token.cancelled() => break,
        }
    }
}
