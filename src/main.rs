use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use mimalloc::MiMalloc;
use scanbridge::config::AppConfig;
use scanbridge::gateway::{HttpScanGateway, ScanGateway};
use scanbridge::services::poller::ScanPoller;
use scanbridge::AppState;
use tokio::sync::{Mutex, RwLock};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scanbridge=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = AppConfig::from_env()?;

    let gateway: Arc<dyn ScanGateway> = Arc::new(HttpScanGateway::new(&config.scanner)?);
    let (poller, events) = ScanPoller::new(
        gateway,
        Duration::from_secs(config.scanner.poll_interval_secs),
    );

    let state = AppState {
        scanner: Arc::new(RwLock::new(config.scanner)),
        poller,
        events: Arc::new(Mutex::new(events)),
    };

    let addr = SocketAddr::new(config.host.parse()?, config.port);
    tracing::info!(host = %addr, "Starting ScanBridge API server");

    let app = scanbridge::routes::router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
