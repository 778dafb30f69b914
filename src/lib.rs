pub mod config;
pub mod errors;
pub mod gateway;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use tokio::sync::{broadcast, Mutex, RwLock};

use config::ScannerConfig;
use services::poller::{ScanEvent, ScanPoller};

/// Shared application state passed to all Axum handlers.
///
/// The scanner settings are behind a lock so the config endpoint can swap
/// them at runtime; handlers read the current settings per request. The
/// poller is built once at startup and shared; its event backlog is a
/// bounded ring, so an undrained stream drops oldest events instead of
/// growing without limit.
#[derive(Clone)]
pub struct AppState {
    pub scanner: Arc<RwLock<ScannerConfig>>,
    pub poller: ScanPoller,
    pub events: Arc<Mutex<broadcast::Receiver<ScanEvent>>>,
}
