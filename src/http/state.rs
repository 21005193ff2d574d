use crate::capture::CaptureSession;
use crate::config::CaptureConfig;
use crate::delivery::ConnectivityGate;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared application state for HTTP handlers
///
/// Exactly one capture session is active at a time, so the state holds a
/// single session rather than a map.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<RwLock<CaptureSession>>,

    /// Connectivity signal shared with the pipeline
    pub gate: Arc<ConnectivityGate>,

    /// Source configuration used to build capture sources on start
    pub capture: Arc<CaptureConfig>,
}

impl AppState {
    pub fn new(session: CaptureSession, gate: Arc<ConnectivityGate>, capture: CaptureConfig) -> Self {
        Self {
            session: Arc::new(RwLock::new(session)),
            gate,
            capture: Arc::new(capture),
        }
    }
}
