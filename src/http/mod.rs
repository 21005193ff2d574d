//! HTTP API server for external control
//!
//! This module provides a REST API for driving the capture pipeline:
//! - POST /capture/start|stop|pause|resume - Session control
//! - GET /capture/status - Query session statistics
//! - GET /transcript, /transcript/export - Read the assembled transcript
//! - POST /connectivity - Report online/offline transitions
//! - POST /delivery/retry - Re-trigger a stalled queue
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
