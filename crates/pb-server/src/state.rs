//! Shared application state for the probitstat server.
//!
//! Analyses are stateless; the only shared data is request accounting.

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::Instant;

/// Shared state available to all request handlers.
pub struct AppState {
    /// Server start time (for uptime reporting).
    pub started_at: Instant,

    /// In-flight request counter (for /health).
    pub inflight: AtomicU64,

    /// Total analysis requests served (for /health).
    pub total_requests: AtomicU64,
}

impl AppState {
    pub fn new() -> Self {
        Self { started_at: Instant::now(), inflight: AtomicU64::new(0), total_requests: AtomicU64::new(0) }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Type alias used in axum handlers.
pub type SharedState = Arc<AppState>;
