//! Health and drain endpoints for the WHIP gateway.
//!
//! Kubernetes-compatible probes:
//! - `GET /health` - liveness (is the process running?)
//! - `GET /ready` - readiness (should the load balancer route new offers
//!   here?)
//! - `GET /idle` - drain probe (have all registered sessions ended?)
//!
//! Readiness is flipped off at the start of a drain so new publishers land
//! elsewhere, while `/idle` lets deployment tooling wait for in-flight
//! sessions to finish before stopping the process.
//!
//! The protocol router separately exposes whatever passthrough health
//! handlers the embedding service supplies; this router covers the
//! gateway's own state.

use crate::registry::SessionRegistry;
use axum::{extract::State, http::StatusCode, routing::get, Router};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Liveness/readiness state for the gateway.
#[derive(Debug)]
pub struct HealthState {
    /// Always true after startup (process is running).
    live: AtomicBool,
    /// True while the gateway should receive new offers.
    ready: AtomicBool,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    /// Create a new health state (live=true, ready=false).
    #[must_use]
    pub fn new() -> Self {
        Self {
            live: AtomicBool::new(true),
            ready: AtomicBool::new(false),
        }
    }

    /// Mark the gateway ready for new offers.
    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    /// Mark the gateway as draining; new offers should go elsewhere.
    pub fn set_draining(&self) {
        self.ready.store(false, Ordering::SeqCst);
    }

    /// Check if the process is live.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Check if the gateway accepts new offers.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
struct ProbeState {
    health: Arc<HealthState>,
    registry: Arc<SessionRegistry>,
}

/// Build the gateway's own health router.
pub fn health_router(health: Arc<HealthState>, registry: Arc<SessionRegistry>) -> Router {
    let state = ProbeState { health, registry };
    Router::new()
        .route("/health", get(liveness_handler))
        .route("/ready", get(readiness_handler))
        .route("/idle", get(idle_handler))
        .with_state(state)
}

async fn liveness_handler(State(state): State<ProbeState>) -> StatusCode {
    if state.health.is_live() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn readiness_handler(State(state): State<ProbeState>) -> StatusCode {
    if state.health.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// 200 once every registered session has ended; 503 while sessions are
/// still running. Deployment tooling polls this during a drain.
async fn idle_handler(State(state): State<ProbeState>) -> StatusCode {
    if state.registry.is_idle() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
