//! REST API over a finished billing run.
//!
//! Provides two GET endpoints:
//! - `/readings`: billed readings, optionally filtered by account and meter
//! - `/summary`: per-meter plan comparison

mod handlers;
mod types;

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;

use crate::billing::BillSummary;
use crate::reading::Reading;

pub use types::{ChargeRecord, MeterSummaryRecord, PlanRecord, ReadingRecord};

/// Immutable application state shared across all request handlers.
///
/// Built once after the billing run and wrapped in `Arc`; nothing is
/// mutated while serving.
pub struct AppState {
    /// Billed readings in output order.
    pub readings: Vec<Reading>,
    /// Plan comparison for the same readings.
    pub summary: BillSummary,
}

/// Builds the axum router with all API routes.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/readings", get(handlers::get_readings))
        .route("/summary", get(handlers::get_summary))
        .with_state(state)
}

/// Binds to the given address and serves the API until the process exits.
///
/// # Arguments
///
/// * `state` - Shared application state
/// * `addr` - Socket address to bind to
///
/// # Errors
///
/// Returns an `io::Error` if the listener cannot bind or the server fails.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, app).await
}
