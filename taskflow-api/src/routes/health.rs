/// Health check endpoint
///
/// # Endpoint
///
/// ```text
/// GET /health
/// GET /api/v1/health
/// ```
///
/// # Response
///
/// ```json
/// {
///   "success": true,
///   "message": "TaskFlow API is running",
///   "timestamp": "2024-05-01T12:00:00Z",
///   "database": "connected"
/// }
/// ```
///
/// Always 200; a database outage shows up as `"database": "disconnected"`.

use crate::app::AppState;
use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use taskflow_shared::db::pool;

/// How long the database probe may take
const DB_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub success: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,

    /// `connected` or `disconnected`
    pub database: String,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let connected = matches!(
        tokio::time::timeout(DB_PROBE_TIMEOUT, pool::health_check(&state.db)).await,
        Ok(Ok(()))
    );

    Json(HealthResponse {
        success: true,
        message: "TaskFlow API is running".to_string(),
        timestamp: Utc::now(),
        database: if connected { "connected" } else { "disconnected" }.to_string(),
    })
}
