use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::collections::HashMap;
use utoipa::ToSchema;

use crate::server::PharmacyServer;

/// Health check response
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
    pub uptime: u64,
    pub checks: HashMap<String, String>,
}

/// Version information response
#[derive(Debug, Serialize, ToSchema)]
pub struct VersionResponse {
    pub name: String,
    pub version: String,
    pub features: Vec<String>,
}

/// Health check handler
///
/// Answers 503 with `degraded` when the database does not respond, so load
/// balancers take the instance out of rotation.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service healthy", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_check(State(server): State<PharmacyServer>) -> (StatusCode, Json<HealthResponse>) {
    let mut checks = HashMap::new();

    let database_ok = server.database.is_healthy().await;
    checks.insert(
        "database".to_string(),
        if database_ok { "healthy" } else { "unreachable" }.to_string(),
    );

    let (status_code, status) = if database_ok {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    let response = HealthResponse {
        status: status.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime: server.uptime_secs(),
        checks,
    };

    (status_code, Json(response))
}

/// Version information handler
#[utoipa::path(
    get,
    path = "/version",
    responses((status = 200, description = "Build information", body = VersionResponse)),
    tag = "health"
)]
pub async fn version_info() -> Json<VersionResponse> {
    let features = [
        "preparation-agenda",
        "record-reconciliation",
        "patient-registry",
        "statistics",
        "medication-summary",
        "pii-redacted-logging",
    ]
    .iter()
    .map(|f| f.to_string())
    .collect();

    Json(VersionResponse {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        features,
    })
}
