use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::services::health::{HealthReport, HealthService, ServingStatus};
use crate::AppState;

/// Unauthenticated; 503 when the database is unreachable.
pub async fn check(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let report = HealthService::new(state).check().await;
    let status = match report.status {
        ServingStatus::NotServing => StatusCode::SERVICE_UNAVAILABLE,
        ServingStatus::Serving | ServingStatus::Degraded => StatusCode::OK,
    };
    (status, Json(report))
}
