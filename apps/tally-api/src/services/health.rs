//! Health check service.
//!
//! The database is required; the cache is best-effort, so a failing Redis
//! degrades the report without taking the server out of rotation.

use serde::Serialize;

use tally_db::migrations::migration_status;

use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServingStatus {
    Serving,
    Degraded,
    NotServing,
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub total: usize,
    pub applied: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: ServingStatus,
    pub database: bool,
    pub cache: &'static str,
    pub cache_ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub migrations: Option<MigrationReport>,
}

pub struct HealthService {
    state: AppState,
}

impl HealthService {
    pub fn new(state: AppState) -> Self {
        HealthService { state }
    }

    pub async fn check(&self) -> HealthReport {
        let database = self.state.db.health_check().await;
        let migrations = if database {
            migration_status(self.state.db.pool())
                .await
                .ok()
                .map(|(total, applied)| MigrationReport { total, applied })
        } else {
            None
        };
        let cache_ok = self.state.cache.ping().await;

        let status = match (database, cache_ok) {
            (false, _) => ServingStatus::NotServing,
            (true, false) => ServingStatus::Degraded,
            (true, true) => ServingStatus::Serving,
        };

        HealthReport {
            status,
            database,
            cache: self.state.cache.backend(),
            cache_ok,
            migrations,
        }
    }
}
