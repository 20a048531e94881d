//! # Tally API
//!
//! JSON HTTP server for a multi-tenant sales ledger.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                            Tally API                                    │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────────┐│
//! │  │ Transaction    │  │ Ledger Query   │  │ Catalog                    ││
//! │  │ Engine         │  │ Service        │  │                            ││
//! │  │ • create       │  │ • list (cached)│  │ • create / list (cached)   ││
//! │  │ • update line  │  │ • get          │  │ • get / update / delete    ││
//! │  │ • delete       │  │                │  │                            ││
//! │  └────────────────┘  └────────────────┘  └────────────────────────────┘│
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐                                │
//! │  │ User Admin     │  │ Health         │                                │
//! │  │ • list / create│  │ • database     │                                │
//! │  │ • change role  │  │ • cache        │                                │
//! │  └────────────────┘  └────────────────┘                                │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                      Infrastructure                               │  │
//! │  │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────────────┐│  │
//! │  │  │   SQLite     │  │ Query cache  │  │    JWT identity          ││  │
//! │  │  │  (tally-db)  │  │ memory/Redis │  │    Bearer → Actor        ││  │
//! │  │  └──────────────┘  └──────────────┘  └──────────────────────────┘│  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Environment variables:
//! - `TALLY_BIND_ADDR` - listen address (default: 0.0.0.0:8080)
//! - `TALLY_DB_PATH` - SQLite file (default: tally.db)
//! - `TALLY_DB_MAX_CONNECTIONS` - pool size (default: 5)
//! - `REDIS_URL` - shared cache; in-process cache when unset
//! - `TALLY_CACHE_TTL_SECS` - list cache TTL, 0 disables (default: 60)
//! - `JWT_SECRET` - HMAC secret for access tokens
//! - `JWT_ACCESS_LIFETIME_SECS` - token lifetime (default: 3600)

use std::sync::Arc;

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod routes;
pub mod services;

// Re-exports
pub use auth::JwtManager;
pub use cache::QueryCache;
pub use config::AppConfig;
pub use error::{ApiError, ApiResult};
pub use routes::router;

use tally_db::Database;

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub cache: QueryCache,
    pub jwt: Arc<JwtManager>,
}

impl AppState {
    /// Only the token settings of `config` outlive startup.
    pub fn new(db: Database, cache: QueryCache, config: &AppConfig) -> Self {
        AppState {
            db,
            cache,
            jwt: Arc::new(JwtManager::new(&config.jwt_secret, config.jwt_access_lifetime_secs)),
        }
    }
}
