//! reims-ingest library interface
//!
//! Document ingestion, extraction, rent roll import and portfolio analytics
//! for the REIMS service. The binary wires these into an HTTP server and a
//! small CLI; integration tests drive them directly.

pub mod api;
pub mod db;
pub mod error;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use reims_common::config::TomlConfig;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::services::filename_parser::PropertyAliases;
use crate::services::ingest::Ingestor;
use crate::services::storage::ObjectStore;
use crate::services::worker::JobQueue;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    pub store: Arc<dyn ObjectStore>,
    pub ingestor: Ingestor,
    /// Feeds the processing worker
    pub queue: JobQueue,
    pub config: Arc<TomlConfig>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        store: Arc<dyn ObjectStore>,
        queue: JobQueue,
        config: Arc<TomlConfig>,
        aliases: Arc<PropertyAliases>,
    ) -> Self {
        let ingestor = Ingestor::new(db.clone(), store.clone(), aliases);
        Self {
            db,
            store,
            ingestor,
            queue,
            config,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let max_upload = state.config.max_upload_bytes;

    Router::new()
        .merge(api::health_routes())
        .merge(api::property_routes())
        .merge(api::document_routes())
        .merge(api::analytics_routes())
        .merge(api::reconcile_routes())
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
