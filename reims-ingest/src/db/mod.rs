//! Database access for reims-ingest
//!
//! Row mapping and queries for the shared `reims.db` schema created by
//! `reims_common::db::init`.

pub mod documents;
pub mod extracted;
pub mod properties;
pub mod units;

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::path::Path;

/// Open (or create) the database and bring the schema up to date
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    tracing::debug!("Connecting to database: {}", db_path.display());
    let pool = reims_common::db::init_database(db_path).await?;
    Ok(pool)
}

/// Timestamps are stored as RFC 3339 text
pub(crate) fn parse_timestamp(column: &str, value: &str) -> reims_common::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            reims_common::Error::Internal(format!("Failed to parse {} '{}': {}", column, value, e))
        })
}

pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}
