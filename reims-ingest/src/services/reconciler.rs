//! Storage and database consistency report
//!
//! Read-only. Compares the object store listing against document rows, and
//! each property's stored aggregates against a fresh count of its units.

use reims_common::Result;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashSet;
use uuid::Uuid;

use super::storage::{parse_object_key, ObjectLayout, ObjectStore};
use crate::db::{documents, properties, units};

/// Tolerance when comparing stored and recomputed rates
const RATE_EPSILON: f64 = 0.01;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MissingObject {
    pub document_id: Uuid,
    pub object_key: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OrphanObject {
    pub object_key: String,
    /// `organized`, `legacy` or `unknown`
    pub layout: &'static str,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AggregateDrift {
    pub property_id: i64,
    pub name: String,
    pub stored_total_units: i64,
    pub actual_total_units: i64,
    pub stored_occupied_units: i64,
    pub actual_occupied_units: i64,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ReconcileReport {
    pub bucket: String,
    pub objects_scanned: usize,
    pub documents_scanned: usize,
    pub orphan_objects: Vec<OrphanObject>,
    pub missing_objects: Vec<MissingObject>,
    pub aggregate_drift: Vec<AggregateDrift>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.orphan_objects.is_empty()
            && self.missing_objects.is_empty()
            && self.aggregate_drift.is_empty()
    }
}

pub async fn reconcile(pool: &SqlitePool, store: &dyn ObjectStore) -> Result<ReconcileReport> {
    let objects = store.list("").await?;
    let rows = documents::object_keys(pool, store.bucket()).await?;

    let object_set: HashSet<&str> = objects.iter().map(String::as_str).collect();
    let row_keys: HashSet<&str> = rows.iter().map(|(_, key)| key.as_str()).collect();

    let orphan_objects = objects
        .iter()
        .filter(|key| !row_keys.contains(key.as_str()))
        .map(|key| OrphanObject {
            object_key: key.clone(),
            layout: match parse_object_key(key) {
                ObjectLayout::Organized { .. } => "organized",
                ObjectLayout::Legacy { .. } => "legacy",
                ObjectLayout::Unknown => "unknown",
            },
        })
        .collect();

    let missing_objects = rows
        .iter()
        .filter(|(_, key)| !object_set.contains(key.as_str()))
        .map(|(id, key)| MissingObject {
            document_id: *id,
            object_key: key.clone(),
        })
        .collect();

    let mut aggregate_drift = Vec::new();
    let mut conn = pool.acquire().await?;
    for property in properties::list_properties(pool).await? {
        let counts = units::unit_counts(&mut conn, property.id).await?;
        let expected_rate = if counts.total > 0 {
            counts.occupied as f64 / counts.total as f64 * 100.0
        } else {
            0.0
        };

        if counts.total != property.total_units
            || counts.occupied != property.occupied_units
            || (expected_rate - property.occupancy_rate).abs() > RATE_EPSILON
        {
            aggregate_drift.push(AggregateDrift {
                property_id: property.id,
                name: property.name.clone(),
                stored_total_units: property.total_units,
                actual_total_units: counts.total,
                stored_occupied_units: property.occupied_units,
                actual_occupied_units: counts.occupied,
            });
        }
    }

    let report = ReconcileReport {
        bucket: store.bucket().to_string(),
        objects_scanned: objects.len(),
        documents_scanned: rows.len(),
        orphan_objects,
        missing_objects,
        aggregate_drift,
    };

    if report.is_clean() {
        tracing::info!(bucket = %report.bucket, "Reconcile found no inconsistencies");
    } else {
        tracing::warn!(
            bucket = %report.bucket,
            orphan_objects = report.orphan_objects.len(),
            missing_objects = report.missing_objects.len(),
            aggregate_drift = report.aggregate_drift.len(),
            "Reconcile found inconsistencies"
        );
    }

    Ok(report)
}
