//! Rent roll import and property aggregate recompute
//!
//! An import replaces a property's units wholesale. Delete, insert and
//! recompute share one transaction, so readers see either the old unit set
//! with its aggregates or the new one.

use reims_common::config::UnitCountPolicy;
use reims_common::models::UnitRecord;
use reims_common::{Error, Result};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashSet;

use crate::db::properties::{self, PropertyAggregates};
use crate::db::units;

/// Outcome of [`validate_units`]; any error blocks the import
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Check a parsed unit list before it replaces the stored one
pub fn validate_units(
    units: &[UnitRecord],
    expected: Option<usize>,
    policy: UnitCountPolicy,
) -> ValidationReport {
    let mut report = ValidationReport::default();

    if units.is_empty() {
        report.errors.push("Rent roll contains no units".to_string());
        return report;
    }

    let mut seen = HashSet::new();
    for (index, unit) in units.iter().enumerate() {
        let number = unit.unit_number.trim();
        if number.is_empty() {
            report
                .errors
                .push(format!("Row {} has no unit number", index + 1));
        } else if !seen.insert(number.to_string()) {
            report
                .warnings
                .push(format!("Duplicate unit number '{}' (row {})", number, index + 1));
        }
    }

    if let Some(expected) = expected {
        let distinct = seen.len();
        if distinct != expected {
            let message = format!(
                "Document declares {} units but {} were parsed",
                expected, distinct
            );
            match policy {
                UnitCountPolicy::Reject => report.errors.push(message),
                UnitCountPolicy::Warn => report.warnings.push(message),
            }
        }
    }

    report
}

/// Result of a successful rent roll import
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportOutcome {
    pub property_id: i64,
    pub inserted: usize,
    pub skipped: usize,
    pub warnings: Vec<String>,
    pub total_units: i64,
    pub occupied_units: i64,
    pub occupancy_rate: f64,
}

/// Replace a property's units with `units` and recompute its aggregates
pub async fn import_rent_roll(
    pool: &SqlitePool,
    property_id: i64,
    units: &[UnitRecord],
    expected: Option<usize>,
    policy: UnitCountPolicy,
) -> Result<ImportOutcome> {
    let report = validate_units(units, expected, policy);
    if !report.is_ok() {
        tracing::warn!(
            property_id,
            errors = report.errors.len(),
            "Rent roll rejected: {}",
            report.errors.join("; ")
        );
        return Err(Error::Validation(report.errors));
    }

    let mut tx = pool.begin().await?;

    if !properties::property_exists(&mut tx, property_id).await? {
        return Err(Error::NotFound(format!("Property {}", property_id)));
    }

    let removed = units::delete_units(&mut tx, property_id).await?;

    let mut seen = HashSet::new();
    let mut inserted = 0;
    let mut skipped = 0;
    for unit in units {
        if !seen.insert(unit.unit_number.trim().to_string()) {
            skipped += 1;
            continue;
        }
        units::insert_unit(&mut tx, property_id, unit).await?;
        inserted += 1;
    }

    let aggregates = recompute_property(&mut tx, property_id).await?;
    tx.commit().await?;

    tracing::info!(
        property_id,
        removed,
        inserted,
        skipped,
        total_units = aggregates.total_units,
        occupied_units = aggregates.occupied_units,
        "Imported rent roll"
    );

    Ok(ImportOutcome {
        property_id,
        inserted,
        skipped,
        warnings: report.warnings,
        total_units: aggregates.total_units,
        occupied_units: aggregates.occupied_units,
        occupancy_rate: aggregates.occupancy_rate,
    })
}

/// Derive aggregates from the unit rows and write them to the property
pub async fn recompute_property(
    conn: &mut SqliteConnection,
    property_id: i64,
) -> Result<PropertyAggregates> {
    let counts = units::unit_counts(conn, property_id).await?;

    let occupancy_rate = if counts.total > 0 {
        counts.occupied as f64 / counts.total as f64 * 100.0
    } else {
        0.0
    };

    let aggregates = PropertyAggregates {
        total_units: counts.total,
        occupied_units: counts.occupied,
        occupancy_rate,
        monthly_rent: counts.monthly_rent,
        total_sqft: counts.sqft,
    };

    properties::write_aggregates(conn, property_id, &aggregates).await?;
    Ok(aggregates)
}

/// Recompute every property; returns the number updated
pub async fn recompute_all(pool: &SqlitePool) -> Result<usize> {
    let ids = properties::property_ids(pool).await?;

    for id in &ids {
        let mut tx = pool.begin().await?;
        let aggregates = recompute_property(&mut tx, *id).await?;
        tx.commit().await?;
        tracing::debug!(
            property_id = id,
            total_units = aggregates.total_units,
            occupied_units = aggregates.occupied_units,
            "Recomputed property"
        );
    }

    tracing::info!(properties = ids.len(), "Recomputed all property aggregates");
    Ok(ids.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reims_common::UnitStatus;

    fn unit(number: &str, status: UnitStatus) -> UnitRecord {
        UnitRecord {
            unit_number: number.to_string(),
            status,
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_list_is_error() {
        let report = validate_units(&[], None, UnitCountPolicy::Reject);
        assert!(!report.is_ok());
    }

    #[test]
    fn test_missing_unit_number_is_error() {
        let units = vec![unit("101", UnitStatus::Occupied), unit("  ", UnitStatus::Vacant)];
        let report = validate_units(&units, None, UnitCountPolicy::Reject);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("Row 2"));
    }

    #[test]
    fn test_duplicates_warn() {
        let units = vec![unit("101", UnitStatus::Occupied), unit("101", UnitStatus::Vacant)];
        let report = validate_units(&units, None, UnitCountPolicy::Reject);
        assert!(report.is_ok());
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_count_mismatch_follows_policy() {
        let units = vec![unit("101", UnitStatus::Occupied), unit("102", UnitStatus::Vacant)];

        let rejected = validate_units(&units, Some(3), UnitCountPolicy::Reject);
        assert!(!rejected.is_ok());

        let warned = validate_units(&units, Some(3), UnitCountPolicy::Warn);
        assert!(warned.is_ok());
        assert_eq!(warned.warnings.len(), 1);

        let matching = validate_units(&units, Some(2), UnitCountPolicy::Reject);
        assert!(matching.is_ok());
        assert!(matching.warnings.is_empty());
    }
}
