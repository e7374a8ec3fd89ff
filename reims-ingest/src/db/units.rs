//! Unit ("stores" table) persistence

use chrono::NaiveDate;
use reims_common::models::{Unit, UnitRecord};
use reims_common::{Result, UnitStatus};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

fn unit_from_row(row: &SqliteRow) -> Result<Unit> {
    let status: String = row.get("status");
    let lease_start: Option<String> = row.get("lease_start");
    let lease_end: Option<String> = row.get("lease_end");

    Ok(Unit {
        id: row.get("id"),
        property_id: row.get("property_id"),
        record: UnitRecord {
            unit_number: row.get("unit_number"),
            tenant_name: row.get("tenant_name"),
            status: status.parse()?,
            sqft: row.get("sqft"),
            monthly_rent: row.get("monthly_rent"),
            lease_start: lease_start.and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
            lease_end: lease_end.and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
        },
    })
}

pub async fn list_units(pool: &SqlitePool, property_id: i64) -> Result<Vec<Unit>> {
    let rows = sqlx::query(
        r#"
        SELECT id, property_id, unit_number, tenant_name, status, sqft,
               monthly_rent, lease_start, lease_end
        FROM stores
        WHERE property_id = ?
        ORDER BY unit_number
        "#,
    )
    .bind(property_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(unit_from_row).collect()
}

/// Remove every unit of a property; returns the number deleted
pub async fn delete_units(conn: &mut SqliteConnection, property_id: i64) -> Result<u64> {
    let done = sqlx::query("DELETE FROM stores WHERE property_id = ?")
        .bind(property_id)
        .execute(conn)
        .await?;
    Ok(done.rows_affected())
}

pub async fn insert_unit(
    conn: &mut SqliteConnection,
    property_id: i64,
    unit: &UnitRecord,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO stores (
            property_id, unit_number, tenant_name, status, sqft,
            monthly_rent, lease_start, lease_end
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(property_id)
    .bind(unit.unit_number.trim())
    .bind(&unit.tenant_name)
    .bind(unit.status.as_str())
    .bind(unit.sqft)
    .bind(unit.monthly_rent)
    .bind(unit.lease_start.map(|d| d.format("%Y-%m-%d").to_string()))
    .bind(unit.lease_end.map(|d| d.format("%Y-%m-%d").to_string()))
    .execute(conn)
    .await?;

    Ok(())
}

/// Counts and sums over a property's unit rows
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UnitCounts {
    pub total: i64,
    pub occupied: i64,
    pub monthly_rent: f64,
    /// None when no unit carries an area
    pub sqft: Option<f64>,
}

pub async fn unit_counts(conn: &mut SqliteConnection, property_id: i64) -> Result<UnitCounts> {
    let row = sqlx::query(
        r#"
        SELECT COUNT(*) AS total,
               COALESCE(SUM(CASE WHEN status = ? THEN 1 ELSE 0 END), 0) AS occupied,
               COALESCE(SUM(monthly_rent), 0.0) AS monthly_rent,
               SUM(sqft) AS sqft
        FROM stores
        WHERE property_id = ?
        "#,
    )
    .bind(UnitStatus::Occupied.as_str())
    .bind(property_id)
    .fetch_one(conn)
    .await?;

    Ok(UnitCounts {
        total: row.get("total"),
        occupied: row.get("occupied"),
        monthly_rent: row.get("monthly_rent"),
        sqft: row.get("sqft"),
    })
}
