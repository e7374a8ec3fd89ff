//! Property persistence

use reims_common::models::{NewProperty, Property};
use reims_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use super::{now_rfc3339, parse_timestamp};

const PROPERTY_COLUMNS: &str = r#"
    id, name, address, city, state, zip_code, total_sqft, total_units,
    occupied_units, occupancy_rate, monthly_rent, annual_noi, market_value,
    created_at, updated_at
"#;

fn property_from_row(row: &SqliteRow) -> Result<Property> {
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(Property {
        id: row.get("id"),
        name: row.get("name"),
        address: row.get("address"),
        city: row.get("city"),
        state: row.get("state"),
        zip_code: row.get("zip_code"),
        total_sqft: row.get("total_sqft"),
        total_units: row.get("total_units"),
        occupied_units: row.get("occupied_units"),
        occupancy_rate: row.get("occupancy_rate"),
        monthly_rent: row.get("monthly_rent"),
        annual_noi: row.get("annual_noi"),
        market_value: row.get("market_value"),
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

/// Insert a property; names are unique
pub async fn create_property(pool: &SqlitePool, new: &NewProperty) -> Result<Property> {
    let name = new.name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("Property name must not be empty".to_string()));
    }

    let now = now_rfc3339();
    let result = sqlx::query(
        r#"
        INSERT INTO properties (
            name, address, city, state, zip_code, total_sqft,
            annual_noi, market_value, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(name)
    .bind(&new.address)
    .bind(&new.city)
    .bind(&new.state)
    .bind(&new.zip_code)
    .bind(new.total_sqft)
    .bind(new.annual_noi)
    .bind(new.market_value)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await;

    let id = match result {
        Ok(done) => done.last_insert_rowid(),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            return Err(Error::InvalidInput(format!("Property already exists: {}", name)));
        }
        Err(e) => return Err(e.into()),
    };

    get_property(pool, id)
        .await?
        .ok_or_else(|| Error::Internal(format!("Property {} vanished after insert", id)))
}

pub async fn get_property(pool: &SqlitePool, id: i64) -> Result<Option<Property>> {
    let sql = format!("SELECT {} FROM properties WHERE id = ?", PROPERTY_COLUMNS);
    let row = sqlx::query(&sql).bind(id).fetch_optional(pool).await?;
    row.as_ref().map(property_from_row).transpose()
}

pub async fn find_property_by_name(pool: &SqlitePool, name: &str) -> Result<Option<Property>> {
    let sql = format!(
        "SELECT {} FROM properties WHERE name = ? COLLATE NOCASE",
        PROPERTY_COLUMNS
    );
    let row = sqlx::query(&sql).bind(name).fetch_optional(pool).await?;
    row.as_ref().map(property_from_row).transpose()
}

pub async fn list_properties(pool: &SqlitePool) -> Result<Vec<Property>> {
    let sql = format!("SELECT {} FROM properties ORDER BY name", PROPERTY_COLUMNS);
    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    rows.iter().map(property_from_row).collect()
}

/// Id of the named property, creating a bare record if none exists
pub async fn ensure_property(pool: &SqlitePool, name: &str) -> Result<i64> {
    if let Some(existing) = find_property_by_name(pool, name).await? {
        return Ok(existing.id);
    }

    let now = now_rfc3339();
    sqlx::query(
        "INSERT OR IGNORE INTO properties (name, created_at, updated_at) VALUES (?, ?, ?)",
    )
    .bind(name)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    tracing::info!(property = %name, "Created property record from document metadata");

    find_property_by_name(pool, name)
        .await?
        .map(|p| p.id)
        .ok_or_else(|| Error::Internal(format!("Property '{}' missing after insert", name)))
}

pub async fn property_exists(conn: &mut SqliteConnection, id: i64) -> Result<bool> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM properties WHERE id = ?)")
        .bind(id)
        .fetch_one(conn)
        .await?;
    Ok(exists)
}

pub async fn property_ids(pool: &SqlitePool) -> Result<Vec<i64>> {
    let ids = sqlx::query_scalar("SELECT id FROM properties ORDER BY id")
        .fetch_all(pool)
        .await?;
    Ok(ids)
}

/// Values written by the unit recompute
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PropertyAggregates {
    pub total_units: i64,
    pub occupied_units: i64,
    pub occupancy_rate: f64,
    pub monthly_rent: f64,
    /// Only written when at least one unit reports its area
    pub total_sqft: Option<f64>,
}

/// Overwrite the unit-derived columns of a property
pub async fn write_aggregates(
    conn: &mut SqliteConnection,
    property_id: i64,
    aggregates: &PropertyAggregates,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE properties SET
            total_units = ?,
            occupied_units = ?,
            occupancy_rate = ?,
            monthly_rent = ?,
            total_sqft = COALESCE(?, total_sqft),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(aggregates.total_units)
    .bind(aggregates.occupied_units)
    .bind(aggregates.occupancy_rate)
    .bind(aggregates.monthly_rent)
    .bind(aggregates.total_sqft)
    .bind(now_rfc3339())
    .bind(property_id)
    .execute(conn)
    .await?;

    Ok(())
}
