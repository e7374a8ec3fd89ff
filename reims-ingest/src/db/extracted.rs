//! Extraction results: `extracted_data` payloads and `extracted_metrics`

use reims_common::models::ExtractedMetric;
use reims_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{now_rfc3339, parse_timestamp};
use crate::services::extractor::Extraction;

/// Store one extraction and replace the document's metrics.
///
/// Runs in a single transaction; old metrics for the document are removed
/// before the new set is written.
pub async fn save_extraction(
    pool: &SqlitePool,
    document_id: Uuid,
    extraction: &Extraction,
) -> Result<usize> {
    let payload = serde_json::to_string(extraction)
        .map_err(|e| Error::Internal(format!("Serialize extraction: {}", e)))?;
    let metrics = extraction.metrics();
    let metrics_json = serde_json::to_string(&metrics)
        .map_err(|e| Error::Internal(format!("Serialize metrics: {}", e)))?;
    let now = now_rfc3339();
    let id = document_id.to_string();

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO extracted_data (document_id, extraction_kind, payload, metrics, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(extraction.kind())
    .bind(&payload)
    .bind(&metrics_json)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM extracted_metrics WHERE document_id = ?")
        .bind(&id)
        .execute(&mut *tx)
        .await?;

    for (name, value) in &metrics {
        sqlx::query(
            r#"
            INSERT INTO extracted_metrics (document_id, metric_name, metric_value, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(name)
        .bind(value)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::debug!(
        document_id = %document_id,
        kind = extraction.kind(),
        metrics = metrics.len(),
        "Saved extraction"
    );
    Ok(metrics.len())
}

pub async fn list_metrics(pool: &SqlitePool, document_id: Uuid) -> Result<Vec<ExtractedMetric>> {
    let rows = sqlx::query(
        r#"
        SELECT metric_name, metric_value, created_at
        FROM extracted_metrics
        WHERE document_id = ?
        ORDER BY metric_name
        "#,
    )
    .bind(document_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let created_at: String = row.get("created_at");
            Ok(ExtractedMetric {
                document_id,
                metric_name: row.get("metric_name"),
                metric_value: row.get("metric_value"),
                created_at: parse_timestamp("created_at", &created_at)?,
            })
        })
        .collect()
}

/// Most recent value of a metric across a property's documents
pub async fn latest_property_metric(
    pool: &SqlitePool,
    property_id: i64,
    metric_name: &str,
) -> Result<Option<f64>> {
    let value = sqlx::query_scalar(
        r#"
        SELECT m.metric_value
        FROM extracted_metrics m
        JOIN documents d ON d.id = m.document_id
        WHERE d.property_id = ? AND m.metric_name = ?
        ORDER BY d.document_year DESC, COALESCE(d.period, '') DESC, m.created_at DESC
        LIMIT 1
        "#,
    )
    .bind(property_id)
    .bind(metric_name)
    .fetch_optional(pool)
    .await?;

    Ok(value)
}

/// Latest stored extraction for a document
pub async fn latest_extraction(pool: &SqlitePool, document_id: Uuid) -> Result<Option<Extraction>> {
    let payload: Option<String> = sqlx::query_scalar(
        r#"
        SELECT payload FROM extracted_data
        WHERE document_id = ?
        ORDER BY id DESC
        LIMIT 1
        "#,
    )
    .bind(document_id.to_string())
    .fetch_optional(pool)
    .await?;

    payload
        .map(|p| {
            serde_json::from_str(&p)
                .map_err(|e| Error::Internal(format!("Corrupt extraction payload: {}", e)))
        })
        .transpose()
}
