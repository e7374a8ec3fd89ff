//! Document persistence
//!
//! `documents` holds one row per uploaded file. `financial_documents` is the
//! companion index for statements and rent rolls, keyed by document id.

use reims_common::models::Document;
use reims_common::{DocumentStatus, Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::{now_rfc3339, parse_timestamp};

const DOCUMENT_COLUMNS: &str = r#"
    id, original_filename, bucket, object_key, content_type, file_size,
    sha256, uploaded_at, status, error_message, property_id, property_name,
    document_year, document_type, period
"#;

fn document_from_row(row: &SqliteRow) -> Result<Document> {
    let id: String = row.get("id");
    let uploaded_at: String = row.get("uploaded_at");
    let status: String = row.get("status");
    let document_type: String = row.get("document_type");
    let document_year: i64 = row.get("document_year");

    Ok(Document {
        id: Uuid::parse_str(&id)
            .map_err(|e| Error::Internal(format!("Invalid document id '{}': {}", id, e)))?,
        original_filename: row.get("original_filename"),
        bucket: row.get("bucket"),
        object_key: row.get("object_key"),
        content_type: row.get("content_type"),
        file_size: row.get("file_size"),
        sha256: row.get("sha256"),
        uploaded_at: parse_timestamp("uploaded_at", &uploaded_at)?,
        status: status.parse()?,
        error_message: row.get("error_message"),
        property_id: row.get("property_id"),
        property_name: row.get("property_name"),
        document_year: document_year as i32,
        document_type: document_type.parse()?,
        period: row.get("period"),
    })
}

pub async fn insert_document(pool: &SqlitePool, doc: &Document) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO documents (
            id, original_filename, bucket, object_key, content_type, file_size,
            sha256, uploaded_at, status, error_message, property_id, property_name,
            document_year, document_type, period, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(doc.id.to_string())
    .bind(&doc.original_filename)
    .bind(&doc.bucket)
    .bind(&doc.object_key)
    .bind(&doc.content_type)
    .bind(doc.file_size)
    .bind(&doc.sha256)
    .bind(doc.uploaded_at.to_rfc3339())
    .bind(doc.status.as_str())
    .bind(&doc.error_message)
    .bind(doc.property_id)
    .bind(&doc.property_name)
    .bind(doc.document_year as i64)
    .bind(doc.document_type.as_str())
    .bind(&doc.period)
    .bind(now_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_document(pool: &SqlitePool, id: Uuid) -> Result<Option<Document>> {
    let sql = format!("SELECT {} FROM documents WHERE id = ?", DOCUMENT_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(document_from_row).transpose()
}

/// Optional filters for [`list_documents`]
#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    pub status: Option<DocumentStatus>,
    /// Matches `property_name` case-insensitively
    pub property: Option<String>,
}

/// Newest first
pub async fn list_documents(pool: &SqlitePool, filter: &DocumentFilter) -> Result<Vec<Document>> {
    let sql = format!(
        r#"
        SELECT {} FROM documents
        WHERE (?1 IS NULL OR status = ?1)
          AND (?2 IS NULL OR property_name = ?2 COLLATE NOCASE)
        ORDER BY uploaded_at DESC
        "#,
        DOCUMENT_COLUMNS
    );

    let rows = sqlx::query(&sql)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.property.as_deref())
        .fetch_all(pool)
        .await?;

    rows.iter().map(document_from_row).collect()
}

/// Set status and error message; a successful transition clears the message
pub async fn update_status(
    pool: &SqlitePool,
    id: Uuid,
    status: DocumentStatus,
    error_message: Option<&str>,
) -> Result<()> {
    let done = sqlx::query(
        "UPDATE documents SET status = ?, error_message = ?, updated_at = ? WHERE id = ?",
    )
    .bind(status.as_str())
    .bind(error_message)
    .bind(now_rfc3339())
    .bind(id.to_string())
    .execute(pool)
    .await?;

    if done.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Document {}", id)));
    }

    tracing::debug!(document_id = %id, status = %status, "Document status updated");
    Ok(())
}

/// Documents already stored with the same content hash
pub async fn find_by_sha256(pool: &SqlitePool, sha256: &str) -> Result<Vec<Uuid>> {
    let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM documents WHERE sha256 = ?")
        .bind(sha256)
        .fetch_all(pool)
        .await?;

    Ok(ids.iter().filter_map(|id| Uuid::parse_str(id).ok()).collect())
}

/// Oldest first, so recovered jobs run in upload order
pub async fn ids_with_status(pool: &SqlitePool, statuses: &[DocumentStatus]) -> Result<Vec<Uuid>> {
    let mut ids = Vec::new();
    for status in statuses {
        let rows: Vec<String> = sqlx::query_scalar(
            "SELECT id FROM documents WHERE status = ? ORDER BY uploaded_at",
        )
        .bind(status.as_str())
        .fetch_all(pool)
        .await?;
        ids.extend(rows.iter().filter_map(|id| Uuid::parse_str(id).ok()));
    }
    Ok(ids)
}

/// `(document id, object key)` for every document in a bucket
pub async fn object_keys(pool: &SqlitePool, bucket: &str) -> Result<Vec<(Uuid, String)>> {
    let rows = sqlx::query("SELECT id, object_key FROM documents WHERE bucket = ? ORDER BY object_key")
        .bind(bucket)
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .filter_map(|row| {
            let id: String = row.get("id");
            let key: String = row.get("object_key");
            Uuid::parse_str(&id).ok().map(|id| (id, key))
        })
        .collect())
}

pub async fn count_by_status(pool: &SqlitePool) -> Result<BTreeMap<String, i64>> {
    let rows = sqlx::query("SELECT status, COUNT(*) AS n FROM documents GROUP BY status")
        .fetch_all(pool)
        .await?;

    let mut counts: BTreeMap<String, i64> = [
        DocumentStatus::Queued,
        DocumentStatus::Processing,
        DocumentStatus::Completed,
        DocumentStatus::Failed,
    ]
    .iter()
    .map(|s| (s.as_str().to_string(), 0))
    .collect();

    for row in rows {
        counts.insert(row.get("status"), row.get("n"));
    }
    Ok(counts)
}

/// Index a financial statement or rent roll in `financial_documents`
pub async fn insert_financial_document(pool: &SqlitePool, doc: &Document) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO financial_documents (
            document_id, property_id, document_type, fiscal_year, period, created_at
        ) VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(document_id) DO UPDATE SET
            property_id = excluded.property_id,
            document_type = excluded.document_type,
            fiscal_year = excluded.fiscal_year,
            period = excluded.period
        "#,
    )
    .bind(doc.id.to_string())
    .bind(doc.property_id)
    .bind(doc.document_type.as_str())
    .bind(doc.document_year as i64)
    .bind(&doc.period)
    .bind(now_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Number of `financial_documents` rows for a property
pub async fn count_financial_documents(pool: &SqlitePool, property_id: i64) -> Result<i64> {
    let n = sqlx::query_scalar("SELECT COUNT(*) FROM financial_documents WHERE property_id = ?")
        .bind(property_id)
        .fetch_one(pool)
        .await?;
    Ok(n)
}
