//! Document ingestion
//!
//! Turns an uploaded file into a stored object plus a `queued` document row.
//! Extraction happens later in the processing worker.

use chrono::{Datelike, Utc};
use reims_common::models::Document;
use reims_common::{DocumentStatus, DocumentType, Error, Result};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use super::classifier::classify_document;
use super::filename_parser::{extract_period, extract_year, PropertyAliases};
use super::storage::{numbered_filename, object_key, validate_key, ObjectStore};
use crate::db::{documents, properties};

/// Upper bound on `name (N).ext` variants tried for one upload
const MAX_KEY_COPIES: usize = 100;

/// Classifies, names, stores and records uploaded documents
#[derive(Clone)]
pub struct Ingestor {
    db: SqlitePool,
    store: Arc<dyn ObjectStore>,
    aliases: Arc<PropertyAliases>,
}

impl Ingestor {
    pub fn new(db: SqlitePool, store: Arc<dyn ObjectStore>, aliases: Arc<PropertyAliases>) -> Self {
        Self { db, store, aliases }
    }

    /// Store `bytes` and create its document row.
    ///
    /// `property_override` takes precedence over the property guessed from
    /// the filename; it is itself passed through the alias table so an
    /// abbreviation resolves to the canonical name.
    pub async fn ingest(
        &self,
        filename: &str,
        bytes: &[u8],
        content_type: Option<&str>,
        property_override: Option<&str>,
    ) -> Result<Document> {
        let filename = Path::new(filename.trim())
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        if filename.is_empty() {
            return Err(Error::InvalidInput("Upload has no filename".to_string()));
        }
        if bytes.is_empty() {
            return Err(Error::InvalidInput(format!("Upload '{}' is empty", filename)));
        }

        let document_type = classify_document(&filename);
        let document_year = extract_year(&filename, Utc::now().year());
        let period = extract_period(&filename, document_year);
        let property_name = match property_override.map(str::trim).filter(|p| !p.is_empty()) {
            Some(name) => Some(self.aliases.resolve(name).unwrap_or_else(|| name.to_string())),
            None => self.aliases.resolve(&filename),
        };

        let sha256 = format!("{:x}", Sha256::digest(bytes));
        let duplicates = documents::find_by_sha256(&self.db, &sha256).await?;
        if !duplicates.is_empty() {
            tracing::warn!(
                filename = %filename,
                sha256 = %sha256,
                existing = duplicates.len(),
                "Uploaded file duplicates existing document content"
            );
        }

        let key = object_key(property_name.as_deref(), document_year, document_type, &filename);
        if validate_key(&key).is_err() {
            return Err(Error::InvalidInput(format!(
                "Property {:?} cannot be used as a storage path",
                property_name.as_deref().unwrap_or_default()
            )));
        }

        let (key, created) = self
            .claim_key(
                property_name.as_deref(),
                document_year,
                document_type,
                &filename,
                &sha256,
                bytes,
            )
            .await?;

        let property_id = match &property_name {
            Some(name) => Some(properties::ensure_property(&self.db, name).await?),
            None => None,
        };

        let document = Document {
            id: Uuid::new_v4(),
            original_filename: filename.clone(),
            bucket: self.store.bucket().to_string(),
            object_key: key,
            content_type: content_type
                .map(str::to_string)
                .unwrap_or_else(|| guess_content_type(&filename, bytes)),
            file_size: bytes.len() as i64,
            sha256,
            uploaded_at: Utc::now(),
            status: DocumentStatus::Queued,
            error_message: None,
            property_id,
            property_name,
            document_year,
            document_type,
            period,
        };

        if let Err(e) = documents::insert_document(&self.db, &document).await {
            // An object reused from an earlier upload still belongs to that document
            if created {
                if let Err(cleanup) = self.store.delete(&document.object_key).await {
                    tracing::warn!(key = %document.object_key, "Failed to remove orphaned object: {}", cleanup);
                }
            }
            return Err(e);
        }

        if document.document_type.is_financial() {
            documents::insert_financial_document(&self.db, &document).await?;
        }

        tracing::info!(
            document_id = %document.id,
            filename = %document.original_filename,
            document_type = %document.document_type,
            year = document.document_year,
            property = document.property_name.as_deref().unwrap_or("-"),
            key = %document.object_key,
            "Document ingested"
        );

        Ok(document)
    }

    /// Find the key this upload is stored under.
    ///
    /// A free key is written and reported as created. A key already holding
    /// identical bytes is reused as is. A key holding different bytes is
    /// never overwritten; the filename gets a ` (N)` suffix instead.
    async fn claim_key(
        &self,
        property: Option<&str>,
        year: i32,
        doc_type: DocumentType,
        filename: &str,
        sha256: &str,
        bytes: &[u8],
    ) -> Result<(String, bool)> {
        for copy in 1..=MAX_KEY_COPIES {
            let key = object_key(property, year, doc_type, &numbered_filename(filename, copy));

            if !self.store.exists(&key).await? {
                self.store.put(&key, bytes).await?;
                return Ok((key, true));
            }

            let existing = self.store.get(&key).await?;
            if format!("{:x}", Sha256::digest(&existing)) == sha256 {
                tracing::debug!(key = %key, "Reusing stored object with identical content");
                return Ok((key, false));
            }
        }

        Err(Error::Storage(format!(
            "No free object key for '{}' after {} attempts",
            filename, MAX_KEY_COPIES
        )))
    }
}

/// Content type from the extension, then from magic bytes
pub fn guess_content_type(filename: &str, bytes: &[u8]) -> String {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    let by_extension = match extension.as_deref() {
        Some("pdf") => Some("application/pdf"),
        Some("csv") => Some("text/csv"),
        Some("xlsx") => Some("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
        Some("xls") => Some("application/vnd.ms-excel"),
        Some("ods") => Some("application/vnd.oasis.opendocument.spreadsheet"),
        _ => None,
    };

    by_extension
        .map(str::to_string)
        .or_else(|| infer::get(bytes).map(|k| k.mime_type().to_string()))
        .unwrap_or_else(|| "application/octet-stream".to_string())
}
