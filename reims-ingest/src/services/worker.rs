//! Document processing worker
//!
//! A single background task drains a bounded channel of document ids and
//! runs each through extraction (and rent roll import where applicable).
//! Jobs run one at a time. Nothing is retried: a failure marks the document
//! `failed` with its error message until it is reprocessed.

use reims_common::config::UnitCountPolicy;
use reims_common::db::get_setting_i64;
use reims_common::{DocumentStatus, DocumentType, Error, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::extractor::{declared_unit_count, extract_file, Extraction};
use super::importer::{import_rent_roll, ImportOutcome};
use super::rent_roll::{declared_unit_count_in_table, units_from_records};
use super::storage::ObjectStore;
use crate::db::{documents, extracted};

/// Used when the `ingest_queue_capacity` setting is missing
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// What processing one document produced
#[derive(Debug, Clone, Serialize)]
pub struct ProcessOutcome {
    pub document_id: Uuid,
    pub extraction_kind: String,
    pub metrics: usize,
    pub rent_roll: Option<ImportOutcome>,
}

/// Runs the processing steps for a single document
#[derive(Clone)]
pub struct Processor {
    db: SqlitePool,
    store: Arc<dyn ObjectStore>,
    unit_count_policy: UnitCountPolicy,
}

impl Processor {
    pub fn new(db: SqlitePool, store: Arc<dyn ObjectStore>, unit_count_policy: UnitCountPolicy) -> Self {
        Self {
            db,
            store,
            unit_count_policy,
        }
    }

    /// Process a document, recording the final status on the row.
    ///
    /// Documents already `completed` or `failed` are left alone; callers
    /// reset the status to `queued` to reprocess.
    pub async fn process(&self, id: Uuid) -> Result<Option<ProcessOutcome>> {
        let document = documents::get_document(&self.db, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Document {}", id)))?;

        if document.status.is_terminal() {
            tracing::debug!(document_id = %id, status = %document.status, "Skipping finished document");
            return Ok(None);
        }

        documents::update_status(&self.db, id, DocumentStatus::Processing, None).await?;
        tracing::info!(document_id = %id, filename = %document.original_filename, "Processing document");

        match self.run(&document).await {
            Ok(outcome) => {
                documents::update_status(&self.db, id, DocumentStatus::Completed, None).await?;
                tracing::info!(
                    document_id = %id,
                    kind = %outcome.extraction_kind,
                    metrics = outcome.metrics,
                    "Document processing completed"
                );
                Ok(Some(outcome))
            }
            Err(e) => {
                let message = e.to_string();
                documents::update_status(&self.db, id, DocumentStatus::Failed, Some(&message))
                    .await?;
                tracing::error!(document_id = %id, "Document processing failed: {}", message);
                Err(e)
            }
        }
    }

    async fn run(&self, document: &reims_common::models::Document) -> Result<ProcessOutcome> {
        let bytes = self.store.get(&document.object_key).await?;

        let suffix = Path::new(&document.original_filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_default();
        let mut temp = tempfile::Builder::new()
            .prefix("reims-")
            .suffix(&suffix)
            .tempfile()?;
        temp.write_all(&bytes)?;
        temp.flush()?;

        let content_type = document.content_type.clone();
        let doc_type = document.document_type;
        let extraction = tokio::task::spawn_blocking(move || {
            let result = extract_file(temp.path(), Some(&content_type), doc_type);
            drop(temp);
            result
        })
        .await
        .map_err(|e| Error::Internal(format!("Extraction task panicked: {}", e)))??;

        if let Extraction::Unsupported { reason } = &extraction {
            tracing::warn!(document_id = %document.id, "{}", reason);
        }

        let metrics = extracted::save_extraction(&self.db, document.id, &extraction).await?;

        let rent_roll = if doc_type == DocumentType::RentRoll {
            self.import_units(document, &extraction).await?
        } else {
            None
        };

        Ok(ProcessOutcome {
            document_id: document.id,
            extraction_kind: extraction.kind().to_string(),
            metrics,
            rent_roll,
        })
    }

    async fn import_units(
        &self,
        document: &reims_common::models::Document,
        extraction: &Extraction,
    ) -> Result<Option<ImportOutcome>> {
        let Some(property_id) = document.property_id else {
            tracing::warn!(
                document_id = %document.id,
                "Rent roll has no resolved property; units not imported"
            );
            return Ok(None);
        };

        match extraction {
            Extraction::Tabular(table) => {
                let units = units_from_records(table)?;
                let expected = declared_unit_count_in_table(table);
                let outcome =
                    import_rent_roll(&self.db, property_id, &units, expected, self.unit_count_policy)
                        .await?;
                for warning in &outcome.warnings {
                    tracing::warn!(document_id = %document.id, "{}", warning);
                }
                Ok(Some(outcome))
            }
            Extraction::PdfText { text, .. } => {
                tracing::info!(
                    document_id = %document.id,
                    declared_units = ?declared_unit_count(text),
                    "PDF rent roll stored as text; unit rows are imported from CSV or Excel only"
                );
                Ok(None)
            }
            Extraction::Unsupported { .. } => Ok(None),
        }
    }
}

/// Sending side of the processing queue
#[derive(Clone)]
pub struct JobQueue {
    sender: mpsc::Sender<Uuid>,
}

impl JobQueue {
    /// Wait for queue space and enqueue a document
    pub async fn enqueue(&self, id: Uuid) -> Result<()> {
        self.sender
            .send(id)
            .await
            .map_err(|_| Error::Internal("Processing worker has stopped".to_string()))?;
        tracing::debug!(document_id = %id, "Document enqueued");
        Ok(())
    }
}

/// Queue capacity from the settings table
pub async fn queue_capacity(db: &SqlitePool) -> Result<usize> {
    let value = get_setting_i64(db, "ingest_queue_capacity", DEFAULT_QUEUE_CAPACITY as i64).await?;
    Ok(usize::try_from(value).ok().filter(|c| *c > 0).unwrap_or(DEFAULT_QUEUE_CAPACITY))
}

/// Start the worker task. It exits once every [`JobQueue`] clone is dropped.
pub fn spawn_worker(processor: Processor, capacity: usize) -> (JobQueue, JoinHandle<()>) {
    let (sender, mut receiver) = mpsc::channel::<Uuid>(capacity.max(1));

    let handle = tokio::spawn(async move {
        tracing::info!(capacity, "Processing worker started");
        while let Some(id) = receiver.recv().await {
            // Failures are already recorded on the document row
            if let Err(e) = processor.process(id).await {
                tracing::debug!(document_id = %id, "Job ended with error: {}", e);
            }
        }
        tracing::info!("Processing worker stopped");
    });

    (JobQueue { sender }, handle)
}

/// Re-enqueue documents left `queued` or `processing` by a previous run
pub async fn recover_pending(db: &SqlitePool, queue: &JobQueue) -> Result<usize> {
    let ids = documents::ids_with_status(
        db,
        &[DocumentStatus::Processing, DocumentStatus::Queued],
    )
    .await?;

    for id in &ids {
        queue.enqueue(*id).await?;
    }

    if !ids.is_empty() {
        tracing::info!(count = ids.len(), "Re-enqueued unfinished documents");
    }
    Ok(ids.len())
}
