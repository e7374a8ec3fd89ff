//! Document upload, listing and reprocessing endpoints

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use reims_common::models::{Document, ExtractedMetric};
use reims_common::DocumentStatus;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::documents::{self, DocumentFilter};
use crate::db::extracted;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub property: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DocumentDetail {
    pub document: Document,
    /// Kind of the latest extraction, absent before first processing
    pub extraction_kind: Option<String>,
    pub metrics: Vec<ExtractedMetric>,
}

fn parse_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("Invalid document id: {}", raw)))
}

async fn load_document(state: &AppState, id: Uuid) -> ApiResult<Document> {
    documents::get_document(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Document {}", id)))
}

/// GET /api/documents
pub async fn list_documents(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Document>>> {
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::parse::<DocumentStatus>)
        .transpose()?;

    let filter = DocumentFilter {
        status,
        property: query.property.filter(|p| !p.trim().is_empty()),
    };
    Ok(Json(documents::list_documents(&state.db, &filter).await?))
}

struct Upload {
    filename: String,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

/// POST /api/documents
///
/// Multipart form with a `file` part and an optional `property` text part.
/// Responds 202 once the file is stored and queued for processing.
pub async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Document>)> {
    let mut upload = None;
    let mut property = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {}", e)))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| ApiError::BadRequest("File part has no filename".to_string()))?;
                let content_type = field
                    .content_type()
                    .map(str::to_string)
                    .filter(|c| c != "application/octet-stream");
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?;
                upload = Some(Upload {
                    filename,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            Some("property") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read property: {}", e)))?;
                property = Some(text);
            }
            other => {
                tracing::debug!(field = ?other, "Ignoring unexpected multipart field");
            }
        }
    }

    let upload = upload.ok_or_else(|| ApiError::BadRequest("Missing `file` part".to_string()))?;

    let document = state
        .ingestor
        .ingest(
            &upload.filename,
            &upload.bytes,
            upload.content_type.as_deref(),
            property.as_deref(),
        )
        .await?;
    state.queue.enqueue(document.id).await?;

    Ok((StatusCode::ACCEPTED, Json(document)))
}

/// GET /api/documents/:id
pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DocumentDetail>> {
    let id = parse_id(&id)?;
    let document = load_document(&state, id).await?;
    let extraction_kind = extracted::latest_extraction(&state.db, id)
        .await?
        .map(|e| e.kind().to_string());
    let metrics = extracted::list_metrics(&state.db, id).await?;

    Ok(Json(DocumentDetail {
        document,
        extraction_kind,
        metrics,
    }))
}

/// GET /api/documents/:id/metrics
pub async fn get_metrics(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<ExtractedMetric>>> {
    let id = parse_id(&id)?;
    load_document(&state, id).await?;
    Ok(Json(extracted::list_metrics(&state.db, id).await?))
}

/// POST /api/documents/:id/reprocess
pub async fn reprocess_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<(StatusCode, Json<Document>)> {
    let id = parse_id(&id)?;
    let document = load_document(&state, id).await?;

    if !document.status.is_terminal() {
        return Err(ApiError::Conflict(format!(
            "Document {} is already {}",
            id, document.status
        )));
    }

    documents::update_status(&state.db, id, DocumentStatus::Queued, None).await?;
    state.queue.enqueue(id).await?;
    tracing::info!(document_id = %id, previous = %document.status, "Document requeued");

    let document = load_document(&state, id).await?;
    Ok((StatusCode::ACCEPTED, Json(document)))
}

/// Build document routes
pub fn document_routes() -> Router<AppState> {
    Router::new()
        .route("/api/documents", get(list_documents).post(upload_document))
        .route("/api/documents/:id", get(get_document))
        .route("/api/documents/:id/metrics", get(get_metrics))
        .route("/api/documents/:id/reprocess", post(reprocess_document))
}
