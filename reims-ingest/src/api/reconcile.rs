//! Storage/database consistency endpoint

use axum::{extract::State, routing::get, Json, Router};

use crate::services::reconciler::{reconcile, ReconcileReport};
use crate::{ApiResult, AppState};

/// GET /api/reconcile
pub async fn get_reconcile(State(state): State<AppState>) -> ApiResult<Json<ReconcileReport>> {
    Ok(Json(reconcile(&state.db, state.store.as_ref()).await?))
}

pub fn reconcile_routes() -> Router<AppState> {
    Router::new().route("/api/reconcile", get(get_reconcile))
}
