//! Portfolio analytics endpoint

use axum::{extract::State, routing::get, Json, Router};

use crate::services::analytics::{portfolio_summary, PortfolioSummary};
use crate::{ApiResult, AppState};

/// GET /api/analytics
pub async fn get_analytics(State(state): State<AppState>) -> ApiResult<Json<PortfolioSummary>> {
    Ok(Json(portfolio_summary(&state.db).await?))
}

pub fn analytics_routes() -> Router<AppState> {
    Router::new().route("/api/analytics", get(get_analytics))
}
