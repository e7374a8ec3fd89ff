//! Property, unit and rent roll endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use reims_common::models::{NewProperty, Property, Unit, UnitRecord};
use serde::{Deserialize, Serialize};

use crate::db::{properties, units};
use crate::services::analytics::{property_kpis, PropertyKpis};
use crate::services::importer::{import_rent_roll, recompute_all, ImportOutcome};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Serialize)]
pub struct PropertyDetail {
    pub property: Property,
    pub kpis: PropertyKpis,
}

/// POST /api/properties/:id/rent-roll body
#[derive(Debug, Deserialize)]
pub struct RentRollRequest {
    pub units: Vec<UnitRecord>,
    /// Unit count the source document declares, if known
    #[serde(default)]
    pub expected_units: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct RecomputeResponse {
    pub properties_updated: usize,
}

/// GET /api/properties
pub async fn list_properties(State(state): State<AppState>) -> ApiResult<Json<Vec<Property>>> {
    Ok(Json(properties::list_properties(&state.db).await?))
}

/// POST /api/properties
pub async fn create_property(
    State(state): State<AppState>,
    Json(new): Json<NewProperty>,
) -> ApiResult<(StatusCode, Json<Property>)> {
    if properties::find_property_by_name(&state.db, new.name.trim())
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict(format!(
            "Property already exists: {}",
            new.name.trim()
        )));
    }

    let property = properties::create_property(&state.db, &new).await?;
    tracing::info!(property_id = property.id, name = %property.name, "Property created");
    Ok((StatusCode::CREATED, Json(property)))
}

async fn load_property(state: &AppState, id: i64) -> ApiResult<Property> {
    properties::get_property(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Property {}", id)))
}

/// GET /api/properties/:id
pub async fn get_property(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<PropertyDetail>> {
    let property = load_property(&state, id).await?;
    let kpis = property_kpis(&state.db, &property).await?;
    Ok(Json(PropertyDetail { property, kpis }))
}

/// GET /api/properties/:id/units
pub async fn list_units(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<Unit>>> {
    load_property(&state, id).await?;
    Ok(Json(units::list_units(&state.db, id).await?))
}

/// POST /api/properties/:id/rent-roll
pub async fn import_units(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<RentRollRequest>,
) -> ApiResult<Json<ImportOutcome>> {
    let outcome = import_rent_roll(
        &state.db,
        id,
        &request.units,
        request.expected_units,
        state.config.rent_roll.unit_count_policy,
    )
    .await?;
    Ok(Json(outcome))
}

/// POST /api/properties/recompute
pub async fn recompute(State(state): State<AppState>) -> ApiResult<Json<RecomputeResponse>> {
    let properties_updated = recompute_all(&state.db).await?;
    Ok(Json(RecomputeResponse { properties_updated }))
}

/// Build property routes
pub fn property_routes() -> Router<AppState> {
    Router::new()
        .route("/api/properties", get(list_properties).post(create_property))
        .route("/api/properties/recompute", post(recompute))
        .route("/api/properties/:id", get(get_property))
        .route("/api/properties/:id/units", get(list_units))
        .route("/api/properties/:id/rent-roll", post(import_units))
}
