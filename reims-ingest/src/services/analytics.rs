//! Property and portfolio KPIs

use reims_common::models::Property;
use reims_common::Result;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::BTreeMap;

use crate::db::{documents, extracted, properties};

/// Metric consulted when a property has no recorded annual NOI
pub const NOI_METRIC: &str = "net_operating_income";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PropertyKpis {
    pub property_id: i64,
    pub name: String,
    pub total_units: i64,
    pub occupied_units: i64,
    pub occupancy_rate: f64,
    pub monthly_rent: f64,
    pub noi: f64,
    pub market_value: f64,
    /// Percent; None without a market value
    pub cap_rate: Option<f64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PortfolioSummary {
    pub property_count: usize,
    pub total_units: i64,
    pub occupied_units: i64,
    pub occupancy_rate: f64,
    pub total_noi: f64,
    pub total_market_value: f64,
    /// Mean over properties that have a cap rate
    pub average_cap_rate: Option<f64>,
    pub documents_by_status: BTreeMap<String, i64>,
    pub properties: Vec<PropertyKpis>,
}

/// NOI / market value as a percentage
pub fn cap_rate(noi: f64, market_value: f64) -> Option<f64> {
    if market_value > 0.0 {
        Some(noi / market_value * 100.0)
    } else {
        None
    }
}

pub async fn property_kpis(pool: &SqlitePool, property: &Property) -> Result<PropertyKpis> {
    let noi = if property.annual_noi != 0.0 {
        property.annual_noi
    } else {
        extracted::latest_property_metric(pool, property.id, NOI_METRIC)
            .await?
            .unwrap_or(0.0)
    };

    Ok(PropertyKpis {
        property_id: property.id,
        name: property.name.clone(),
        total_units: property.total_units,
        occupied_units: property.occupied_units,
        occupancy_rate: property.occupancy_rate,
        monthly_rent: property.monthly_rent,
        noi,
        market_value: property.market_value,
        cap_rate: cap_rate(noi, property.market_value),
    })
}

pub async fn portfolio_summary(pool: &SqlitePool) -> Result<PortfolioSummary> {
    let mut kpis = Vec::new();
    for property in properties::list_properties(pool).await? {
        kpis.push(property_kpis(pool, &property).await?);
    }

    let total_units: i64 = kpis.iter().map(|k| k.total_units).sum();
    let occupied_units: i64 = kpis.iter().map(|k| k.occupied_units).sum();
    let cap_rates: Vec<f64> = kpis.iter().filter_map(|k| k.cap_rate).collect();

    Ok(PortfolioSummary {
        property_count: kpis.len(),
        total_units,
        occupied_units,
        occupancy_rate: if total_units > 0 {
            occupied_units as f64 / total_units as f64 * 100.0
        } else {
            0.0
        },
        total_noi: kpis.iter().map(|k| k.noi).sum(),
        total_market_value: kpis.iter().map(|k| k.market_value).sum(),
        average_cap_rate: if cap_rates.is_empty() {
            None
        } else {
            Some(cap_rates.iter().sum::<f64>() / cap_rates.len() as f64)
        },
        documents_by_status: documents::count_by_status(pool).await?,
        properties: kpis,
    })
}
