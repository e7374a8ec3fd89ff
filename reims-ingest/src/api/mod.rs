//! HTTP API handlers for reims-ingest

pub mod analytics;
pub mod documents;
pub mod health;
pub mod properties;
pub mod reconcile;

pub use analytics::analytics_routes;
pub use documents::document_routes;
pub use health::health_routes;
pub use properties::property_routes;
pub use reconcile::reconcile_routes;
