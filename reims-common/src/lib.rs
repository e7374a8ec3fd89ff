//! # REIMS Common Library
//!
//! Shared code for the REIMS services:
//! - Error type used by every crate
//! - Bootstrap configuration (TOML) and root folder resolution
//! - Database initialization and schema
//! - Shared domain models (properties, units, documents)

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod models;

pub use error::{Error, Result};
pub use models::{DocumentStatus, DocumentType, UnitStatus};
