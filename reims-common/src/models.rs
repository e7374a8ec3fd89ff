//! Shared domain models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::Error;

/// Closed set of document kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    BalanceSheet,
    IncomeStatement,
    CashFlowStatement,
    RentRoll,
    Other,
}

impl DocumentType {
    pub const ALL: [DocumentType; 5] = [
        DocumentType::BalanceSheet,
        DocumentType::IncomeStatement,
        DocumentType::CashFlowStatement,
        DocumentType::RentRoll,
        DocumentType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::BalanceSheet => "balance_sheet",
            DocumentType::IncomeStatement => "income_statement",
            DocumentType::CashFlowStatement => "cash_flow_statement",
            DocumentType::RentRoll => "rent_roll",
            DocumentType::Other => "other",
        }
    }

    /// Financial statements and rent rolls get a `financial_documents` row
    pub fn is_financial(&self) -> bool {
        !matches!(self, DocumentType::Other)
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DocumentType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown document type: {}", s)))
    }
}

/// Processing lifecycle of an uploaded document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Queued => "queued",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Completed => "completed",
            DocumentStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentStatus::Completed | DocumentStatus::Failed)
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(DocumentStatus::Queued),
            "processing" => Ok(DocumentStatus::Processing),
            "completed" => Ok(DocumentStatus::Completed),
            "failed" => Ok(DocumentStatus::Failed),
            other => Err(Error::InvalidInput(format!("Unknown document status: {}", other))),
        }
    }
}

/// Occupancy status of a single unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    Occupied,
    #[default]
    Vacant,
    UnderLease,
    Maintenance,
}

impl UnitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitStatus::Occupied => "occupied",
            UnitStatus::Vacant => "vacant",
            UnitStatus::UnderLease => "under_lease",
            UnitStatus::Maintenance => "maintenance",
        }
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnitStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "occupied" => Ok(UnitStatus::Occupied),
            "vacant" => Ok(UnitStatus::Vacant),
            "under_lease" => Ok(UnitStatus::UnderLease),
            "maintenance" => Ok(UnitStatus::Maintenance),
            other => Err(Error::InvalidInput(format!("Unknown unit status: {}", other))),
        }
    }
}

/// Managed real-estate asset
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Property {
    pub id: i64,
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub total_sqft: f64,
    pub total_units: i64,
    pub occupied_units: i64,
    /// Percentage, derived from `occupied_units / total_units`
    pub occupancy_rate: f64,
    pub monthly_rent: f64,
    pub annual_noi: f64,
    pub market_value: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted when creating a property
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewProperty {
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zip_code: Option<String>,
    #[serde(default)]
    pub total_sqft: f64,
    #[serde(default)]
    pub annual_noi: f64,
    #[serde(default)]
    pub market_value: f64,
}

/// One leasable space as parsed from a rent roll
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UnitRecord {
    #[serde(default)]
    pub unit_number: String,
    #[serde(default)]
    pub tenant_name: Option<String>,
    #[serde(default)]
    pub status: UnitStatus,
    #[serde(default)]
    pub sqft: Option<f64>,
    #[serde(default)]
    pub monthly_rent: Option<f64>,
    #[serde(default)]
    pub lease_start: Option<NaiveDate>,
    #[serde(default)]
    pub lease_end: Option<NaiveDate>,
}

/// Persisted unit row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Unit {
    pub id: i64,
    pub property_id: i64,
    #[serde(flatten)]
    pub record: UnitRecord,
}

/// Uploaded file and its processing state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: Uuid,
    pub original_filename: String,
    pub bucket: String,
    pub object_key: String,
    pub content_type: String,
    pub file_size: i64,
    pub sha256: String,
    pub uploaded_at: DateTime<Utc>,
    pub status: DocumentStatus,
    pub error_message: Option<String>,
    pub property_id: Option<i64>,
    pub property_name: Option<String>,
    pub document_year: i32,
    pub document_type: DocumentType,
    /// `YYYY-MM` when the filename names a month
    pub period: Option<String>,
}

/// Single named numeric value pulled out of a document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractedMetric {
    pub document_id: Uuid,
    pub metric_name: String,
    pub metric_value: f64,
    pub created_at: DateTime<Utc>,
}
