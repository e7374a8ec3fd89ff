//! Object storage
//!
//! Uploaded files live in a bucket under `{Property}/{Year}/{doc_type}/{filename}`.
//! Older uploads used `properties/{property_id}/{uuid}_{filename}`; both
//! layouts are recognised when reading keys back.
//!
//! Backends implement [`ObjectStore`]. The local backend keeps one directory
//! per bucket on disk (the same tree MinIO exposes); the S3 backend talks to
//! MinIO or AWS and is compiled with the `s3` feature.

mod local;
#[cfg(feature = "s3")]
mod s3;

pub use local::LocalObjectStore;
#[cfg(feature = "s3")]
pub use s3::S3ObjectStore;

use async_trait::async_trait;
use reims_common::config::{StorageBackend, StorageConfig};
use reims_common::{DocumentType, Error, Result};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Property segment used when no property could be resolved
pub const UNASSIGNED_PROPERTY: &str = "Unassigned";

/// Minimal object storage contract used by ingestion and reconciliation
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Bucket this store reads and writes
    fn bucket(&self) -> &str;

    /// Write `content` at `key`, replacing any existing object
    async fn put(&self, key: &str, content: &[u8]) -> Result<()>;

    /// Read the object at `key`
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    async fn exists(&self, key: &str) -> Result<bool>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// All keys starting with `prefix` (empty prefix lists the bucket)
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Build the configured backend
pub async fn build_object_store(
    config: &StorageConfig,
    local_root: &Path,
) -> Result<Arc<dyn ObjectStore>> {
    match config.backend {
        StorageBackend::Local => {
            let store = LocalObjectStore::new(local_root, &config.bucket)?;
            tracing::info!(
                bucket = %config.bucket,
                path = %local_root.display(),
                "Using local object storage"
            );
            Ok(Arc::new(store))
        }
        #[cfg(feature = "s3")]
        StorageBackend::S3 => {
            let store = S3ObjectStore::connect(config).await?;
            tracing::info!(
                bucket = %config.bucket,
                endpoint = config.endpoint.as_deref().unwrap_or("aws"),
                "Using S3 object storage"
            );
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "s3"))]
        StorageBackend::S3 => Err(Error::Config(
            "S3 storage backend requires building with the `s3` feature".to_string(),
        )),
    }
}

/// Object key for a newly uploaded document
pub fn object_key(
    property: Option<&str>,
    year: i32,
    doc_type: DocumentType,
    filename: &str,
) -> String {
    let property = property
        .map(sanitize_segment)
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| UNASSIGNED_PROPERTY.to_string());

    format!(
        "{}/{}/{}/{}",
        property,
        year,
        doc_type.as_str(),
        sanitize_segment(filename)
    )
}

/// `Rent Roll.csv` → `Rent Roll (2).csv`; copy 1 is the name itself
pub fn numbered_filename(filename: &str, copy: usize) -> String {
    if copy <= 1 {
        return filename.to_string();
    }
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
            format!("{} ({}).{}", stem, copy, ext)
        }
        _ => format!("{} ({})", filename, copy),
    }
}

/// Separators would create extra key levels
fn sanitize_segment(segment: &str) -> String {
    segment
        .trim()
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect()
}

/// Decoded object key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectLayout {
    /// `{Property}/{Year}/{doc_type}/{filename}`
    Organized {
        property: String,
        year: i32,
        doc_type: DocumentType,
        filename: String,
    },
    /// `properties/{property_id}/{uuid}_{filename}`
    Legacy {
        property_id: i64,
        upload_id: Uuid,
        filename: String,
    },
    /// Anything else
    Unknown,
}

/// Recognise either key layout
pub fn parse_object_key(key: &str) -> ObjectLayout {
    let parts: Vec<&str> = key.split('/').collect();

    if let ["properties", id, file] = parts.as_slice() {
        if let (Ok(property_id), Some((uuid, filename))) = (id.parse::<i64>(), file.split_once('_'))
        {
            if let Ok(upload_id) = Uuid::parse_str(uuid) {
                return ObjectLayout::Legacy {
                    property_id,
                    upload_id,
                    filename: filename.to_string(),
                };
            }
        }
        return ObjectLayout::Unknown;
    }

    if let [property, year, doc_type, filename] = parts.as_slice() {
        if let (Ok(year), Ok(doc_type)) = (year.parse::<i32>(), doc_type.parse::<DocumentType>()) {
            if !property.is_empty() && !filename.is_empty() {
                return ObjectLayout::Organized {
                    property: property.to_string(),
                    year,
                    doc_type,
                    filename: filename.to_string(),
                };
            }
        }
    }

    ObjectLayout::Unknown
}

/// Keys must be relative, `/`-separated and free of `..`
pub(crate) fn validate_key(key: &str) -> Result<()> {
    if key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|part| part.is_empty() || part == "." || part == "..")
    {
        return Err(Error::Storage(format!("Invalid object key: {:?}", key)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_layout() {
        assert_eq!(
            object_key(
                Some("Hammond Aire"),
                2025,
                DocumentType::RentRoll,
                "Hammond Rent Roll April 2025.pdf"
            ),
            "Hammond Aire/2025/rent_roll/Hammond Rent Roll April 2025.pdf"
        );
    }

    #[test]
    fn test_object_key_without_property() {
        assert_eq!(
            object_key(None, 2024, DocumentType::Other, "notes.csv"),
            "Unassigned/2024/other/notes.csv"
        );
    }

    #[test]
    fn test_object_key_sanitizes_separators() {
        let key = object_key(Some("A/B"), 2024, DocumentType::BalanceSheet, "..\\x/y.pdf");
        assert_eq!(key, "A_B/2024/balance_sheet/.._x_y.pdf");
        assert!(validate_key(&key).is_ok());
    }

    #[test]
    fn test_numbered_filename() {
        assert_eq!(numbered_filename("Rent Roll.csv", 1), "Rent Roll.csv");
        assert_eq!(numbered_filename("Rent Roll.csv", 2), "Rent Roll (2).csv");
        assert_eq!(numbered_filename("README", 3), "README (3)");
        assert_eq!(numbered_filename(".hidden", 2), ".hidden (2)");
    }

    #[test]
    fn test_parse_organized_key() {
        assert_eq!(
            parse_object_key("Hammond Aire/2025/rent_roll/april.pdf"),
            ObjectLayout::Organized {
                property: "Hammond Aire".to_string(),
                year: 2025,
                doc_type: DocumentType::RentRoll,
                filename: "april.pdf".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_legacy_key() {
        let key = "properties/6/4f9c1c1e-7c1b-4d2a-9d0e-2a3b4c5d6e7f_rent_roll.pdf";
        match parse_object_key(key) {
            ObjectLayout::Legacy {
                property_id,
                filename,
                ..
            } => {
                assert_eq!(property_id, 6);
                assert_eq!(filename, "rent_roll.pdf");
            }
            other => panic!("unexpected layout {:?}", other),
        }
    }

    #[test]
    fn test_parse_unknown_keys() {
        assert_eq!(parse_object_key("loose-file.pdf"), ObjectLayout::Unknown);
        assert_eq!(parse_object_key("A/notayear/rent_roll/x.pdf"), ObjectLayout::Unknown);
        assert_eq!(parse_object_key("properties/x/y_z.pdf"), ObjectLayout::Unknown);
    }

    #[test]
    fn test_validate_key_rejects_traversal() {
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key("a//b").is_err());
        assert!(validate_key("/abs").is_err());
        assert!(validate_key("").is_err());
        assert!(validate_key("a/b/c.pdf").is_ok());
    }
}
