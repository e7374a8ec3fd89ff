//! Filesystem object store: `{root}/{bucket}/{key}`

use async_trait::async_trait;
use reims_common::{Error, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::{validate_key, ObjectStore};

#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    bucket: String,
    bucket_dir: PathBuf,
}

impl LocalObjectStore {
    /// Create the bucket directory under `root` if it is missing
    pub fn new(root: &Path, bucket: &str) -> Result<Self> {
        if bucket.is_empty() || bucket.contains(['/', '\\']) || bucket == ".." {
            return Err(Error::Config(format!("Invalid bucket name: {:?}", bucket)));
        }

        let bucket_dir = root.join(bucket);
        std::fs::create_dir_all(&bucket_dir)?;

        Ok(Self {
            bucket: bucket.to_string(),
            bucket_dir,
        })
    }

    fn object_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(key.split('/').fold(self.bucket_dir.clone(), |p, part| p.join(part)))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put(&self, key: &str, content: &[u8]) -> Result<()> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write beside the target then rename, so readers never see half a file.
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = path.with_file_name(format!("{}.partial", file_name));
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &path).await?;

        tracing::debug!(bucket = %self.bucket, key, bytes = content.len(), "Stored object");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.object_path(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::NotFound(format!(
                "Object {}/{}",
                self.bucket, key
            ))),
            Err(e) => Err(Error::Io(e)),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.object_path(key)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.object_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let bucket_dir = self.bucket_dir.clone();
        let prefix = prefix.to_string();

        tokio::task::spawn_blocking(move || {
            let mut keys = Vec::new();
            for entry in WalkDir::new(&bucket_dir).follow_links(false) {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        tracing::warn!("Error accessing storage entry: {}", e);
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }
                let Ok(relative) = entry.path().strip_prefix(&bucket_dir) else {
                    continue;
                };
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if key.ends_with(".partial") {
                    continue;
                }
                if key.starts_with(&prefix) {
                    keys.push(key);
                }
            }
            keys.sort();
            keys
        })
        .await
        .map_err(|e| Error::Internal(format!("Storage listing task failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_get_exists_delete() {
        let dir = TempDir::new().unwrap();
        let store = LocalObjectStore::new(dir.path(), "reims-files").unwrap();
        let key = "Hammond Aire/2025/rent_roll/april.csv";

        store.put(key, b"unit,status\n101,occupied\n").await.unwrap();

        assert!(store.exists(key).await.unwrap());
        assert_eq!(store.get(key).await.unwrap(), b"unit,status\n101,occupied\n");
        assert!(dir.path().join("reims-files/Hammond Aire/2025/rent_roll/april.csv").exists());

        store.delete(key).await.unwrap();
        assert!(!store.exists(key).await.unwrap());
        // Deleting twice is fine
        store.delete(key).await.unwrap();
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = LocalObjectStore::new(dir.path(), "reims-files").unwrap();

        let err = store.get("nope/2025/other/x.pdf").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_with_prefix() {
        let dir = TempDir::new().unwrap();
        let store = LocalObjectStore::new(dir.path(), "reims-files").unwrap();
        store.put("A/2024/other/1.pdf", b"1").await.unwrap();
        store.put("A/2025/other/2.pdf", b"2").await.unwrap();
        store.put("B/2025/other/3.pdf", b"3").await.unwrap();

        assert_eq!(store.list("").await.unwrap().len(), 3);
        assert_eq!(
            store.list("A/").await.unwrap(),
            vec!["A/2024/other/1.pdf".to_string(), "A/2025/other/2.pdf".to_string()]
        );
    }

    #[tokio::test]
    async fn test_traversal_rejected() {
        let dir = TempDir::new().unwrap();
        let store = LocalObjectStore::new(dir.path(), "reims-files").unwrap();
        assert!(store.put("../escape.pdf", b"x").await.is_err());
    }

    #[test]
    fn test_invalid_bucket_rejected() {
        let dir = TempDir::new().unwrap();
        assert!(LocalObjectStore::new(dir.path(), "a/b").is_err());
        assert!(LocalObjectStore::new(dir.path(), "").is_err());
    }
}
