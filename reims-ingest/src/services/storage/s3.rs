//! S3-compatible object store (MinIO or AWS)

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use reims_common::config::StorageConfig;
use reims_common::{Error, Result};

use super::{validate_key, ObjectStore};

#[derive(Clone, Debug)]
pub struct S3ObjectStore {
    inner: aws_sdk_s3::Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(inner: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            inner,
            bucket: bucket.into(),
        }
    }

    /// Build a client from the environment credentials chain plus the
    /// configured endpoint. Path-style addressing is forced because MinIO
    /// does not serve virtual-host buckets by default.
    pub async fn connect(config: &StorageConfig) -> Result<Self> {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()));
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        Ok(Self::new(
            aws_sdk_s3::Client::from_conf(s3_config),
            config.bucket.clone(),
        ))
    }
}

fn storage_err(op: &str, key: &str, e: impl std::fmt::Display) -> Error {
    Error::Storage(format!("{} {}: {}", op, key, e))
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    #[tracing::instrument(skip(self, content))]
    async fn put(&self, key: &str, content: &[u8]) -> Result<()> {
        validate_key(key)?;
        self.inner
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(content.to_vec()))
            .send()
            .await
            .map_err(|e| storage_err("put", key, e))?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        validate_key(key)?;
        let output = self
            .inner
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().map(|se| se.is_no_such_key()) == Some(true) {
                    Error::NotFound(format!("Object {}/{}", self.bucket, key))
                } else {
                    storage_err("get", key, e)
                }
            })?;

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| storage_err("read", key, e))?;
        Ok(bytes.into_bytes().to_vec())
    }

    #[tracing::instrument(skip(self))]
    async fn exists(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        match self
            .inner
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().map(|se| se.is_not_found()) == Some(true) => Ok(false),
            Err(e) => Err(storage_err("head", key, e)),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        self.inner
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| storage_err("delete", key, e))?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut pages = self
            .inner
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| storage_err("list", prefix, e))?;
            keys.extend(page.contents().iter().filter_map(|o| o.key().map(String::from)));
        }

        keys.sort();
        Ok(keys)
    }
}
