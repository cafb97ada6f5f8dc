use std::path::{Component, Path, PathBuf};

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;

use super::{BlobStore, BucketInfo, StoredObject};

/// Blob store backed by a directory tree: one subdirectory per bucket, one
/// file per key. Objects are reachable under `base_url/<bucket>/<key>`.
#[derive(Clone, Debug)]
pub struct LocalBlobStore {
    base_dir: PathBuf,
    base_url: String,
}

impl LocalBlobStore {
    pub fn new(base_dir: PathBuf, base_url: String) -> Self {
        Self { base_dir, base_url }
    }

    pub async fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.resolve_path(bucket, key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub fn get_public_url(&self, bucket: &str, key: &str) -> String {
        let trimmed = self.base_url.trim_end_matches('/');
        let key = key.trim_start_matches('/');
        format!("{trimmed}/{bucket}/{key}")
    }

    pub fn bucket_dir(&self, bucket: &str) -> PathBuf {
        self.base_dir.join(bucket)
    }

    fn resolve_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        let normalized = Path::new(key.trim_start_matches('/'));
        if normalized
            .components()
            .any(|component| !matches!(component, Component::Normal(_)))
        {
            bail!("invalid object key \"{key}\"");
        }
        Ok(self.bucket_dir(bucket).join(normalized))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> Result<StoredObject> {
        let path = self.resolve_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, &data).await?;
        tracing::debug!(
            path = %path.display(),
            content_type = content_type.unwrap_or("unknown"),
            size = data.len(),
            "wrote object"
        );
        Ok(StoredObject {
            bucket: bucket.to_string(),
            key: key.to_string(),
            location: self.get_public_url(bucket, key),
        })
    }

    async fn list_buckets(&self) -> Result<Vec<String>> {
        let mut dir = match fs::read_dir(&self.base_dir).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut names = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    async fn create_bucket(&self, name: &str) -> Result<BucketInfo> {
        fs::create_dir_all(&self.base_dir).await?;
        let dir = self.bucket_dir(name);
        fs::create_dir(&dir)
            .await
            .map_err(|err| anyhow!("create bucket {name} failed: {err}"))?;
        Ok(BucketInfo {
            name: name.to_string(),
            location: format!("{}/{name}", self.base_url.trim_end_matches('/')),
        })
    }
}
