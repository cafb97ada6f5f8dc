pub mod local;
#[cfg(test)]
pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;

use crate::error::BucketError;

pub use local::LocalBlobStore;
#[cfg(test)]
pub use memory::MemoryBlobStore;

/// Where an uploaded object ended up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub bucket: String,
    pub key: String,
    pub location: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BucketInfo {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Location")]
    pub location: String,
}

/// Object storage backend addressed by bucket and key.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Writes `data` under `key`, overwriting any existing object.
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> Result<StoredObject>;

    async fn list_buckets(&self) -> Result<Vec<String>>;

    /// Fails when the bucket already exists.
    async fn create_bucket(&self, name: &str) -> Result<BucketInfo>;
}

#[derive(Debug, Serialize)]
pub struct BucketProvisioning {
    pub bucket: String,
    #[serde(rename = "newBucket")]
    pub new_bucket: Option<BucketInfo>,
    pub data: Vec<String>,
}

/// Creates `name` unless it is already listed. The listing returned is the one
/// taken before creation.
pub async fn provision_bucket(
    store: &dyn BlobStore,
    name: &str,
) -> Result<BucketProvisioning, BucketError> {
    validate_bucket_name(name)?;
    let data = store.list_buckets().await?;
    let new_bucket = if data.iter().any(|existing| existing == name) {
        tracing::info!(bucket = name, "bucket already present");
        None
    } else {
        let info = store.create_bucket(name).await?;
        tracing::info!(bucket = name, location = %info.location, "bucket created");
        Some(info)
    };
    Ok(BucketProvisioning {
        bucket: name.to_string(),
        new_bucket,
        data,
    })
}

/// S3 naming rules: 3 to 63 chars of lowercase letters, digits, dots and
/// hyphens, starting and ending alphanumeric.
pub fn validate_bucket_name(name: &str) -> Result<(), BucketError> {
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-');
    let edges_ok = name
        .chars()
        .next()
        .zip(name.chars().last())
        .is_some_and(|(first, last)| first.is_ascii_alphanumeric() && last.is_ascii_alphanumeric());
    if (3..=63).contains(&name.len()) && valid_chars && edges_ok && !name.contains("..") {
        Ok(())
    } else {
        Err(BucketError::InvalidRequest(format!(
            "invalid bucket name \"{name}\""
        )))
    }
}
