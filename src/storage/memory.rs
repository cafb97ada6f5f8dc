use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use bytes::Bytes;

use super::{BlobStore, BucketInfo, StoredObject};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemoryObject {
    pub data: Bytes,
    pub content_type: Option<String>,
}

/// Process-local blob store for unit tests.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    buckets: Mutex<BTreeSet<String>>,
    objects: Mutex<BTreeMap<(String, String), MemoryObject>>,
    fail_uploads: AtomicBool,
}

impl MemoryBlobStore {
    /// Makes every following upload fail.
    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<MemoryObject> {
        self.objects
            .lock()
            .ok()?
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().map(|objects| objects.len()).unwrap_or_default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> Result<StoredObject> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            bail!("upload of {bucket}/{key} rejected");
        }
        let mut objects = self
            .objects
            .lock()
            .map_err(|_| anyhow!("object map poisoned"))?;
        objects.insert(
            (bucket.to_string(), key.to_string()),
            MemoryObject {
                data,
                content_type: content_type.map(str::to_string),
            },
        );
        Ok(StoredObject {
            bucket: bucket.to_string(),
            key: key.to_string(),
            location: format!("memory://{bucket}/{key}"),
        })
    }

    async fn list_buckets(&self) -> Result<Vec<String>> {
        let buckets = self
            .buckets
            .lock()
            .map_err(|_| anyhow!("bucket set poisoned"))?;
        Ok(buckets.iter().cloned().collect())
    }

    async fn create_bucket(&self, name: &str) -> Result<BucketInfo> {
        let mut buckets = self
            .buckets
            .lock()
            .map_err(|_| anyhow!("bucket set poisoned"))?;
        if !buckets.insert(name.to_string()) {
            bail!("bucket {name} already exists");
        }
        Ok(BucketInfo {
            name: name.to_string(),
            location: format!("memory://{name}"),
        })
    }
}
