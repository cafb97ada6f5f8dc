pub mod local;
#[cfg(test)]
pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::record::BannerRecord;

pub use local::LocalCatalogStore;
#[cfg(test)]
pub use memory::MemoryCatalogStore;

/// Record store with whole-item upsert semantics.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Replaces any item stored under the same key.
    async fn put(&self, table: &str, record: &BannerRecord) -> Result<()>;
}

/// Upsert key of a record: its BannerID, or the hash of its image URL for
/// metadata-only writes.
pub fn catalog_key(record: &BannerRecord) -> String {
    match record.id.as_deref() {
        Some(id) => id.to_string(),
        None => compute_hash(record.image.as_deref().unwrap_or_default()),
    }
}

pub fn compute_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)
}
