use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;

use super::{CatalogStore, catalog_key};
use crate::record::BannerRecord;

/// Process-local catalog for unit tests.
#[derive(Debug, Default)]
pub struct MemoryCatalogStore {
    items: Mutex<BTreeMap<(String, String), BannerRecord>>,
    fail_writes: AtomicBool,
}

impl MemoryCatalogStore {
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn get(&self, table: &str, key: &str) -> Option<BannerRecord> {
        self.items
            .lock()
            .ok()?
            .get(&(table.to_string(), key.to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.items.lock().map(|items| items.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn put(&self, table: &str, record: &BannerRecord) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("put into {table} rejected");
        }
        let mut items = self.items.lock().map_err(|_| anyhow!("item map poisoned"))?;
        items.insert((table.to_string(), catalog_key(record)), record.clone());
        Ok(())
    }
}
