use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use async_trait::async_trait;
use tokio::fs;

use super::{CatalogStore, catalog_key};
use crate::record::BannerRecord;

/// Catalog kept as one pretty-printed JSON file per item under
/// `<base_dir>/<table>/`.
#[derive(Clone, Debug)]
pub struct LocalCatalogStore {
    base_dir: PathBuf,
}

impl LocalCatalogStore {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn item_path(&self, table: &str, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            bail!("invalid catalog key \"{key}\"");
        }
        Ok(self.table_dir(table).join(format!("{key}.json")))
    }

    fn table_dir(&self, table: &str) -> PathBuf {
        self.base_dir.join(Path::new(table))
    }

    pub async fn get(&self, table: &str, key: &str) -> Result<Option<BannerRecord>> {
        let path = self.item_path(table, key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl CatalogStore for LocalCatalogStore {
    async fn put(&self, table: &str, record: &BannerRecord) -> Result<()> {
        let key = catalog_key(record);
        let path = self.item_path(table, &key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let payload = serde_json::to_vec_pretty(record)?;
        fs::write(&path, payload).await?;
        Ok(())
    }
}
