pub mod catalog;
pub mod config;
pub mod decode;
pub mod error;
pub mod http;
pub mod ingest;
pub mod keys;
pub mod media;
pub mod multipart;
pub mod pipeline;
pub mod record;
pub mod storage;

use std::sync::Arc;

use axum::Router;

use crate::catalog::LocalCatalogStore;
use crate::config::AppConfig;
use crate::http::AppState;
use crate::keys::SystemClock;
use crate::pipeline::RequestRouter;
use crate::storage::LocalBlobStore;

/// Wires the filesystem-backed blob and catalog stores into the HTTP router.
pub fn local_app(config: Arc<AppConfig>) -> Router {
    let blobs = Arc::new(LocalBlobStore::new(
        config.blob_dir(),
        config.files_base_url(),
    ));
    let catalog = Arc::new(LocalCatalogStore::new(config.catalog_dir()));
    let router = RequestRouter::new(config.clone(), blobs.clone(), catalog, Arc::new(SystemClock));
    http::build_router(
        &config,
        AppState {
            router,
            blobs,
        },
    )
}
