use std::sync::Arc;

use base64::Engine as _;
use bytes::Bytes;

use crate::decode::LENIENT_BASE64;
use crate::error::IngestError;
use crate::keys::KeyGenerator;
use crate::media::{self, MediaType};
use crate::multipart::FilePart;
use crate::storage::BlobStore;

const DATA_URI_SCHEME: &str = "data:";
const BASE64_MARKER: &str = ";base64,";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IngestedImage {
    pub key: String,
    pub location: String,
    pub media_type: MediaType,
}

/// True when an `image` field carries inline bytes rather than a URL.
pub fn is_data_uri(value: &str) -> bool {
    value.trim_start().starts_with("data:image")
}

/// Stores banner images. Each successful call performs exactly one upload;
/// failures upload nothing.
#[derive(Clone)]
pub struct ImageIngestor {
    store: Arc<dyn BlobStore>,
    bucket: String,
    keys: KeyGenerator,
}

impl ImageIngestor {
    pub fn new(store: Arc<dyn BlobStore>, bucket: String, keys: KeyGenerator) -> Self {
        Self {
            store,
            bucket,
            keys,
        }
    }

    /// Stores a `data:image/<type>;base64,<payload>` value.
    pub async fn ingest_inline(&self, data_uri: &str) -> Result<IngestedImage, IngestError> {
        let (declared_type, data) = parse_data_uri(data_uri)?;
        let media_type = media::resolve(&declared_type)?;
        let content_type = media_type.canonical_type.clone();
        self.store_image(media_type, data, &content_type).await
    }

    /// Stores a multipart file part under its declared content type.
    pub async fn ingest_file_part(&self, file: FilePart) -> Result<IngestedImage, IngestError> {
        let content_type = file
            .content_type()
            .filter(|value| !value.trim().is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                IngestError::MissingHeaders(format!(
                    "file part {} has no content-type",
                    file.file_name.as_deref().unwrap_or("<unnamed>")
                ))
            })?;
        let media_type = media::resolve(&content_type)?;
        self.store_image(media_type, file.data, &content_type).await
    }

    async fn store_image(
        &self,
        media_type: MediaType,
        data: Bytes,
        content_type: &str,
    ) -> Result<IngestedImage, IngestError> {
        let key = self.keys.generate(&media_type.extension);
        let size = data.len();
        let stored = self
            .store
            .upload(&self.bucket, &key, data, Some(content_type))
            .await
            .map_err(IngestError::storage)?;
        tracing::info!(
            bucket = %stored.bucket,
            key = %stored.key,
            location = %stored.location,
            content_type,
            size,
            "stored banner image"
        );
        Ok(IngestedImage {
            key: stored.key,
            location: stored.location,
            media_type,
        })
    }
}

fn parse_data_uri(value: &str) -> Result<(String, Bytes), IngestError> {
    let value = value.trim();
    let rest = value
        .strip_prefix(DATA_URI_SCHEME)
        .ok_or_else(|| IngestError::InvalidDataUri("missing \"data:\" prefix".to_string()))?;
    let (declared_type, payload) = rest.split_once(BASE64_MARKER).ok_or_else(|| {
        IngestError::InvalidDataUri("missing \";base64,\" marker".to_string())
    })?;
    if !declared_type.starts_with("image/") {
        return Err(IngestError::InvalidDataUri(format!(
            "\"{declared_type}\" is not an image type"
        )));
    }
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    let data = LENIENT_BASE64
        .decode(compact)
        .map_err(|err| IngestError::InvalidDataUri(format!("invalid base64 payload: {err}")))?;
    Ok((declared_type.to_string(), Bytes::from(data)))
}
