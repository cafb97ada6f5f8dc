use std::sync::Arc;

use axum::http::{HeaderMap, Method, header::CONTENT_TYPE};
use bytes::Bytes;

use crate::catalog::CatalogStore;
use crate::config::AppConfig;
use crate::decode::{self, DecodedBody, FieldMap};
use crate::error::IngestError;
use crate::ingest::{ImageIngestor, is_data_uri};
use crate::keys::{Clock, KeyGenerator};
use crate::multipart;
use crate::record::{BannerFields, BannerRecord, RecordBuilder};
use crate::storage::BlobStore;

/// A banner request as it arrives, independent of the HTTP framework.
#[derive(Clone, Debug)]
pub struct InboundRequest {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    /// The body is base64-wrapped by the transport.
    pub is_base64_encoded: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    DecodingBody,
    StructuredReady,
    MultipartPending,
    Ingesting,
    Persisting,
    Responded,
}

#[derive(Debug)]
pub enum RouteOutcome {
    Preflight,
    Persisted(BannerRecord),
}

/// Drives one request through decode, ingest and persist.
///
/// An image stored before a failed catalog write stays in the bucket.
#[derive(Clone)]
pub struct RequestRouter {
    config: Arc<AppConfig>,
    ingestor: ImageIngestor,
    builder: RecordBuilder,
    catalog: Arc<dyn CatalogStore>,
}

impl RequestRouter {
    pub fn new(
        config: Arc<AppConfig>,
        blobs: Arc<dyn BlobStore>,
        catalog: Arc<dyn CatalogStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let ingestor = ImageIngestor::new(
            blobs,
            config.upload_bucket.clone(),
            KeyGenerator::new(clock.clone()),
        );
        let builder = RecordBuilder::new(config.asset_base_url.clone(), clock);
        Self {
            config,
            ingestor,
            builder,
            catalog,
        }
    }

    pub async fn handle(&self, request: InboundRequest) -> Result<RouteOutcome, IngestError> {
        if request.method == Method::OPTIONS {
            tracing::debug!("answering CORS preflight");
            return Ok(RouteOutcome::Preflight);
        }
        let mut stage = Stage::DecodingBody;
        match self.process(request, &mut stage).await {
            Ok(record) => {
                tracing::info!(stage = ?Stage::Responded, id = ?record.id, "banner persisted");
                Ok(RouteOutcome::Persisted(record))
            }
            Err(err) => {
                tracing::error!(failed_at = ?stage, kind = err.kind(), "{err}");
                Err(err)
            }
        }
    }

    async fn process(
        &self,
        request: InboundRequest,
        stage: &mut Stage,
    ) -> Result<BannerRecord, IngestError> {
        let content_type = request
            .headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        tracing::debug!(
            content_type = content_type.as_deref().unwrap_or(""),
            is_base64 = request.is_base64_encoded,
            size = request.body.as_ref().map(Bytes::len).unwrap_or_default(),
            "decoding banner request"
        );

        let decoded = match request.body.filter(|body| !body.is_empty()) {
            Some(body) => {
                decode::decode(&body, request.is_base64_encoded, content_type.as_deref())?
            }
            None => DecodedBody::Structured(FieldMap::new()),
        };

        let record = match decoded {
            DecodedBody::Structured(fields) => {
                *stage = Stage::StructuredReady;
                tracing::debug!(fields = ?fields.keys().collect::<Vec<_>>(), "structured body");
                self.structured(BannerFields::from_map(fields), stage).await?
            }
            DecodedBody::DeferToMultipart(body) => {
                *stage = Stage::MultipartPending;
                self.multipart(body, content_type.as_deref().unwrap_or_default(), stage)
                    .await?
            }
        };

        *stage = Stage::Persisting;
        self.catalog
            .put(&self.config.table_name, &record)
            .await
            .map_err(IngestError::catalog)?;
        tracing::debug!(table = %self.config.table_name, record = ?record, "catalog upsert done");
        Ok(record)
    }

    async fn structured(
        &self,
        fields: BannerFields,
        stage: &mut Stage,
    ) -> Result<BannerRecord, IngestError> {
        let image = fields.require_image()?;
        let ingested = if is_data_uri(image) {
            *stage = Stage::Ingesting;
            Some(self.ingestor.ingest_inline(image).await?)
        } else {
            None
        };
        Ok(self.builder.build(fields, ingested.as_ref()))
    }

    async fn multipart(
        &self,
        body: Bytes,
        content_type: &str,
        stage: &mut Stage,
    ) -> Result<BannerRecord, IngestError> {
        let form = multipart::extract(body, content_type).await?;
        let extra = form.files.len().saturating_sub(1);
        if extra > 0 {
            tracing::warn!(ignored = extra, "only the first file part is stored");
        }
        let file = form
            .files
            .into_iter()
            .next()
            .ok_or(IngestError::MissingFilePart)?;

        *stage = Stage::Ingesting;
        let ingested = self.ingestor.ingest_file_part(file).await?;
        Ok(self
            .builder
            .build(BannerFields::from_form(form.fields), Some(&ingested)))
    }
}

#[cfg(test)]
mod tests {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::catalog::{MemoryCatalogStore, catalog_key};
    use crate::keys::FixedClock;
    use crate::storage::MemoryBlobStore;

    const TABLE: &str = "banners";
    const BUCKET: &str = "uploads";
    const NOW_MILLIS: i64 = 1_700_000_000_000;

    struct Harness {
        router: RequestRouter,
        blobs: Arc<MemoryBlobStore>,
        catalog: Arc<MemoryCatalogStore>,
    }

    fn harness() -> Harness {
        let config = AppConfig::from_lookup(|name| match name {
            "TABLE_NAME" => Some(TABLE.to_string()),
            "UPLOAD_BUCKET" => Some(BUCKET.to_string()),
            "CLOUDFRONT_URL" => Some("cdn.example.com".to_string()),
            "DATA_DIR" => Some("/tmp/unused".to_string()),
            _ => None,
        })
        .unwrap();
        let blobs = Arc::new(MemoryBlobStore::default());
        let catalog = Arc::new(MemoryCatalogStore::default());
        let clock = FixedClock(Utc.timestamp_millis_opt(NOW_MILLIS).unwrap());
        let router = RequestRouter::new(
            Arc::new(config),
            blobs.clone(),
            catalog.clone(),
            Arc::new(clock),
        );
        Harness {
            router,
            blobs,
            catalog,
        }
    }

    fn request(content_type: Option<&str>, body: Option<Vec<u8>>, base64: bool) -> InboundRequest {
        let mut headers = HeaderMap::new();
        if let Some(content_type) = content_type {
            headers.insert(CONTENT_TYPE, content_type.parse().unwrap());
        }
        InboundRequest {
            method: Method::POST,
            headers,
            body: body.map(Bytes::from),
            is_base64_encoded: base64,
        }
    }

    fn persisted(outcome: RouteOutcome) -> BannerRecord {
        match outcome {
            RouteOutcome::Persisted(record) => record,
            RouteOutcome::Preflight => panic!("expected a persisted record"),
        }
    }

    #[tokio::test]
    async fn test_base64_json_with_hosted_image_passes_through() {
        let h = harness();
        let json = r#"{"image":"https://img.example.com/a.png","link":"https://shop.example.com/sale","title":"Sale","type":"promo"}"#;
        let body = STANDARD.encode(json).into_bytes();
        let record = persisted(
            h.router
                .handle(request(Some("application/json"), Some(body), true))
                .await
                .unwrap(),
        );
        assert_eq!(record.id, None);
        assert_eq!(record.image.as_deref(), Some("https://img.example.com/a.png"));
        assert_eq!(record.link.as_deref(), Some("https://shop.example.com/sale"));
        assert_eq!(record.banner_type.as_deref(), Some("promo"));
        assert_eq!(h.blobs.object_count(), 0);
        assert_eq!(h.catalog.get(TABLE, &catalog_key(&record)), Some(record));
    }

    #[tokio::test]
    async fn test_json_with_data_uri_derives_link() {
        let h = harness();
        let json = serde_json::json!({
            "image": format!("data:image/png;base64,{}", STANDARD.encode(b"png-bytes")),
            "link": "https://caller.example.com",
            "screen": "home",
        });
        let record = persisted(
            h.router
                .handle(request(
                    Some("application/json"),
                    Some(json.to_string().into_bytes()),
                    false,
                ))
                .await
                .unwrap(),
        );
        let key = format!("{NOW_MILLIS}.png");
        assert_eq!(record.id.as_deref(), Some(key.as_str()));
        assert_eq!(record.banner_type.as_deref(), Some("image/png"));
        assert_eq!(
            record.link.as_deref(),
            Some(format!("https://cdn.example.com/{key}").as_str())
        );
        assert_eq!(
            record.image.as_deref(),
            Some(format!("memory://{BUCKET}/{key}").as_str())
        );
        assert_eq!(h.blobs.object(BUCKET, &key).unwrap().data.as_ref(), b"png-bytes");
        assert_eq!(h.catalog.get(TABLE, &key), Some(record));
    }

    #[tokio::test]
    async fn test_base64_form_body() {
        let h = harness();
        let form = "image=https%3A%2F%2Fimg.example.com%2Fb.jpg&title=Hello+World&screen=cart";
        let body = STANDARD.encode(form).into_bytes();
        let record = persisted(
            h.router
                .handle(request(
                    Some("application/x-www-form-urlencoded"),
                    Some(body),
                    true,
                ))
                .await
                .unwrap(),
        );
        assert_eq!(record.image.as_deref(), Some("https://img.example.com/b.jpg"));
        assert_eq!(record.title.as_deref(), Some("Hello World"));
        assert_eq!(record.screen.as_deref(), Some("cart"));
    }

    fn multipart_body(with_file: bool) -> Vec<u8> {
        let mut body = b"--b0undary\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nWinter\r\n".to_vec();
        body.extend_from_slice(
            b"--b0undary\r\nContent-Disposition: form-data; name=\"link\"\r\n\r\nhttps://caller.example.com\r\n",
        );
        if with_file {
            body.extend_from_slice(
                b"--b0undary\r\nContent-Disposition: form-data; name=\"file\"; filename=\"w.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n\xFF\xD8\xFFjpeg\r\n",
            );
            body.extend_from_slice(
                b"--b0undary\r\nContent-Disposition: form-data; name=\"file2\"; filename=\"x.png\"\r\nContent-Type: image/png\r\n\r\npng\r\n",
            );
        }
        body.extend_from_slice(b"--b0undary--\r\n");
        body
    }

    #[tokio::test]
    async fn test_base64_multipart_stores_first_file_only() {
        let h = harness();
        let body = STANDARD.encode(multipart_body(true)).into_bytes();
        let record = persisted(
            h.router
                .handle(request(
                    Some("multipart/form-data; boundary=b0undary"),
                    Some(body),
                    true,
                ))
                .await
                .unwrap(),
        );
        let key = format!("{NOW_MILLIS}.jpg");
        assert_eq!(record.id.as_deref(), Some(key.as_str()));
        assert_eq!(record.banner_type.as_deref(), Some("image/jpeg"));
        assert_eq!(record.title.as_deref(), Some("Winter"));
        assert_eq!(
            record.link.as_deref(),
            Some(format!("https://cdn.example.com/{key}").as_str())
        );
        assert_eq!(h.blobs.object_count(), 1);
        let object = h.blobs.object(BUCKET, &key).unwrap();
        assert_eq!(object.data.as_ref(), b"\xFF\xD8\xFFjpeg");
        assert_eq!(object.content_type.as_deref(), Some("image/jpeg"));
    }

    #[tokio::test]
    async fn test_raw_multipart_without_file_fails() {
        let h = harness();
        let err = h
            .router
            .handle(request(
                Some("multipart/form-data; boundary=b0undary"),
                Some(multipart_body(false)),
                false,
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::MissingFilePart));
        assert!(h.catalog.is_empty());
    }

    #[tokio::test]
    async fn test_multipart_without_boundary_writes_nothing() {
        let h = harness();
        let err = h
            .router
            .handle(request(
                Some("multipart/form-data"),
                Some(multipart_body(true)),
                false,
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::MultipartParse(_)));
        assert!(h.catalog.is_empty());
        assert_eq!(h.blobs.object_count(), 0);
    }

    #[tokio::test]
    async fn test_options_short_circuits() {
        let h = harness();
        let mut preflight = request(None, Some(b"garbage".to_vec()), true);
        preflight.method = Method::OPTIONS;
        let outcome = h.router.handle(preflight).await.unwrap();
        assert!(matches!(outcome, RouteOutcome::Preflight));
        assert!(h.catalog.is_empty());
        assert_eq!(h.blobs.object_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_body_reports_missing_image() {
        let h = harness();
        let err = h
            .router
            .handle(request(Some("application/json"), None, false))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::MissingFields(_)));
    }

    #[tokio::test]
    async fn test_storage_failure_skips_catalog_write() {
        let h = harness();
        h.blobs.fail_uploads(true);
        let json = serde_json::json!({
            "image": format!("data:image/png;base64,{}", STANDARD.encode(b"png")),
            "title": "Never stored",
        });
        let err = h
            .router
            .handle(request(
                Some("application/json"),
                Some(json.to_string().into_bytes()),
                false,
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::StorageWrite(_)));
        assert_eq!(err.kind(), "StorageWriteFailure");
        assert!(h.catalog.is_empty());
        assert_eq!(h.blobs.object_count(), 0);
    }

    #[tokio::test]
    async fn test_catalog_failure_keeps_uploaded_image() {
        let h = harness();
        h.catalog.fail_writes(true);
        let json = serde_json::json!({
            "image": format!("data:image/svg+xml;base64,{}", STANDARD.encode(b"<svg/>")),
        });
        let err = h
            .router
            .handle(request(
                Some("application/json"),
                Some(json.to_string().into_bytes()),
                false,
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::CatalogWrite(_)));
        assert!(h.blobs.object(BUCKET, &format!("{NOW_MILLIS}.svg")).is_some());
    }
}
