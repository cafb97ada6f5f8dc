use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State, rejection::BytesRejection},
    http::{
        HeaderMap, HeaderName, HeaderValue, Method, StatusCode,
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN,
        },
    },
    response::{IntoResponse, Response},
    routing::post,
};
use bytes::Bytes;
use serde::Deserialize;
use tower_http::{
    services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::error::{BucketError, IngestError};
use crate::pipeline::{InboundRequest, RequestRouter, RouteOutcome};
use crate::storage::{BlobStore, provision_bucket};

const ALLOW_HEADERS: &str = "Content-Type,X-Amz-Date,X-Amz-Security-Token,x-api-key,Authorization,Origin,Host,X-Requested-With,Accept,Access-Control-Allow-Methods,Access-Control-Allow-Origin,Access-Control-Allow-Headers";
const ALLOW_METHODS: &str = "DELETE,GET,HEAD,OPTIONS,PATCH,POST,PUT";
const X_REQUESTED_WITH: HeaderName = HeaderName::from_static("x-requested-with");

/// Request header marking a base64-wrapped body.
pub const BODY_ENCODING_HEADER: &str = "x-body-encoding";

/// Headers attached to every banner and bucket response.
pub fn cors_headers() -> [(HeaderName, &'static str); 4] {
    [
        (ACCESS_CONTROL_ALLOW_HEADERS, ALLOW_HEADERS),
        (ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        (ACCESS_CONTROL_ALLOW_METHODS, ALLOW_METHODS),
        (X_REQUESTED_WITH, "*"),
    ]
}

#[derive(Clone)]
pub struct AppState {
    pub router: RequestRouter,
    pub blobs: Arc<dyn BlobStore>,
}

pub fn build_router(config: &AppConfig, state: AppState) -> Router {
    let asset_dir = config.blob_dir().join(&config.upload_bucket);
    let router = Router::new()
        .route(
            "/banner",
            post(post_banner)
                .options(post_banner)
                .layer(DefaultBodyLimit::max(config.max_body_bytes)),
        )
        .route("/buckets", post(create_bucket).options(preflight))
        .nest_service("/files", ServeDir::new(config.blob_dir()))
        .nest_service("/assets", ServeDir::new(asset_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state);
    // Covers responses produced outside the handlers, such as body-limit
    // rejections and static file errors.
    cors_headers()
        .into_iter()
        .fold(router, |router, (name, value)| {
            router.layer(SetResponseHeaderLayer::overriding(
                name,
                HeaderValue::from_static(value),
            ))
        })
}

fn is_base64_encoded(headers: &HeaderMap) -> bool {
    headers
        .get(BODY_ENCODING_HEADER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.trim().eq_ignore_ascii_case("base64"))
}

pub async fn post_banner(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(rejection) => return IngestError::RequestBody(rejection.body_text()).into_response(),
    };
    let request = InboundRequest {
        method,
        is_base64_encoded: is_base64_encoded(&headers),
        headers,
        body: if body.is_empty() { None } else { Some(body) },
    };
    match state.router.handle(request).await {
        Ok(RouteOutcome::Preflight) => (StatusCode::OK, cors_headers()).into_response(),
        Ok(RouteOutcome::Persisted(record)) => {
            (StatusCode::OK, cors_headers(), Json(record)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

async fn preflight() -> Response {
    (StatusCode::OK, cors_headers()).into_response()
}

#[derive(Deserialize)]
struct CreateBucketRequest {
    bucket: String,
}

pub async fn create_bucket(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, BucketError> {
    let request: CreateBucketRequest = serde_json::from_slice(&body)
        .map_err(|err| BucketError::InvalidRequest(err.to_string()))?;
    let result = provision_bucket(state.blobs.as_ref(), request.bucket.trim()).await?;
    Ok((StatusCode::OK, cors_headers(), Json(result)).into_response())
}
