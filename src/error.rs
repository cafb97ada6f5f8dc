use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::http::cors_headers;

/// Terminal failures of one banner request.
///
/// None of these are retried. Every variant surfaces as a 500 response, client
/// input problems included.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Unsupported content type \"{0}\".")]
    UnsupportedMediaType(String),

    #[error("Invalid data URI: {0}")]
    InvalidDataUri(String),

    #[error("Missing \"headers\" from request: {0}")]
    MissingHeaders(String),

    #[error("Multipart request carries no file part")]
    MissingFilePart,

    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("Multipart parse error: {0}")]
    MultipartParse(String),

    #[error("Request body rejected: {0}")]
    RequestBody(String),

    #[error("Unrecognized body encoding: {0}")]
    UnrecognizedEncoding(String),

    #[error("Storage write failed: {0}")]
    StorageWrite(String),

    #[error("Catalog write failed: {0}")]
    CatalogWrite(String),
}

impl IngestError {
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::UnsupportedMediaType(_) => "UnsupportedMediaType",
            IngestError::InvalidDataUri(_) => "InvalidDataUri",
            IngestError::MissingHeaders(_) => "MissingHeaders",
            IngestError::MissingFilePart => "MissingFilePart",
            IngestError::MissingFields(_) => "MissingFields",
            IngestError::MultipartParse(_) => "MultipartParseError",
            IngestError::RequestBody(_) => "RequestBodyRejected",
            IngestError::UnrecognizedEncoding(_) => "UnrecognizedEncoding",
            IngestError::StorageWrite(_) => "StorageWriteFailure",
            IngestError::CatalogWrite(_) => "CatalogWriteFailure",
        }
    }

    pub(crate) fn storage(err: anyhow::Error) -> Self {
        IngestError::StorageWrite(format!("{err:#}"))
    }

    pub(crate) fn catalog(err: anyhow::Error) -> Self {
        IngestError::CatalogWrite(format!("{err:#}"))
    }
}

#[derive(Serialize)]
struct ErrorBody {
    kind: &'static str,
    message: String,
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        tracing::error!(kind = self.kind(), "banner request failed: {}", self);
        let body = ErrorBody {
            kind: self.kind(),
            message: self.to_string(),
        };
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            cors_headers(),
            Json(body),
        )
            .into_response()
    }
}

/// Failures of the bucket provisioning endpoint.
#[derive(Debug, thiserror::Error)]
pub enum BucketError {
    #[error("Invalid bucket request: {0}")]
    InvalidRequest(String),

    #[error("{0:#}")]
    Backend(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct MessageBody {
    message: String,
}

impl IntoResponse for BucketError {
    fn into_response(self) -> Response {
        tracing::warn!("bucket provisioning failed: {}", self);
        let body = MessageBody {
            message: self.to_string(),
        };
        (StatusCode::BAD_REQUEST, cors_headers(), Json(body)).into_response()
    }
}
