use std::collections::BTreeMap;

use base64::{
    Engine as _, alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use bytes::Bytes;
use serde_json::Value;

use crate::error::IngestError;
use crate::media::mime_essence;

/// Untyped request fields; `None` marks an explicit JSON `null`.
pub type FieldMap = BTreeMap<String, Option<String>>;

const JSON: &str = "application/json";
const FORM: &str = "application/x-www-form-urlencoded";
const MULTIPART: &str = "multipart/form-data";

/// Standard alphabet, padding optional and stray trailing bits allowed.
pub(crate) const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

#[derive(Debug)]
pub enum DecodedBody {
    Structured(FieldMap),
    /// The body is multipart; carries the transport-decoded bytes.
    DeferToMultipart(Bytes),
}

/// Decodes a request body into fields, or hands multipart bodies back to the
/// caller.
///
/// The transport base64 wrapper is removed before the content type is looked
/// at. Declared types outside JSON, form and multipart still get one JSON
/// parse attempt.
pub fn decode(
    raw: &[u8],
    is_base64: bool,
    declared_content_type: Option<&str>,
) -> Result<DecodedBody, IngestError> {
    let body = if is_base64 {
        unwrap_base64(raw)?
    } else {
        raw.to_vec()
    };

    let declared = declared_content_type
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            IngestError::UnrecognizedEncoding("missing Content-Type for request body".to_string())
        })?;

    if declared.to_lowercase().contains(MULTIPART) {
        return Ok(DecodedBody::DeferToMultipart(Bytes::from(body)));
    }

    let fields = match mime_essence(declared).as_str() {
        JSON => parse_json(&body)?,
        FORM => parse_form(&body)?,
        _ => parse_json(&body).map_err(|_| {
            IngestError::UnrecognizedEncoding(format!(
                "content type \"{declared}\" is not JSON, form or multipart"
            ))
        })?,
    };
    Ok(DecodedBody::Structured(fields))
}

fn unwrap_base64(raw: &[u8]) -> Result<Vec<u8>, IngestError> {
    let compact: Vec<u8> = raw
        .iter()
        .copied()
        .filter(|byte| !byte.is_ascii_whitespace())
        .collect();
    LENIENT_BASE64
        .decode(compact)
        .map_err(|err| IngestError::UnrecognizedEncoding(format!("invalid base64 body: {err}")))
}

fn parse_json(body: &[u8]) -> Result<FieldMap, IngestError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|err| IngestError::UnrecognizedEncoding(format!("invalid JSON body: {err}")))?;
    let Value::Object(object) = value else {
        return Err(IngestError::UnrecognizedEncoding(
            "JSON body must be an object".to_string(),
        ));
    };
    Ok(object
        .into_iter()
        .map(|(name, value)| {
            let value = match value {
                Value::Null => None,
                Value::String(text) => Some(text),
                other => Some(other.to_string()),
            };
            (name, value)
        })
        .collect())
}

fn parse_form(body: &[u8]) -> Result<FieldMap, IngestError> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(body).map_err(|err| {
        IngestError::UnrecognizedEncoding(format!("invalid form-urlencoded body: {err}"))
    })?;
    Ok(pairs
        .into_iter()
        .map(|(name, value)| (name, Some(value)))
        .collect())
}
