use crate::error::IngestError;

/// A resolved image type: the file extension used in storage keys and the
/// canonical MIME string recorded in the catalog.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaType {
    pub extension: String,
    pub canonical_type: String,
}

impl MediaType {
    fn new(extension: &str, canonical_type: &str) -> Self {
        Self {
            extension: extension.to_string(),
            canonical_type: canonical_type.to_string(),
        }
    }
}

/// Strips parameters and whitespace and lowercases a MIME string, so
/// `Image/PNG; charset=binary` compares equal to `image/png`.
pub fn mime_essence(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or(mime_type)
        .trim()
        .to_lowercase()
}

/// Resolves an image MIME type to its extension and canonical form.
///
/// The same table serves the multipart header path and the data-URI prefix
/// path. Unknown `image/<subtype>` values keep the subtype verbatim as
/// extension and the input, minus parameters, as canonical type; anything
/// without an `image/<subtype>` shape is rejected.
pub fn resolve(mime_type: &str) -> Result<MediaType, IngestError> {
    match mime_essence(mime_type).as_str() {
        "image/png" => return Ok(MediaType::new("png", "image/png")),
        "image/jpg" | "image/jpeg" => return Ok(MediaType::new("jpg", "image/jpeg")),
        "image/svg+xml" | "image/svg" => return Ok(MediaType::new("svg", "image/svg+xml")),
        _ => {}
    }
    let declared = mime_type.split(';').next().unwrap_or(mime_type).trim();
    match declared.split_once('/') {
        Some((top, subtype)) if top.eq_ignore_ascii_case("image") && is_token(subtype) => {
            Ok(MediaType::new(subtype, declared))
        }
        _ => Err(IngestError::UnsupportedMediaType(mime_type.to_string())),
    }
}

fn is_token(subtype: &str) -> bool {
    !subtype.is_empty()
        && subtype
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.' | '_'))
}
