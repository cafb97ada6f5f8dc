use std::collections::BTreeMap;
use std::convert::Infallible;

use bytes::Bytes;
use futures::stream;

use crate::error::IngestError;

/// One binary part of a multipart body. Lives only until it is stored.
#[derive(Clone, Debug)]
pub struct FilePart {
    pub field_name: Option<String>,
    pub file_name: Option<String>,
    /// Part headers keyed by lowercase name.
    pub headers: BTreeMap<String, String>,
    pub data: Bytes,
}

impl FilePart {
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(String::as_str)
    }
}

#[derive(Debug, Default)]
pub struct MultipartForm {
    pub fields: BTreeMap<String, String>,
    /// File parts in body order.
    pub files: Vec<FilePart>,
}

/// Parses a complete multipart/form-data body.
///
/// Parts with a filename are files, every other part is a text field. A
/// missing boundary or a truncated body fails the whole parse.
pub async fn extract(body: Bytes, content_type: &str) -> Result<MultipartForm, IngestError> {
    let boundary = multer::parse_boundary(content_type)
        .map_err(|err| IngestError::MultipartParse(format!("{err}")))?;
    let body_stream = stream::once(async move { Ok::<Bytes, Infallible>(body) });
    let mut multipart = multer::Multipart::new(body_stream, boundary);

    let mut form = MultipartForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| IngestError::MultipartParse(format!("{err}")))?
    {
        let field_name = field.name().map(str::to_string);
        let file_name = field.file_name().map(str::to_string);
        let headers: BTreeMap<String, String> = field
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.trim().to_string()))
            })
            .collect();

        if file_name.is_some() {
            let data = field
                .bytes()
                .await
                .map_err(|err| IngestError::MultipartParse(format!("{err}")))?;
            form.files.push(FilePart {
                field_name,
                file_name,
                headers,
                data,
            });
        } else {
            let text = field
                .text()
                .await
                .map_err(|err| IngestError::MultipartParse(format!("{err}")))?;
            if let Some(name) = field_name {
                form.fields.insert(name, text);
            }
        }
    }
    tracing::debug!(
        fields = ?form.fields.keys().collect::<Vec<_>>(),
        files = form.files.len(),
        "parsed multipart body"
    );
    Ok(form)
}
