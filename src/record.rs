use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::decode::FieldMap;
use crate::error::IngestError;
use crate::ingest::IngestedImage;
use crate::keys::Clock;

/// `created` format, second precision.
pub const CREATED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Caller-supplied banner fields, named explicitly instead of read ad hoc
/// from the decoded map.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BannerFields {
    pub id: Option<String>,
    pub r#type: Option<String>,
    pub image: Option<String>,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub body: Option<String>,
    pub link: Option<String>,
    pub screen: Option<String>,
}

impl BannerFields {
    pub fn from_map(mut fields: FieldMap) -> Self {
        let mut take = |name: &str| fields.remove(name).flatten();
        Self {
            id: take("id"),
            r#type: take("type"),
            image: take("image"),
            title: take("title"),
            subtitle: take("subtitle"),
            body: take("body"),
            link: take("link"),
            screen: take("screen"),
        }
    }

    pub fn from_form(fields: BTreeMap<String, String>) -> Self {
        Self::from_map(
            fields
                .into_iter()
                .map(|(name, value)| (name, Some(value)))
                .collect(),
        )
    }

    /// JSON and form requests must name an image, either as data URI or as an
    /// already hosted URL.
    pub fn require_image(&self) -> Result<&str, IngestError> {
        self.image
            .as_deref()
            .filter(|image| !image.trim().is_empty())
            .ok_or_else(|| IngestError::MissingFields(vec!["image"]))
    }
}

/// Catalog entity, serialized with the catalog column names.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BannerRecord {
    #[serde(rename = "BannerID")]
    pub id: Option<String>,
    #[serde(rename = "BannerType")]
    pub banner_type: Option<String>,
    #[serde(rename = "Image")]
    pub image: Option<String>,
    #[serde(rename = "Title")]
    pub title: Option<String>,
    #[serde(rename = "Subtitle")]
    pub subtitle: Option<String>,
    #[serde(rename = "Body")]
    pub body: Option<String>,
    #[serde(rename = "Link")]
    pub link: Option<String>,
    #[serde(rename = "Screen")]
    pub screen: Option<String>,
    #[serde(rename = "Created")]
    pub created: String,
}

#[derive(Clone)]
pub struct RecordBuilder {
    asset_base_url: String,
    clock: Arc<dyn Clock>,
}

impl RecordBuilder {
    pub fn new(asset_base_url: String, clock: Arc<dyn Clock>) -> Self {
        Self {
            asset_base_url,
            clock,
        }
    }

    pub fn asset_url(&self, key: &str) -> String {
        format!("{}/{}", self.asset_base_url.trim_end_matches('/'), key)
    }

    /// With an image ingested in this request, id, type, image and link all
    /// come from the upload. Without one, the caller's values pass through.
    pub fn build(&self, fields: BannerFields, ingested: Option<&IngestedImage>) -> BannerRecord {
        let created = self.clock.now().format(CREATED_FORMAT).to_string();
        let BannerFields {
            id: _,
            r#type,
            image,
            title,
            subtitle,
            body,
            link,
            screen,
        } = fields;
        match ingested {
            Some(ingested) => BannerRecord {
                id: Some(ingested.key.clone()),
                banner_type: Some(ingested.media_type.canonical_type.clone()),
                image: Some(ingested.location.clone()),
                title,
                subtitle,
                body,
                link: Some(self.asset_url(&ingested.key)),
                screen,
                created,
            },
            None => BannerRecord {
                id: None,
                banner_type: r#type,
                image,
                title,
                subtitle,
                body,
                link,
                screen,
                created,
            },
        }
    }
}
