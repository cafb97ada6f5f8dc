use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use url::Url;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_TABLE: &str = "banners";
const DEFAULT_BUCKET: &str = "banner-uploads";
const DEFAULT_REGION: &str = "ap-southeast-2";
const DEFAULT_MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

/// Process-wide settings, read once at startup and shared read-only.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_address: String,
    /// Base URL this server is reachable under; local objects are served
    /// below `<public_url>/files`.
    pub public_url: String,
    pub table_name: String,
    pub upload_bucket: String,
    /// Base of derived banner links, `<asset_base_url>/<key>`.
    pub asset_base_url: String,
    pub region: String,
    pub login_url: Option<String>,
    pub data_dir: PathBuf,
    pub max_body_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let port = match var("PORT") {
            Some(value) => value
                .trim()
                .parse::<u16>()
                .with_context(|| format!("PORT must be a port number, got {value:?}"))?,
            None => DEFAULT_PORT,
        };
        let bind_address = format!("0.0.0.0:{port}");
        let public_url = normalize_base_url(
            &var("DOMAIN").unwrap_or_else(|| format!("localhost:{port}")),
            "http",
        )
        .context("DOMAIN is not a valid base URL")?;
        let asset_base_url = match var("CLOUDFRONT_URL") {
            Some(value) => normalize_base_url(&value, "https")
                .context("CLOUDFRONT_URL is not a valid base URL")?,
            None => format!("{public_url}/assets"),
        };
        let max_body_bytes = match var("MAX_BODY_BYTES") {
            Some(value) => value
                .trim()
                .parse::<usize>()
                .with_context(|| format!("MAX_BODY_BYTES must be a byte count, got {value:?}"))?,
            None => DEFAULT_MAX_BODY_BYTES,
        };

        Ok(Self {
            bind_address,
            public_url,
            table_name: var("TABLE_NAME").unwrap_or_else(|| DEFAULT_TABLE.to_string()),
            upload_bucket: var("UPLOAD_BUCKET").unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
            asset_base_url,
            region: var("AWS_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
            login_url: var("LOGIN_URL"),
            data_dir: var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(default_data_dir),
            max_body_bytes,
        })
    }

    pub fn files_base_url(&self) -> String {
        format!("{}/files", self.public_url)
    }

    pub fn blob_dir(&self) -> PathBuf {
        self.data_dir.join("blobs")
    }

    pub fn catalog_dir(&self) -> PathBuf {
        self.data_dir.join("catalog")
    }
}

fn default_data_dir() -> PathBuf {
    let mut base = dirs::cache_dir().unwrap_or_else(|| PathBuf::from("."));
    base.push("banner-ingest");
    base
}

/// Adds `default_scheme` to scheme-less hosts, collapses doubled schemes such
/// as `http://https://`, and drops trailing slashes.
pub fn normalize_base_url(raw: &str, default_scheme: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    let mut base = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("{default_scheme}://{trimmed}")
    };
    for (doubled, single) in [
        ("http://http://", "http://"),
        ("https://https://", "https://"),
        ("http://https://", "https://"),
        ("https://http://", "http://"),
    ] {
        while base.starts_with(doubled) {
            base = base.replacen(doubled, single, 1);
        }
    }
    let parsed = Url::parse(&base).with_context(|| format!("cannot parse {base:?}"))?;
    if parsed.host_str().is_none_or(str::is_empty) {
        bail!("{base:?} has no host");
    }
    Ok(base)
}
