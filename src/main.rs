use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use banner_ingest::{config::AppConfig, local_app};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("banner_ingest=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(AppConfig::from_env()?);
    tokio::fs::create_dir_all(config.blob_dir().join(&config.upload_bucket)).await?;
    tokio::fs::create_dir_all(config.catalog_dir()).await?;

    let router = local_app(config.clone());
    let tcp_listener = tokio::net::TcpListener::bind(&config.bind_address).await?;

    tracing::info!(
        bind = %config.bind_address,
        table = %config.table_name,
        bucket = %config.upload_bucket,
        region = %config.region,
        assets = %config.asset_base_url,
        data_dir = %config.data_dir.display(),
        "banner ingest server started"
    );
    if let Some(login_url) = config.login_url.as_deref() {
        tracing::debug!(login_url, "login url configured");
    }

    axum::serve(tcp_listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
