//! pdf-desk - Entry point
//!
//! Serves a PDF viewer session over stdio. Any arguments are directories
//! the session may read and write PDFs in.

use pdf_desk::{run_server_with_config, ServerConfig, SettingsStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdf_desk=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let store = SettingsStore::default_location();
    tracing::info!(settings = %store.path().display(), "Starting pdf-desk");

    run_server_with_config(ServerConfig {
        resource_dirs: std::env::args().skip(1).collect(),
        settings_store: Some(store),
        ..ServerConfig::default()
    })
    .await
}
