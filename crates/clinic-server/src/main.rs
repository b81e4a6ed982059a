//! Clinic REST API server binary.

use std::sync::Arc;

use anyhow::Context;
use clinic_core::models::CatalogSeed;
use clinic_core::{CatalogReader, Database};
use clinic_server::{AppState, FsSignatureStore, ServerConfig};
use tower_http::services::ServeDir;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_DIRECTIVES: &str = "clinic_server=info,clinic_core=info";

/// Start the clinic REST API.
///
/// Reads `.env` if present, then the `CLINIC_*` variables documented on
/// [`ServerConfig::from_env`].
///
/// # Errors
/// Returns an error if:
/// - the configuration is invalid,
/// - the database cannot be opened or the catalog seed cannot be loaded, or
/// - the server address cannot be bound.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVES)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;

    let db = Database::open(&config.db_path)
        .with_context(|| format!("opening database {}", config.db_path.display()))?;

    if let Some(seed_path) = &config.catalog_seed {
        let raw = std::fs::read_to_string(seed_path)
            .with_context(|| format!("reading catalog seed {}", seed_path.display()))?;
        let seed: CatalogSeed = serde_json::from_str(&raw)
            .with_context(|| format!("parsing catalog seed {}", seed_path.display()))?;
        CatalogReader::new(&db).seed(&seed)?;
    }

    if config.api_key.is_none() {
        tracing::warn!("CLINIC_API_KEY is not set; requests are not authenticated");
    }

    let signatures = FsSignatureStore::new(
        config.signature_dir.clone(),
        config.signature_base_url.clone(),
    );
    let state = AppState::from_config(db, Arc::new(signatures), &config);

    let mut app = clinic_server::router(state);
    if config.signature_base_url.starts_with('/') && config.signature_base_url.len() > 1 {
        app = app.nest_service(
            config.signature_base_url.trim_end_matches('/'),
            ServeDir::new(&config.signature_dir),
        );
    }

    tracing::info!("-- Starting clinic REST API on {}", config.rest_addr);

    let listener = tokio::net::TcpListener::bind(&config.rest_addr)
        .await
        .with_context(|| format!("binding {}", config.rest_addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
