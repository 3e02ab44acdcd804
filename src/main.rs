use anyhow::{Context, Result};
use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use zwischen::analytics::GeoIpResolver;
use zwischen::api::create_app;
use zwischen::config::Config;
use zwischen::state::AppState;
use zwischen::storage;

async fn greet() -> Json<Value> {
    Json(json!({ "message": "hello from zwischen" }))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration");

    // Initialize storage
    let store = storage::connect(&config.database)
        .await
        .context("Failed to initialize event store")?;
    info!("Event store initialized successfully");

    // Open the geolocation dataset once; a broken dataset stops startup here
    let geo = GeoIpResolver::from_config(&config.geoip)
        .context("Failed to open geolocation dataset")?;
    match config.geoip.city_db_path.as_deref() {
        Some(path) => info!(
            "🌍 Geolocation enabled ({}, {} ms lookup timeout)",
            path, config.geoip.lookup_timeout_ms
        ),
        None => warn!("GEOIP_CITY_DB_PATH not set - all locations will be recorded as Unknown"),
    }

    info!(
        "Exempt from instrumentation: {}",
        config.instrumentation.exempt_path_prefixes.join(", ")
    );

    let state = AppState::new(&config.instrumentation, store, Arc::new(geo));
    let app = create_app(Router::new().route("/", get(greet)), state);

    let addr = format!("{}:{}", config.api_server.host, config.api_server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🚀 Server listening on http://{}", addr);
    info!("   - Metrics available at http://{}/analytics/metrics", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
