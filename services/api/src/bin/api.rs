//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{CommandCatalogRefresher, DbAdapter, GoogleCalendarAdapter, GoogleOAuthAdapter},
    config::Config,
    error::ApiError,
    web::{build_router, AppState},
};
use chrono::Duration;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use stylecal_core::{
    fetch::EventFetcher,
    jobs::{CatalogRefreshJob, JobRunner},
    CalendarService, CalendarSettings, RuleAdmin, SyncWriter, TokenRefresher,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Provider Adapters ---
    let http_client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.google.http_timeout_secs))
        .build()
        .map_err(|e| ApiError::Internal(format!("Failed to build HTTP client: {}", e)))?;
    let oauth = Arc::new(
        GoogleOAuthAdapter::new(http_client.clone(), &config.google)
            .map_err(|e| ApiError::Internal(format!("Invalid GOOGLE_AUTH_URL: {}", e)))?,
    );
    let calendar_api = Arc::new(GoogleCalendarAdapter::new(http_client, &config.google.calendar_api_base));
    let refresher = Arc::new(CommandCatalogRefresher::from_commands(
        config.catalog_scrape_command.as_deref(),
        config.catalog_import_command.as_deref(),
    ));

    // --- 4. Build the Core Services & Shared AppState ---
    let rules = RuleAdmin::new(db_adapter.clone());
    let calendar = CalendarService::new(
        TokenRefresher::new(db_adapter.clone(), oauth),
        EventFetcher::new(calendar_api),
        rules.clone(),
        SyncWriter::new(db_adapter.clone()),
        db_adapter.clone(),
        CalendarSettings {
            window_days: config.sync_window_days,
            list_limit: config.event_list_limit,
        },
    );
    let catalog_refresh = CatalogRefreshJob::new(
        JobRunner::new(db_adapter.clone(), format!("api-{}", Uuid::new_v4())),
        refresher,
        Duration::seconds(config.catalog_refresh_lease_secs),
    );

    let app_state = Arc::new(AppState {
        accounts: db_adapter,
        config: config.clone(),
        calendar,
        rules,
        catalog_refresh,
    });

    // --- 5. Create the Web Router ---
    let app = build_router(app_state)?;

    // --- 6. Start the Server ---
    let shutdown = CancellationToken::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Shutdown signal received, draining connections...");
        on_signal.cancel();
    });

    info!("Starting server on {}", config.bind_address);
    info!("Swagger UI available at http://{}/swagger-ui", config.bind_address);
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("Server stopped.");
    Ok(())
}
