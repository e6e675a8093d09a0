//! Roster Service
//!
//! Membership roster controller with a local SQLite collection, an optional remote
//! collection over REST, passphrase-gated deletes and document/spreadsheet export.

mod api;
mod config;
mod db;
mod errors;
mod export;
mod models;
mod preferences;
mod roster;
mod store;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::sync::{watch, Mutex, RwLock};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use db::SqliteStore;
use preferences::ThemePreference;
use roster::{RosterController, SharedPassphrase, ViewState};
use store::{HttpStore, RecordStore};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Local collection served under `/api/members`
    pub collection: Arc<SqliteStore>,
    pub roster: Arc<Mutex<RosterController>>,
    /// Latest published roster view; readable while an intent is in flight
    pub view: watch::Receiver<ViewState>,
    pub preferences: Arc<RwLock<ThemePreference>>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Roster Service");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    // Initialize the local collection
    let pool = db::init_database(&config.db_path).await?;
    let collection = Arc::new(SqliteStore::new(pool));

    // The controller reads from a remote collection when one is configured
    let store: Arc<dyn RecordStore> = match &config.store_url {
        Some(url) => {
            tracing::info!("Using remote collection at {}", url);
            Arc::new(HttpStore::new(url.clone(), config.store_timeout)?)
        }
        None => collection.clone(),
    };

    let mut controller = RosterController::new(
        store,
        Arc::new(SharedPassphrase::new(config.passphrase.clone())),
        config.features.clone(),
    );

    tracing::info!("Loading roster...");
    match controller.refresh().await {
        Ok(()) => tracing::info!(
            "Roster loaded with {} members",
            controller.cache().members().len()
        ),
        Err(e) => tracing::warn!("Initial roster load failed, starting empty: {}", e),
    }
    controller.publish();

    let preferences = ThemePreference::load(&config.prefs_path, config.system_theme);
    tracing::info!("Theme: {:?}", preferences.theme());

    let state = AppState {
        collection,
        view: controller.subscribe(),
        roster: Arc::new(Mutex::new(controller)),
        preferences: Arc::new(RwLock::new(preferences)),
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Collection
        .route("/members", get(api::list_members).post(api::create_member))
        .route(
            "/members/{id}",
            get(api::get_member).delete(api::delete_member),
        )
        // Roster view
        .route("/roster/view", get(api::get_view))
        .route("/roster/intents", post(api::post_intent))
        // Preferences
        .route(
            "/preferences/theme",
            get(api::get_theme).put(api::set_theme),
        );

    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
