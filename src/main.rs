use axum::{routing::get, Router};
use std::panic;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use finsight_collab::config::{self, Config};
use finsight_collab::db::dbcollab;
use finsight_collab::docs::ApiDoc;
use finsight_collab::registry::SessionRegistry;
use finsight_collab::routes::api::create_api_routes;
use finsight_collab::sweeper;
use finsight_collab::websocket::handler::websocket_handler;
use finsight_collab::ws::sessionctx;

#[tokio::main]
async fn main() {
    // Set panic hook for better error messages
    panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
    }));

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            // Default to info level, but allow debug for our app
            "finsight_collab=debug,tower_http=debug,axum::rejection=trace,info".into()
        }))
        .init();

    info!("Starting server...");

    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        error!("Failed to load configuration: {}", e);
        warn!("Using default configuration");
        Config::default()
    });
    info!("Environment: {}", config.environment);
    config::init_config(config.clone());

    // Initialize database connection if URL is provided
    if let Some(db_url) = &config.db_url {
        match dbcollab::init_db(db_url).await {
            Ok(_) => info!("Database initialized successfully"),
            Err(e) => {
                error!("Failed to initialize database: {}", e);
                warn!("Collaboration sessions will not be able to persist markers");
            }
        }
    } else {
        warn!("No database URL configured - collaboration persistence will not be available");
    }

    // Initialize the session lookup cache used by join authorization
    sessionctx::init_session_ctx_cache();

    // The registry owns the live connection set for every session
    let registry = Arc::new(SessionRegistry::new());

    // Create API routes
    let api_routes = create_api_routes(registry.clone());

    // WebSocket endpoint for the collaboration protocol
    let ws_routes = Router::new()
        .route("/ws", get(websocket_handler))
        .with_state(registry.clone());

    // Combine all routes
    let app_routes = Router::new()
        // Mount API routes
        .nest("/api", api_routes)
        // Mount the collaboration channel
        .merge(ws_routes)
        // Mount Swagger UI
        .merge(SwaggerUi::new("/swagger").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Add tracing layer
        .layer(TraceLayer::new_for_http());

    // Spawn the marker expiry sweeper
    let sweep_interval = Duration::from_secs(config.sweep_interval_secs);
    tokio::spawn(async move {
        sweeper::run_expiry_sweeper(sweep_interval).await;
    });

    // Start the HTTP server
    let listener = tokio::net::TcpListener::bind(config.server_address())
        .await
        .unwrap_or_else(|_| panic!("Failed to bind to {}", config.server_address()));

    info!("🚀 Server running on http://{}", config.server_address());
    info!("📡 Collaboration channel available at ws://{}/ws", config.server_address());
    info!("📚 Swagger UI available at http://{}/swagger", config.server_address());

    axum::serve(listener, app_routes)
        .await
        .expect("Server failed to start");
}
