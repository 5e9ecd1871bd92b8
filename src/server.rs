use anyhow::Result;
use axum::{middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{
    auth,
    config::Config,
    handlers::{self, observability_api::LogViewerState},
    metrics,
    observability::{CallRunner, Clock, LogStore, RetentionSweeper, SystemClock},
    signals::setup_signal_handlers,
};

/// Start the log viewer server
///
/// This function:
/// 1. Initializes metrics
/// 2. Opens the log store and starts the retention sweeper
/// 3. Sets up signal handlers for graceful shutdown
/// 4. Binds to the configured address and serves until shutdown
/// 5. Stops the sweeper
pub async fn start_server(config: Config) -> Result<()> {
    info!("Initializing Prometheus metrics...");
    let metrics_handle = Arc::new(metrics::init_metrics()?);

    let store = Arc::new(LogStore::open(&config.storage.database_path).await?);
    info!(path = %config.storage.database_path, "Log store opened");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let runner = CallRunner::new(store.clone(), clock.clone());
    let sweeper = Arc::new(RetentionSweeper::new(runner, store.clone(), clock));
    let sweeper_handle = sweeper.start();

    // Setup signal handlers (SIGTERM, SIGINT for shutdown)
    let (shutdown_tx, signal_handle) = setup_signal_handlers();
    let mut shutdown_rx = shutdown_tx.subscribe();

    let app = create_router(&config, LogViewerState::new(store), metrics_handle);

    let addr = SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));

    info!("Starting log viewer on {}", addr);
    info!(
        "Configuration: base path {}, auth {}",
        config.server.base_path,
        if config.auth.credentials().is_some() { "enabled" } else { "disabled" },
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            info!("Shutdown signal received, draining connections...");
        })
        .await?;

    sweeper_handle.stop().await;
    signal_handle.await?;
    info!("Server stopped gracefully");

    Ok(())
}

/// Create the Axum router with all routes and middleware
///
/// The log viewer API sits under `server.base_path`, behind Basic auth when
/// credentials are configured, and answers every request with a permissive
/// CORS header.
pub fn create_router(config: &Config, state: LogViewerState, metrics_handle: Arc<PrometheusHandle>) -> Router {
    let mut api = handlers::observability_api::routes(state);

    if let Some(credentials) = config.auth.credentials() {
        api = api.layer(middleware::from_fn_with_state(
            Arc::new(credentials),
            auth::auth_middleware,
        ));
    }

    // Outside auth so 401s carry the header too
    let api = api.layer(cors_layer());

    // Public endpoints (no auth required)
    let mut public = Router::new().route("/health", get(handlers::metrics_handler::health));
    if config.metrics.enabled {
        public = public.route(
            &config.metrics.endpoint,
            get(handlers::metrics_handler::metrics).with_state(metrics_handle),
        );
    }

    let app = if config.server.base_path == "/" {
        public.merge(api)
    } else {
        public.nest(&config.server.base_path, api)
    };

    app.layer(TraceLayer::new_for_http())
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_router() {
        let config = Config::default();
        let store = Arc::new(LogStore::in_memory().await.unwrap());
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        let metrics_handle = Arc::new(recorder.handle());

        let _app = create_router(&config, LogViewerState::new(store), metrics_handle);
        // Router created successfully - no panic
    }

    #[tokio::test]
    async fn test_create_router_at_root_with_auth() {
        let mut config = Config::default();
        config.server.base_path = "/".to_string();
        config.auth.username = Some("admin".to_string());
        config.auth.password = Some("secret".to_string());
        let store = Arc::new(LogStore::in_memory().await.unwrap());
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();

        let _app = create_router(&config, LogViewerState::new(store), Arc::new(recorder.handle()));
    }
}
