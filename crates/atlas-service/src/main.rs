//! Atlas geospatial read API HTTP service.
//!
//! See [`atlas_service`] for the routes and `atlas_service_shared::config`
//! for the environment variables read at startup. Logging honours `RUST_LOG`
//! and `LOG_FORMAT`; metrics honour `METRICS_ENABLED`.

use std::net::SocketAddr;

use tracing::{error, info, warn};

use atlas_service::{app, app_with_cors};
use atlas_service_shared::{
    init_logging, init_metrics, AppState, LoggingConfig, MetricsConfig, ServiceConfig,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_config = LoggingConfig::from_env().with_service("atlas");
    init_logging(&logging_config);

    let metrics_config = MetricsConfig::from_env();
    if let Err(e) = init_metrics(&metrics_config) {
        warn!(error = %e, "failed to initialize metrics, continuing without metrics");
    }

    let config = ServiceConfig::from_env().map_err(|e| {
        error!(error = %e, "invalid configuration");
        e
    })?;

    info!(
        port = config.port,
        id_min = config.pipeline.bounds.min,
        id_max = config.pipeline.bounds.max,
        cache_ttl_secs = config.pipeline.ttl.map(|ttl| ttl.as_secs()).unwrap_or(0),
        "starting atlas service"
    );

    let state = AppState::connect(&config).await.map_err(|e| {
        error!(error = %e, "failed to build application state");
        e
    })?;

    let router = match config.cors_origin.as_deref() {
        Some(origin) => {
            info!(origin = origin, "cors enabled");
            app_with_cors(state, origin)?
        }
        None => app(state),
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(addr = %addr, "listening on");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
