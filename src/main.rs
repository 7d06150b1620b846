//! pilot-shield - protection front for the WealthPilot HTTP API.
//!
//! Loads `config.toml` (or the path given as the first argument), starts the
//! janitor and the admin server, and serves the protected application.

use anyhow::Context;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router, middleware};
use pilot_shield::config::{Config, LoggingConfig, validation};
use pilot_shield::http::{protect, run_admin_server};
use pilot_shield::metrics;
use pilot_shield::security::Shield;
use pilot_shield::security::janitor::spawn_janitor;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    // A missing file falls back to defaults so the binary runs out of the box.
    let (config, loaded) = if std::path::Path::new(&config_path).exists() {
        (
            Config::load(&config_path)
                .with_context(|| format!("failed to load config from {config_path}"))?,
            true,
        )
    } else {
        (Config::default(), false)
    };

    init_tracing(&config.logging);

    if loaded {
        info!(path = %config_path, "Configuration loaded");
    } else {
        info!(path = %config_path, "Config file not found, using defaults");
    }

    if let Err(errors) = validation::validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        anyhow::bail!("configuration has {} error(s)", errors.len());
    }

    metrics::init();

    let shield = Arc::new(Shield::new(config.shield.clone()).context("failed to build shield")?);
    info!(
        burst_limit = config.shield.burst.max_requests,
        suspicion_threshold = config.shield.suspicion.threshold,
        fingerprint_limit = config.shield.fingerprint.limit,
        attack_threshold = config.shield.global.attack_threshold,
        "Shield ready"
    );

    let janitor = spawn_janitor(Arc::clone(&shield), config.shield.janitor.interval());

    if config.server.admin_listen.port() == 0 {
        info!("Admin server disabled");
    } else {
        let admin_addr = config.server.admin_listen;
        let admin_shield = Arc::clone(&shield);
        tokio::spawn(async move {
            run_admin_server(admin_addr, admin_shield).await;
        });
    }

    let app = Router::new()
        .route("/health", get(health))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(Arc::clone(&shield), protect));

    let listener = tokio::net::TcpListener::bind(config.server.listen)
        .await
        .with_context(|| format!("failed to bind {}", config.server.listen))?;
    info!(addr = %config.server.listen, "Listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    janitor.abort();
    info!("Shutdown complete");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "success": false, "error": "Not found", "code": "NOT_FOUND" })),
    )
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
