//! Operator endpoints for inspecting and steering the shield.
//!
//! | Method | Path                     | Action                        |
//! |--------|--------------------------|-------------------------------|
//! | GET    | `/shield/status`         | attack state and store sizes  |
//! | GET    | `/shield/bans`           | active bans                   |
//! | POST   | `/shield/bans`           | manual ban                    |
//! | DELETE | `/shield/bans/:source`   | lift a ban                    |
//! | POST   | `/shield/allow`          | exempt a source               |
//! | DELETE | `/shield/allow/:source`  | remove an exemption           |
//! | GET    | `/metrics`               | Prometheus text format        |

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use http::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

use crate::config::MAX_BAN_SECS;
use crate::error::ShieldError;
use crate::security::Shield;

/// Body of `POST /shield/bans`.
#[derive(Debug, Deserialize)]
pub struct BanRequest {
    pub source: String,
    #[serde(default = "default_ban_reason")]
    pub reason: String,
    /// Overrides the configured manual ban duration. Must be between 1 and
    /// [`MAX_BAN_SECS`].
    pub duration_secs: Option<u64>,
}

fn default_ban_reason() -> String {
    "Manual ban".to_string()
}

/// Body of `POST /shield/allow`.
#[derive(Debug, Deserialize)]
pub struct AllowRequest {
    pub source: String,
}

pub fn router(shield: Arc<Shield>) -> Router {
    Router::new()
        .route("/shield/status", get(status))
        .route("/shield/bans", get(list_bans).post(create_ban))
        .route("/shield/bans/:source", delete(remove_ban))
        .route("/shield/allow", post(create_allow))
        .route("/shield/allow/:source", delete(remove_allow))
        .route("/metrics", get(metrics_handler))
        .with_state(shield)
}

async fn status(State(shield): State<Arc<Shield>>) -> Response {
    Json(shield.status(Instant::now())).into_response()
}

async fn list_bans(State(shield): State<Arc<Shield>>) -> Response {
    Json(shield.bans(Instant::now())).into_response()
}

async fn create_ban(State(shield): State<Arc<Shield>>, Json(body): Json<BanRequest>) -> Response {
    let source = body.source.trim();
    if source.is_empty() {
        return error_reply(StatusCode::BAD_REQUEST, "empty_source", "source must not be empty");
    }

    if let Some(secs) = body.duration_secs
        && !(1..=MAX_BAN_SECS).contains(&secs)
    {
        return error_reply(
            StatusCode::BAD_REQUEST,
            "invalid_duration",
            &format!("duration_secs must be between 1 and {MAX_BAN_SECS}"),
        );
    }

    let duration = body.duration_secs.map(Duration::from_secs);
    if !shield.manual_ban(source, &body.reason, duration) {
        return error_reply(
            StatusCode::CONFLICT,
            "exempt_source",
            &format!("{source} is exempt and cannot be banned"),
        );
    }

    info!(source = %source, reason = %body.reason, "manual ban via admin API");
    (
        StatusCode::CREATED,
        Json(json!({ "success": true, "source": source })),
    )
        .into_response()
}

async fn remove_ban(State(shield): State<Arc<Shield>>, Path(source): Path<String>) -> Response {
    let removed = shield.unban(&source);
    Json(json!({ "success": true, "removed": removed })).into_response()
}

async fn create_allow(State(shield): State<Arc<Shield>>, Json(body): Json<AllowRequest>) -> Response {
    let source = body.source.trim();
    if source.is_empty() {
        return error_reply(StatusCode::BAD_REQUEST, "empty_source", "source must not be empty");
    }
    shield.allow(source);
    Json(json!({ "success": true, "source": source })).into_response()
}

async fn remove_allow(State(shield): State<Arc<Shield>>, Path(source): Path<String>) -> Response {
    match shield.disallow(&source) {
        Ok(removed) => Json(json!({ "success": true, "removed": removed })).into_response(),
        Err(e @ ShieldError::SeedEntry(_)) => {
            error_reply(StatusCode::CONFLICT, e.error_code(), &e.to_string())
        }
        Err(e) => error_reply(StatusCode::INTERNAL_SERVER_ERROR, e.error_code(), &e.to_string()),
    }
}

async fn metrics_handler() -> String {
    crate::metrics::gather_metrics()
}

fn error_reply(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(json!({ "success": false, "error": message, "code": code })),
    )
        .into_response()
}
