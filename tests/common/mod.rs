//! Integration test common infrastructure.
//!
//! Builds a protected router around a tiny application and drives it with
//! `tower::ServiceExt::oneshot`, attaching the peer address the way
//! `into_make_service_with_connect_info` would.

#![allow(dead_code)]

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, Response};
use axum::routing::get;
use axum::{Router, middleware};
use pilot_shield::config::ShieldConfig;
use pilot_shield::http::protect;
use pilot_shield::security::Shield;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;

pub const BROWSER: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 Chrome/126.0 Safari/537.36";

pub fn shield(config: ShieldConfig) -> Arc<Shield> {
    Arc::new(Shield::new(config).expect("default patterns compile"))
}

/// Application router behind the protection layer.
pub fn app(shield: Arc<Shield>) -> Router {
    Router::new()
        .route("/api/quotes", get(|| async { "quotes" }))
        .route("/api/holdings", get(|| async { "holdings" }))
        .fallback(|| async { "fallback" })
        .layer(middleware::from_fn_with_state(shield, protect))
}

pub fn peer(ip: [u8; 4]) -> SocketAddr {
    SocketAddr::from((ip, 50_000))
}

/// A browser-like GET from `peer`.
pub fn browser_get(peer: SocketAddr, uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("user-agent", BROWSER)
        .header("accept-language", "en-US,en;q=0.9")
        .header("accept-encoding", "gzip, deflate, br")
        .extension(ConnectInfo(peer))
        .body(Body::empty())
        .unwrap()
}

/// A GET from `peer` with no headers at all.
pub fn bare_get(peer: SocketAddr, uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .extension(ConnectInfo(peer))
        .body(Body::empty())
        .unwrap()
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
