//! Request protection layer for axum routers.
//!
//! ```ignore
//! let app = Router::new()
//!     .route("/api/quotes", get(quotes))
//!     .layer(middleware::from_fn_with_state(shield.clone(), protect));
//! ```
//!
//! Serve the router with `into_make_service_with_connect_info::<SocketAddr>()`
//! so the peer address is available; without it every request is attributed
//! to the unknown source.

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http::{HeaderMap, HeaderName, HeaderValue};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use crate::security::{RequestMeta, Shield, Verdict};

/// Headers added to every response that passes the shield.
const SECURITY_HEADERS: [(&str, &str); 4] = [
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("x-xss-protection", "1; mode=block"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
];

pub const ATTACK_MODE_HEADER: &str = "x-attack-mode";

/// Evaluate the request and either reject it or forward it.
pub async fn protect(State(shield): State<Arc<Shield>>, request: Request, next: Next) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|connect_info| connect_info.0);
    let source = client_source(
        request.headers(),
        peer,
        shield.config().access.trust_forwarded_for,
    );
    let path = request
        .uri()
        .path_and_query()
        .map_or_else(|| request.uri().path(), |pq| pq.as_str());
    let meta = RequestMeta::new(source, request.method().as_str(), path)
        .with_headers(request.headers().clone());

    match shield.evaluate(&meta) {
        Verdict::Reject(rejection) => rejection.into_response(),
        Verdict::Pass { under_attack } => {
            let mut response = next.run(request).await;
            decorate(response.headers_mut(), under_attack);
            response
        }
    }
}

/// Identify the client.
///
/// The socket peer is used unless `trust_forwarded_for` is set and the
/// left-most `X-Forwarded-For` hop parses as a routable client address.
/// Hops that are not IP addresses, or that claim loopback or unspecified
/// addresses, fall back to the peer. An empty string is returned when
/// nothing is known.
pub fn client_source(headers: &HeaderMap, peer: Option<SocketAddr>, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for
        && let Some(ip) = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(parse_hop)
    {
        return ip.to_string();
    }
    peer.map(|addr| addr.ip().to_canonical().to_string())
        .unwrap_or_default()
}

/// Parse one forwarded hop, with or without a port.
fn parse_hop(hop: &str) -> Option<IpAddr> {
    let hop = hop.trim();
    let ip = hop
        .parse::<IpAddr>()
        .or_else(|_| hop.parse::<SocketAddr>().map(|addr| addr.ip()))
        .ok()?
        .to_canonical();
    (!ip.is_loopback() && !ip.is_unspecified()).then_some(ip)
}

fn decorate(headers: &mut HeaderMap, under_attack: bool) {
    for (name, value) in SECURITY_HEADERS {
        headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
    }
    if under_attack {
        headers.insert(
            HeaderName::from_static(ATTACK_MODE_HEADER),
            HeaderValue::from_static("active"),
        );
    }
}
