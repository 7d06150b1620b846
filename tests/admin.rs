//! Admin API: status, ban management, exemptions, metrics.

mod common;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use common::{browser_get, json_body, peer, send, shield};
use pilot_shield::config::ShieldConfig;
use pilot_shield::http::admin;
use serde_json::json;

fn admin_app() -> (Router, Router) {
    let shield = shield(ShieldConfig::default());
    (admin::router(shield.clone()), common::app(shield))
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn status_reports_normal_state() {
    let (admin, _) = admin_app();
    let response = send(&admin, get("/shield/status")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["under_attack"], false);
    assert_eq!(body["attack_state"], "normal");
    assert_eq!(body["banned"], 0);
    assert_eq!(body["allowed"], 2);
    assert!(body["attack_duration_secs"].is_null());
}

#[tokio::test]
async fn manual_ban_lifecycle() {
    let (admin, app) = admin_app();

    let response = send(
        &admin,
        post_json(
            "/shield/bans",
            json!({ "source": "203.0.113.50", "reason": "credential stuffing", "duration_secs": 120 }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let bans = json_body(send(&admin, get("/shield/bans")).await).await;
    let bans = bans.as_array().unwrap();
    assert_eq!(bans.len(), 1);
    assert_eq!(bans[0]["source"], "203.0.113.50");
    assert_eq!(bans[0]["reason"], "credential stuffing");
    assert_eq!(bans[0]["origin"], "manual");
    assert!(bans[0]["remaining_secs"].as_u64().unwrap() <= 120);

    let response = send(&app, browser_get(peer([203, 0, 113, 50]), "/api/quotes")).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body = json_body(send(&admin, delete("/shield/bans/203.0.113.50")).await).await;
    assert_eq!(body["removed"], true);
    let body = json_body(send(&admin, delete("/shield/bans/203.0.113.50")).await).await;
    assert_eq!(body["removed"], false);

    let response = send(&app, browser_get(peer([203, 0, 113, 50]), "/api/quotes")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn ban_defaults_to_manual_duration() {
    let (admin, _) = admin_app();
    let response = send(&admin, post_json("/shield/bans", json!({ "source": "203.0.113.51" }))).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let bans = json_body(send(&admin, get("/shield/bans")).await).await;
    assert_eq!(bans[0]["reason"], "Manual ban");
    assert!(bans[0]["remaining_secs"].as_u64().unwrap() > 86_000);
}

#[tokio::test]
async fn exempt_and_empty_sources_are_refused() {
    let (admin, _) = admin_app();

    let response = send(&admin, post_json("/shield/bans", json!({ "source": "127.0.0.1" }))).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(json_body(response).await["code"], "exempt_source");

    let response = send(&admin, post_json("/shield/bans", json!({ "source": "  " }))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(&admin, post_json("/shield/allow", json!({ "source": "" }))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn ban_duration_must_be_in_range() {
    let (admin, _) = admin_app();

    for duration in [u64::MAX, 0] {
        let response = send(
            &admin,
            post_json("/shield/bans", json!({ "source": "203.0.113.52", "duration_secs": duration })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "duration {duration}");
        assert_eq!(json_body(response).await["code"], "invalid_duration");
    }
    let bans = json_body(send(&admin, get("/shield/bans")).await).await;
    assert!(bans.as_array().unwrap().is_empty());

    let response = send(
        &admin,
        post_json("/shield/bans", json!({ "source": "203.0.113.52", "duration_secs": 1 })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn allow_lifecycle() {
    let (admin, app) = admin_app();

    let response = send(&admin, post_json("/shield/allow", json!({ "source": "192.0.2.80" }))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = send(&app, browser_get(peer([192, 0, 2, 80]), "/.env")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(send(&admin, delete("/shield/allow/192.0.2.80")).await).await;
    assert_eq!(body["removed"], true);
    let body = json_body(send(&admin, delete("/shield/allow/192.0.2.80")).await).await;
    assert_eq!(body["removed"], false);

    let response = send(&app, browser_get(peer([192, 0, 2, 80]), "/.env")).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn seed_exemptions_cannot_be_removed() {
    let (admin, _) = admin_app();
    let response = send(&admin, delete("/shield/allow/127.0.0.1")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(json_body(response).await["code"], "seed_entry");
}

#[tokio::test]
async fn metrics_endpoint_serves_text() {
    pilot_shield::metrics::init();
    let (admin, app) = admin_app();
    send(&app, browser_get(peer([192, 0, 2, 90]), "/wp-admin")).await;

    let response = send(&admin, get("/metrics")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("shield_requests_total"));
    assert!(text.contains("code=\"SUSPICIOUS_REQUEST\""));
}
