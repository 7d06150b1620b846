//! pilot-shield: adaptive abuse and DDoS protection for HTTP backends.
//!
//! The [`security::Shield`] evaluates every inbound request against an
//! allow/deny registry, a per-source burst window, suspicion signals with
//! automatic bans, a cross-source request fingerprint limiter, and a global
//! attack-mode monitor. [`http::protect`] plugs it into an axum router.

pub mod config;
pub mod error;
pub mod http;
pub mod metrics;
pub mod security;
