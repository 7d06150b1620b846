//! Abuse protection engine.
//!
//! Provides the per-request protection pipeline:
//! - **Registry**: exempt and banned sources, lazy ban expiry
//! - **Burst**: per-source sliding window
//! - **Detector**: stateless path/header/User-Agent signals
//! - **Suspicion**: per-source decaying score driving automatic bans
//! - **Fingerprint**: per-request-shape fixed window across all sources
//! - **Global**: system-wide request rate with hysteresis
//! - **Janitor**: periodic eviction of stale entries from every store
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                               Shield                                │
//! ├──────────┬──────────┬────────────┬─────────────┬─────────┬──────────┤
//! │ Registry │  Burst   │ Detector + │ Fingerprint │ Global  │ Janitor  │
//! │ DashSet  │ DashMap  │ Suspicion  │  DashMap    │ Mutex   │ tokio    │
//! │ DashMap  │ VecDeque │ RegexSet   │  SHA-256    │ 2-state │ interval │
//! └──────────┴──────────┴────────────┴─────────────┴─────────┴──────────┘
//! ```
//!
//! Every store is locked independently and no lock is held across an
//! await point, so requests from different sources never contend.

pub mod burst;
pub mod detector;
pub mod fingerprint;
pub mod global;
pub mod janitor;
pub mod registry;
pub mod shield;
pub mod suspicion;

pub use detector::Signal;
pub use global::AttackState;
pub use registry::{BanEntry, BanOrigin};
pub use shield::{Shield, ShieldStatus, Verdict};

use http::{HeaderMap, HeaderName, HeaderValue};

/// Source identifier used when the client address is unavailable.
pub const UNKNOWN_SOURCE: &str = "unknown";

/// The parts of an inbound request the shield looks at.
#[derive(Debug, Clone)]
pub struct RequestMeta {
    /// Client address, or [`UNKNOWN_SOURCE`].
    pub source: String,
    pub method: String,
    /// Path including the query string.
    pub path: String,
    pub headers: HeaderMap,
}

impl RequestMeta {
    pub fn new(source: impl Into<String>, method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            source: normalize_source(source.into()),
            method: method.into(),
            path: path.into(),
            headers: HeaderMap::new(),
        }
    }

    /// Replace the request headers.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Set a single header, replacing any previous value.
    /// Invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Header value as text. Missing and non-UTF-8 values are both `None`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

fn normalize_source(source: String) -> String {
    let trimmed = source.trim();
    if trimmed.is_empty() {
        UNKNOWN_SOURCE.to_string()
    } else if trimmed.len() == source.len() {
        source
    } else {
        trimmed.to_string()
    }
}
