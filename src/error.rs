//! Error and rejection types for pilot-shield.
//!
//! Policy decisions are not failures: a blocked request is a [`Rejection`]
//! value carried by `Verdict::Reject`, with a stable machine code that
//! callers branch on. [`ShieldError`] covers the few genuine failures,
//! all of them at construction time.

use axum::Json;
use axum::response::{IntoResponse, Response};
use http::{HeaderValue, StatusCode, header};
use serde_json::json;
use thiserror::Error;

// ============================================================================
// Rejections (request policy outcomes)
// ============================================================================

/// Terminal outcome for a blocked request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("Access denied: your IP address has been blocked")]
    IpBlocked,

    #[error("Too many requests in a short period, slow down")]
    BurstLimit,

    #[error("Request blocked: suspicious request pattern detected")]
    SuspiciousRequest,

    #[error("Too many identical requests, try again later")]
    FingerprintLimit,
}

impl Rejection {
    /// Stable machine-readable code included in the response body.
    #[inline]
    pub fn code(&self) -> &'static str {
        match self {
            Self::IpBlocked => "IP_BLOCKED",
            Self::BurstLimit => "BURST_LIMIT",
            Self::SuspiciousRequest => "SUSPICIOUS_REQUEST",
            Self::FingerprintLimit => "FINGERPRINT_LIMIT",
        }
    }

    #[inline]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::IpBlocked | Self::SuspiciousRequest => StatusCode::FORBIDDEN,
            Self::BurstLimit | Self::FingerprintLimit => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    /// Seconds the client should wait before retrying, for rate rejections.
    #[inline]
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Self::BurstLimit => Some(1),
            Self::FingerprintLimit => Some(60),
            Self::IpBlocked | Self::SuspiciousRequest => None,
        }
    }

    /// JSON body sent to the client.
    pub fn body(&self) -> serde_json::Value {
        let mut body = json!({
            "success": false,
            "error": self.to_string(),
            "code": self.code(),
        });
        if let Some(secs) = self.retry_after() {
            body["retryAfter"] = json!(secs);
        }
        body
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let mut response = (self.status(), Json(self.body())).into_response();
        if let Some(secs) = self.retry_after() {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

// ============================================================================
// Shield errors (construction and administration)
// ============================================================================

/// Errors raised while building or administering a shield.
#[derive(Debug, Error)]
pub enum ShieldError {
    #[error("invalid {list} pattern: {source}")]
    Pattern {
        list: &'static str,
        #[source]
        source: regex::Error,
    },

    #[error("{0} is a built-in exemption and cannot be removed")]
    SeedEntry(String),
}

impl ShieldError {
    /// Get a static error code string for logging and API replies.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Pattern { .. } => "invalid_pattern",
            Self::SeedEntry(_) => "seed_entry",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_and_statuses() {
        assert_eq!(Rejection::IpBlocked.code(), "IP_BLOCKED");
        assert_eq!(Rejection::IpBlocked.status(), StatusCode::FORBIDDEN);
        assert_eq!(Rejection::BurstLimit.code(), "BURST_LIMIT");
        assert_eq!(Rejection::BurstLimit.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(Rejection::SuspiciousRequest.code(), "SUSPICIOUS_REQUEST");
        assert_eq!(Rejection::SuspiciousRequest.status(), StatusCode::FORBIDDEN);
        assert_eq!(Rejection::FingerprintLimit.code(), "FINGERPRINT_LIMIT");
        assert_eq!(
            Rejection::FingerprintLimit.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn retry_after_only_for_rate_limits() {
        assert_eq!(Rejection::BurstLimit.retry_after(), Some(1));
        assert_eq!(Rejection::FingerprintLimit.retry_after(), Some(60));
        assert_eq!(Rejection::IpBlocked.retry_after(), None);
        assert_eq!(Rejection::SuspiciousRequest.retry_after(), None);
    }

    #[test]
    fn body_shape() {
        let body = Rejection::FingerprintLimit.body();
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "FINGERPRINT_LIMIT");
        assert_eq!(body["retryAfter"], 60);
        assert!(body["error"].as_str().is_some_and(|s| !s.is_empty()));

        let body = Rejection::IpBlocked.body();
        assert!(body.get("retryAfter").is_none());
    }

    #[test]
    fn response_carries_retry_after_header() {
        let response = Rejection::BurstLimit.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "1");

        let response = Rejection::SuspiciousRequest.into_response();
        assert!(response.headers().get(header::RETRY_AFTER).is_none());
    }
}
