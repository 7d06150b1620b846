//! Request-shape fingerprints and their fixed-window limiter.
//!
//! A fingerprint groups requests by what they look like rather than where
//! they come from, so the same request replayed from many addresses shares
//! one counter.

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::time::{Duration, Instant};
use tracing::warn;

use crate::config::FingerprintConfig;
use crate::security::RequestMeta;

/// Hex characters kept from the digest.
const FINGERPRINT_LEN: usize = 16;

/// Hash the shape of a request: User-Agent, Accept-Language,
/// Accept-Encoding, method, and the path without its query string.
pub fn fingerprint(req: &RequestMeta) -> String {
    let path = req.path.split('?').next().unwrap_or_default();
    let fields = [
        req.header("user-agent").unwrap_or_default(),
        req.header("accept-language").unwrap_or_default(),
        req.header("accept-encoding").unwrap_or_default(),
        req.method.as_str(),
        path,
    ];

    let mut hasher = Sha256::new();
    hasher.update(fields.join("|").as_bytes());
    let digest = hasher.finalize();

    let mut hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    hex.truncate(FINGERPRINT_LEN);
    hex
}

/// Counter for one fingerprint.
#[derive(Debug, Clone, Copy)]
pub struct FingerprintWindow {
    pub count: u32,
    pub window_start: Instant,
}

/// Fixed-window limiter keyed by fingerprint.
#[derive(Debug)]
pub struct FingerprintLimiter {
    windows: DashMap<String, FingerprintWindow>,
    window: Duration,
    limit: u32,
}

impl FingerprintLimiter {
    pub fn new(config: &FingerprintConfig) -> Self {
        Self {
            windows: DashMap::new(),
            window: config.window(),
            limit: config.limit,
        }
    }

    /// Count a request with this fingerprint. Returns `true` once the
    /// count exceeds the limit within the current window.
    pub fn check_and_increment(&self, fingerprint: &str, now: Instant) -> bool {
        let mut entry = self
            .windows
            .entry(fingerprint.to_string())
            .or_insert(FingerprintWindow {
                count: 0,
                window_start: now,
            });

        if now.saturating_duration_since(entry.window_start) > self.window {
            entry.count = 0;
            entry.window_start = now;
        }

        entry.count = entry.count.saturating_add(1);
        let exceeded = entry.count > self.limit;
        if exceeded && entry.count == self.limit + 1 {
            warn!(fingerprint = %fingerprint, limit = self.limit, "fingerprint limit exceeded");
        }
        exceeded
    }

    pub fn get(&self, fingerprint: &str) -> Option<FingerprintWindow> {
        self.windows.get(fingerprint).map(|w| *w)
    }

    /// Remove windows that started more than twice the window length ago.
    pub fn sweep(&self, now: Instant) -> usize {
        let before = self.windows.len();
        let stale_after = self.window.saturating_mul(2);
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.window_start) <= stale_after);
        before.saturating_sub(self.windows.len())
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(limit: u32) -> FingerprintLimiter {
        FingerprintLimiter::new(&FingerprintConfig {
            window_secs: 300,
            limit,
        })
    }

    fn browser_request(source: &str, path: &str) -> RequestMeta {
        RequestMeta::new(source, "GET", path)
            .with_header("user-agent", "Mozilla/5.0")
            .with_header("accept-language", "en-US")
            .with_header("accept-encoding", "gzip")
    }

    #[test]
    fn fingerprint_is_short_hex() {
        let fp = fingerprint(&browser_request("a", "/"));
        assert_eq!(fp.len(), FINGERPRINT_LEN);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn fingerprint_ignores_source_and_query() {
        let a = fingerprint(&browser_request("192.0.2.1", "/api/quotes?symbol=AAPL"));
        let b = fingerprint(&browser_request("192.0.2.2", "/api/quotes?symbol=MSFT"));
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_depends_on_shape() {
        let base = fingerprint(&browser_request("a", "/api/quotes"));
        assert_ne!(base, fingerprint(&browser_request("a", "/api/holdings")));
        assert_ne!(
            base,
            fingerprint(&RequestMeta::new("a", "POST", "/api/quotes")
                .with_header("user-agent", "Mozilla/5.0")
                .with_header("accept-language", "en-US")
                .with_header("accept-encoding", "gzip"))
        );
        assert_ne!(
            base,
            fingerprint(&browser_request("a", "/api/quotes").with_header("accept-language", "de-DE"))
        );
    }

    #[test]
    fn exceeds_after_limit() {
        let limiter = limiter(3);
        let now = Instant::now();
        assert!(!limiter.check_and_increment("fp", now));
        assert!(!limiter.check_and_increment("fp", now));
        assert!(!limiter.check_and_increment("fp", now));
        assert!(limiter.check_and_increment("fp", now));
        assert!(limiter.check_and_increment("fp", now));
        assert!(!limiter.check_and_increment("other", now));
    }

    #[test]
    fn window_resets_after_expiry() {
        let limiter = limiter(1);
        let start = Instant::now();
        assert!(!limiter.check_and_increment("fp", start));
        assert!(limiter.check_and_increment("fp", start + Duration::from_secs(299)));

        let later = start + Duration::from_secs(301);
        assert!(!limiter.check_and_increment("fp", later));
        let window = limiter.get("fp").unwrap();
        assert_eq!(window.count, 1);
        assert_eq!(window.window_start, later);
    }

    #[test]
    fn sweep_evicts_after_twice_window() {
        let limiter = limiter(10);
        let start = Instant::now();
        limiter.check_and_increment("fp", start);
        assert_eq!(limiter.sweep(start + Duration::from_secs(600)), 0);
        assert_eq!(limiter.sweep(start + Duration::from_secs(601)), 1);
        assert!(limiter.is_empty());
    }
}
