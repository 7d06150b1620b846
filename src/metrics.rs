//! Prometheus metrics for pilot-shield.
//!
//! - `shield_requests_total` - Requests evaluated
//! - `shield_rejections_total{code}` - Rejections by machine code
//! - `shield_signals_total{signal}` - Suspicion signals observed
//! - `shield_auto_bans_total` - Automatic bans issued
//! - `shield_under_attack` - 1 while attack mode is active
//! - `shield_tracked_entries{store}` - Live entries per store, updated by the janitor
//!
//! Recording helpers are no-ops until [`init`] has run, so library users
//! that never expose metrics pay nothing beyond an atomic load.

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters (monotonic increasing)
// ========================================================================

/// Total requests evaluated by the shield.
pub static REQUESTS: OnceLock<IntCounter> = OnceLock::new();

/// Rejections by code (IP_BLOCKED, BURST_LIMIT, ...).
pub static REJECTIONS: OnceLock<IntCounterVec> = OnceLock::new();

/// Suspicion signals by kind.
pub static SIGNALS: OnceLock<IntCounterVec> = OnceLock::new();

/// Automatic bans issued by suspicion escalation.
pub static AUTO_BANS: OnceLock<IntCounter> = OnceLock::new();

// ========================================================================
// Gauges (can increase/decrease)
// ========================================================================

pub static UNDER_ATTACK: OnceLock<IntGauge> = OnceLock::new();

/// Live entries per store.
pub static TRACKED_ENTRIES: OnceLock<IntGaugeVec> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Call once at startup. Later calls leave the first registration in place.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            match $init {
                Ok(m) => {
                    if let Err(e) = r.register(Box::new(m.clone())) {
                        tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
                    }
                    let _ = $metric.set(m);
                }
                Err(e) => {
                    tracing::warn!(error = %e, concat!("Failed to create metric ", stringify!($metric)));
                }
            }
        };
    }

    register!(REQUESTS, IntCounter::new("shield_requests_total", "Requests evaluated"));
    register!(REJECTIONS, IntCounterVec::new(Opts::new("shield_rejections_total", "Requests rejected by code"), &["code"]));
    register!(SIGNALS, IntCounterVec::new(Opts::new("shield_signals_total", "Suspicion signals observed by kind"), &["signal"]));
    register!(AUTO_BANS, IntCounter::new("shield_auto_bans_total", "Automatic bans issued"));
    register!(UNDER_ATTACK, IntGauge::new("shield_under_attack", "1 while attack mode is active"));
    register!(TRACKED_ENTRIES, IntGaugeVec::new(Opts::new("shield_tracked_entries", "Live entries per protection store"), &["store"]));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Recording helpers
// ============================================================================

#[inline]
pub fn record_request() {
    if let Some(c) = REQUESTS.get() {
        c.inc();
    }
}

#[inline]
pub fn record_rejection(code: &str) {
    if let Some(c) = REJECTIONS.get() {
        c.with_label_values(&[code]).inc();
    }
}

#[inline]
pub fn record_signal(signal: &str) {
    if let Some(c) = SIGNALS.get() {
        c.with_label_values(&[signal]).inc();
    }
}

#[inline]
pub fn record_auto_ban() {
    if let Some(c) = AUTO_BANS.get() {
        c.inc();
    }
}

#[inline]
pub fn set_under_attack(active: bool) {
    if let Some(g) = UNDER_ATTACK.get() {
        g.set(i64::from(active));
    }
}

/// Update the live entry count for one store.
#[inline]
pub fn set_tracked(store: &str, count: usize) {
    if let Some(g) = TRACKED_ENTRIES.get() {
        g.with_label_values(&[store])
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }
}
