//! Per-source burst detection over a sliding time window.
//!
//! Each source keeps the timestamps of its requests inside the window.
//! Timestamps older than the window are pruned on every access, so the
//! count always reflects the trailing window ending at `now`.

use dashmap::DashMap;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::BurstConfig;

/// Recent request timestamps for one source.
#[derive(Debug)]
pub struct BurstWindow {
    timestamps: VecDeque<Instant>,
    /// Set while the source is over the limit; only the transition is logged.
    blocked: bool,
}

impl BurstWindow {
    fn new() -> Self {
        Self {
            timestamps: VecDeque::new(),
            blocked: false,
        }
    }

    /// Drop timestamps older than `window`.
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(&t) = self.timestamps.front() {
            if now.saturating_duration_since(t) > window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    fn last_seen(&self) -> Option<Instant> {
        self.timestamps.back().copied()
    }
}

/// Sliding-window burst tracker keyed by source identifier.
#[derive(Debug)]
pub struct BurstTracker {
    windows: DashMap<String, BurstWindow>,
    window: Duration,
    max_requests: usize,
    idle: Duration,
}

impl BurstTracker {
    pub fn new(config: &BurstConfig) -> Self {
        Self {
            windows: DashMap::new(),
            window: config.window(),
            max_requests: config.max_requests,
            idle: config.idle(),
        }
    }

    /// Record a request from `source` and report whether it is over the limit.
    pub fn is_bursting(&self, source: &str, now: Instant) -> bool {
        let mut entry = self
            .windows
            .entry(source.to_string())
            .or_insert_with(BurstWindow::new);

        entry.prune(now, self.window);
        entry.timestamps.push_back(now);

        let count = entry.timestamps.len();
        if count > self.max_requests {
            if !entry.blocked {
                warn!(
                    source = %source,
                    count,
                    window_ms = self.window.as_millis() as u64,
                    "burst limit exceeded"
                );
            }
            entry.blocked = true;
            true
        } else {
            if entry.blocked {
                debug!(source = %source, "burst cleared");
            }
            entry.blocked = false;
            false
        }
    }

    /// Whether `source` was over the limit on its latest request.
    pub fn is_blocked(&self, source: &str) -> bool {
        self.windows.get(source).is_some_and(|w| w.blocked)
    }

    /// Remove windows with no request for longer than the idle threshold.
    pub fn sweep(&self, now: Instant) -> usize {
        let before = self.windows.len();
        let idle = self.idle;
        self.windows.retain(|_, window| {
            window
                .last_seen()
                .is_some_and(|last| now.saturating_duration_since(last) <= idle)
        });
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

    fn tracker(max_requests: usize) -> BurstTracker {
        BurstTracker::new(&BurstConfig {
            window_ms: 1000,
            max_requests,
            idle_secs: 60,
        })
    }

    #[test]
    fn first_request_passes() {
        let tracker = tracker(1);
        assert!(!tracker.is_bursting("a", Instant::now()));
    }

    #[test]
    fn threshold_is_exact() {
        let tracker = tracker(50);
        let start = Instant::now();
        for i in 0..50 {
            let now = start + Duration::from_millis(i * 10);
            assert!(!tracker.is_bursting("a", now), "request {} should pass", i + 1);
        }
        assert!(tracker.is_bursting("a", start + Duration::from_millis(500)));
        assert!(tracker.is_blocked("a"));
    }

    #[test]
    fn passes_again_after_window() {
        let tracker = tracker(3);
        let start = Instant::now();
        for _ in 0..3 {
            assert!(!tracker.is_bursting("a", start));
        }
        assert!(tracker.is_bursting("a", start));

        let later = start + Duration::from_millis(1001);
        assert!(!tracker.is_bursting("a", later));
        assert!(!tracker.is_blocked("a"));
    }

    #[test]
    fn window_slides() {
        let tracker = tracker(2);
        let start = Instant::now();
        assert!(!tracker.is_bursting("a", start));
        assert!(!tracker.is_bursting("a", start + Duration::from_millis(600)));
        // first timestamp is now 1100ms old and gets pruned
        assert!(!tracker.is_bursting("a", start + Duration::from_millis(1100)));
        assert!(tracker.is_bursting("a", start + Duration::from_millis(1200)));
    }

    #[test]
    fn sources_are_independent() {
        let tracker = tracker(1);
        let now = Instant::now();
        assert!(!tracker.is_bursting("a", now));
        assert!(tracker.is_bursting("a", now));
        assert!(!tracker.is_bursting("b", now));
    }

    #[test]
    fn sweep_evicts_idle_windows() {
        let tracker = tracker(10);
        let start = Instant::now();
        tracker.is_bursting("old", start);
        tracker.is_bursting("fresh", start + Duration::from_secs(30));
        assert_eq!(tracker.len(), 2);

        assert_eq!(tracker.sweep(start + Duration::from_secs(61)), 1);
        assert_eq!(tracker.len(), 1);
        assert!(!tracker.is_blocked("old"));

        assert_eq!(tracker.sweep(start + Duration::from_secs(91)), 1);
        assert!(tracker.is_empty());
    }
}
