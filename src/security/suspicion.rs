//! Per-source suspicion scores with idle decay.
//!
//! Each flagged request adds one point per signal. A source that stays
//! quiet for longer than the decay window starts over from zero. Reaching
//! the ban score yields an [`Escalation`] which the shield turns into an
//! automatic ban.

use dashmap::DashMap;
use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::SuspicionConfig;
use crate::security::detector::Signal;

/// Accumulated score for one source.
#[derive(Debug, Clone)]
pub struct SuspicionRecord {
    pub count: u32,
    pub signals: BTreeSet<Signal>,
    pub first_seen: Instant,
    pub last_seen: Instant,
}

/// Score crossed the ban threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Escalation {
    pub count: u32,
    pub signals: BTreeSet<Signal>,
}

impl Escalation {
    /// Ban reason listing the distinct signal kinds observed.
    pub fn reason(&self) -> String {
        let kinds: Vec<&str> = self.signals.iter().map(Signal::name).collect();
        format!("Suspicious activity: {}", kinds.join(", "))
    }
}

/// Decaying suspicion scores keyed by source identifier.
#[derive(Debug)]
pub struct SuspicionTracker {
    records: DashMap<String, SuspicionRecord>,
    decay: Duration,
    ban_score: u32,
}

impl SuspicionTracker {
    pub fn new(config: &SuspicionConfig) -> Self {
        Self {
            records: DashMap::new(),
            decay: config.decay(),
            ban_score: config.ban_score(),
        }
    }

    /// Last time `source` was flagged.
    pub fn last_seen(&self, source: &str) -> Option<Instant> {
        self.records.get(source).map(|r| r.last_seen)
    }

    /// Add `signals` to the score of `source`.
    ///
    /// Returns an escalation when the score is at or above the ban score.
    pub fn record(&self, source: &str, signals: &[Signal], now: Instant) -> Option<Escalation> {
        if signals.is_empty() {
            return None;
        }

        let mut record = self
            .records
            .entry(source.to_string())
            .or_insert_with(|| SuspicionRecord {
                count: 0,
                signals: BTreeSet::new(),
                first_seen: now,
                last_seen: now,
            });

        if now.saturating_duration_since(record.last_seen) > self.decay {
            debug!(source = %source, previous = record.count, "suspicion score decayed");
            record.count = 0;
            record.signals.clear();
        }

        record.count = record.count.saturating_add(signals.len() as u32);
        record.signals.extend(signals.iter().copied());
        record.last_seen = now;

        debug!(
            source = %source,
            count = record.count,
            signals = ?signals,
            "suspicion recorded"
        );

        (record.count >= self.ban_score).then(|| Escalation {
            count: record.count,
            signals: record.signals.clone(),
        })
    }

    pub fn get(&self, source: &str) -> Option<SuspicionRecord> {
        self.records.get(source).map(|r| r.clone())
    }

    /// Remove records idle for longer than twice the decay window.
    pub fn sweep(&self, now: Instant) -> usize {
        let before = self.records.len();
        let stale_after = self.decay.saturating_mul(2);
        self.records
            .retain(|_, record| now.saturating_duration_since(record.last_seen) <= stale_after);
        before.saturating_sub(self.records.len())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
