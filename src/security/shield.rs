//! The protection pipeline.
//!
//! `Shield` owns every store and evaluates requests in a fixed order,
//! stopping at the first rejection:
//!
//! 1. global counter (always)
//! 2. allow registry (exempt sources skip everything else)
//! 3. ban registry
//! 4. burst tracker
//! 5. suspicion detector, recorded into the suspicion tracker
//! 6. fingerprint limiter

use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::ShieldConfig;
use crate::error::{Rejection, ShieldError};
use crate::metrics;
use crate::security::RequestMeta;
use crate::security::burst::BurstTracker;
use crate::security::detector::{Signal, SuspicionDetector};
use crate::security::fingerprint::{FingerprintLimiter, fingerprint};
use crate::security::global::{AttackState, GlobalMonitor};
use crate::security::janitor::SweepReport;
use crate::security::registry::{AccessRegistry, BanEntry, BanOrigin};
use crate::security::suspicion::SuspicionTracker;

/// Outcome of evaluating one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Let the request through; `under_attack` asks for the marker header.
    Pass { under_attack: bool },
    /// Answer immediately with the rejection.
    Reject(Rejection),
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass { .. })
    }

    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            Verdict::Reject(rejection) => Some(*rejection),
            Verdict::Pass { .. } => None,
        }
    }
}

/// Operator-facing summary of the shield's state.
#[derive(Debug, Clone, Serialize)]
pub struct ShieldStatus {
    pub attack_state: AttackState,
    pub under_attack: bool,
    pub attack_duration_secs: Option<u64>,
    pub requests_this_window: u64,
    pub banned: usize,
    pub allowed: usize,
    pub suspicion_tracked: usize,
    pub burst_tracked: usize,
    pub fingerprint_tracked: usize,
}

/// Abuse protection service. Construct once and share as `Arc<Shield>`.
#[derive(Debug)]
pub struct Shield {
    config: ShieldConfig,
    registry: AccessRegistry,
    burst: BurstTracker,
    detector: SuspicionDetector,
    suspicion: SuspicionTracker,
    fingerprints: FingerprintLimiter,
    global: GlobalMonitor,
}

impl Shield {
    /// Build a shield from configuration.
    ///
    /// Fails only when a configured pattern is not a valid regex.
    pub fn new(config: ShieldConfig) -> Result<Self, ShieldError> {
        let detector = SuspicionDetector::new(&config.suspicion)?;
        Ok(Self {
            registry: AccessRegistry::with_exempt(config.access.exempt_sources.iter().cloned()),
            burst: BurstTracker::new(&config.burst),
            detector,
            suspicion: SuspicionTracker::new(&config.suspicion),
            fingerprints: FingerprintLimiter::new(&config.fingerprint),
            global: GlobalMonitor::new(&config.global, Instant::now()),
            config,
        })
    }

    pub fn config(&self) -> &ShieldConfig {
        &self.config
    }

    pub fn registry(&self) -> &AccessRegistry {
        &self.registry
    }

    /// Evaluate a request against the current time.
    pub fn evaluate(&self, req: &RequestMeta) -> Verdict {
        self.evaluate_at(req, Instant::now())
    }

    /// Evaluate a request at an explicit instant.
    pub fn evaluate_at(&self, req: &RequestMeta, now: Instant) -> Verdict {
        let source = req.source.as_str();
        metrics::record_request();

        let state = self.global.record_request(now);
        metrics::set_under_attack(state == AttackState::UnderAttack);

        if self.registry.is_allowed(source) {
            return Verdict::Pass {
                under_attack: state == AttackState::UnderAttack,
            };
        }

        let verdict = self.screen(req, now);
        match verdict {
            Verdict::Reject(rejection) => {
                debug!(
                    source = %source,
                    method = %req.method,
                    path = %req.path,
                    code = rejection.code(),
                    "request rejected"
                );
                metrics::record_rejection(rejection.code());
                verdict
            }
            Verdict::Pass { .. } => Verdict::Pass {
                under_attack: state == AttackState::UnderAttack,
            },
        }
    }

    /// Checks that apply to non-exempt sources.
    fn screen(&self, req: &RequestMeta, now: Instant) -> Verdict {
        let source = req.source.as_str();

        if self.registry.is_banned(source, now) {
            return Verdict::Reject(Rejection::IpBlocked);
        }

        if self.burst.is_bursting(source, now) {
            return Verdict::Reject(Rejection::BurstLimit);
        }

        let signals = self
            .detector
            .inspect(req, self.suspicion.last_seen(source), now);
        if !signals.is_empty() {
            self.record_signals(source, &signals, now);
            if signals.contains(&Signal::SuspiciousPath) {
                return Verdict::Reject(Rejection::SuspiciousRequest);
            }
        }

        if self.fingerprints.check_and_increment(&fingerprint(req), now) {
            return Verdict::Reject(Rejection::FingerprintLimit);
        }

        Verdict::Pass {
            under_attack: false,
        }
    }

    fn record_signals(&self, source: &str, signals: &[Signal], now: Instant) {
        for signal in signals {
            metrics::record_signal(signal.name());
        }
        if let Some(escalation) = self.suspicion.record(source, signals, now)
            && self.registry.ban(
                source,
                escalation.reason(),
                BanOrigin::Automatic,
                self.config.bans.auto(),
                now,
            )
        {
            metrics::record_auto_ban();
        }
    }

    /// Ban `source` on an operator's behalf. `duration` defaults to the
    /// configured manual ban duration. Returns `false` for exempt sources.
    pub fn manual_ban(&self, source: &str, reason: &str, duration: Option<Duration>) -> bool {
        let duration = duration.unwrap_or_else(|| self.config.bans.manual());
        self.registry
            .ban(source, reason, BanOrigin::Manual, duration, Instant::now())
    }

    pub fn unban(&self, source: &str) -> bool {
        self.registry.unban(source)
    }

    pub fn allow(&self, source: &str) {
        self.registry.allow(source);
    }

    pub fn disallow(&self, source: &str) -> Result<bool, ShieldError> {
        self.registry.disallow(source)
    }

    pub fn bans(&self, now: Instant) -> Vec<BanEntry> {
        self.registry.bans(now)
    }

    pub fn is_banned(&self, source: &str, now: Instant) -> bool {
        self.registry.is_banned(source, now)
    }

    pub fn status(&self, now: Instant) -> ShieldStatus {
        let global = self.global.status(now);
        ShieldStatus {
            attack_state: global.state,
            under_attack: global.under_attack(),
            attack_duration_secs: global.attack_duration.map(|d| d.as_secs()),
            requests_this_window: global.window_count,
            banned: self.registry.ban_count(now),
            allowed: self.registry.allow_count(),
            suspicion_tracked: self.suspicion.len(),
            burst_tracked: self.burst.len(),
            fingerprint_tracked: self.fingerprints.len(),
        }
    }

    /// Evict stale entries from every store.
    pub fn sweep(&self, now: Instant) -> SweepReport {
        self.global.roll(now);
        metrics::set_under_attack(self.global.state() == AttackState::UnderAttack);
        let report = SweepReport {
            bursts: self.burst.sweep(now),
            fingerprints: self.fingerprints.sweep(now),
            suspicions: self.suspicion.sweep(now),
            bans: self.registry.purge_expired(now),
        };
        metrics::set_tracked("burst", self.burst.len());
        metrics::set_tracked("fingerprint", self.fingerprints.len());
        metrics::set_tracked("suspicion", self.suspicion.len());
        metrics::set_tracked("ban", self.registry.ban_count(now));
        report
    }
}
