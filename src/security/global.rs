//! System-wide attack detection with hysteresis.
//!
//! Counts every request in a fixed window (one minute by default).
//!
//! ```text
//!            count > threshold (any time)
//!   Normal ─────────────────────────────────▶ UnderAttack
//!          ◀─────────────────────────────────
//!            closed window count < threshold * exit_ratio
//! ```
//!
//! Entering is immediate; leaving is only decided on a closed window, and
//! only when the count falls below the lower exit threshold. Counts between
//! the two thresholds keep the current state, so traffic hovering near the
//! boundary cannot make the state flap.

use parking_lot::Mutex;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::config::GlobalConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackState {
    Normal,
    UnderAttack,
}

#[derive(Debug)]
struct GlobalState {
    state: AttackState,
    attack_started: Option<Instant>,
    window_count: u64,
    window_start: Instant,
}

/// Snapshot of the global posture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalStatus {
    pub state: AttackState,
    pub attack_duration: Option<Duration>,
    pub window_count: u64,
}

impl GlobalStatus {
    pub fn under_attack(&self) -> bool {
        self.state == AttackState::UnderAttack
    }
}

/// Process-wide request counter and attack state machine.
#[derive(Debug)]
pub struct GlobalMonitor {
    inner: Mutex<GlobalState>,
    window: Duration,
    enter_threshold: u64,
    exit_threshold: u64,
}

impl GlobalMonitor {
    pub fn new(config: &GlobalConfig, now: Instant) -> Self {
        Self {
            inner: Mutex::new(GlobalState {
                state: AttackState::Normal,
                attack_started: None,
                window_count: 0,
                window_start: now,
            }),
            window: config.window(),
            enter_threshold: config.attack_threshold,
            exit_threshold: config.exit_threshold(),
        }
    }

    /// Count one request and return the resulting state.
    pub fn record_request(&self, now: Instant) -> AttackState {
        let mut inner = self.inner.lock();
        self.roll_locked(&mut inner, now);

        inner.window_count = inner.window_count.saturating_add(1);
        if inner.state == AttackState::Normal && inner.window_count > self.enter_threshold {
            self.enter(&mut inner, now);
        }
        inner.state
    }

    /// Close any windows that have elapsed without recording a request.
    pub fn roll(&self, now: Instant) {
        let mut inner = self.inner.lock();
        self.roll_locked(&mut inner, now);
    }

    pub fn status(&self, now: Instant) -> GlobalStatus {
        let mut inner = self.inner.lock();
        self.roll_locked(&mut inner, now);
        GlobalStatus {
            state: inner.state,
            attack_duration: inner
                .attack_started
                .map(|started| now.saturating_duration_since(started)),
            window_count: inner.window_count,
        }
    }

    pub fn state(&self) -> AttackState {
        self.inner.lock().state
    }

    fn roll_locked(&self, inner: &mut GlobalState, now: Instant) {
        let elapsed = now.saturating_duration_since(inner.window_start);
        if elapsed < self.window {
            return;
        }

        let closed = inner.window_count;
        self.evaluate_closed(inner, closed, now);
        // A full window with no traffic at all also counts.
        if elapsed >= self.window.saturating_mul(2) {
            self.evaluate_closed(inner, 0, now);
        }

        inner.window_count = 0;
        inner.window_start = now;
    }

    fn evaluate_closed(&self, inner: &mut GlobalState, count: u64, now: Instant) {
        let state = inner.state;
        match state {
            AttackState::Normal if count > self.enter_threshold => self.enter(inner, now),
            AttackState::UnderAttack if count < self.exit_threshold => {
                let duration = inner
                    .attack_started
                    .map(|started| now.saturating_duration_since(started))
                    .unwrap_or_default();
                info!(
                    count,
                    exit_threshold = self.exit_threshold,
                    duration_secs = duration.as_secs(),
                    "attack mode cleared"
                );
                inner.state = AttackState::Normal;
                inner.attack_started = None;
            }
            _ => {}
        }
    }

    fn enter(&self, inner: &mut GlobalState, now: Instant) {
        warn!(
            count = inner.window_count,
            threshold = self.enter_threshold,
            "request volume above attack threshold, entering attack mode"
        );
        inner.state = AttackState::UnderAttack;
        inner.attack_started = Some(now);
    }
}
