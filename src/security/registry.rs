//! Allow and deny registry for source identifiers.
//!
//! # Architecture
//!
//! - **Allow set**: `DashSet` of exempt sources. Loopback v4/v6 are seeded
//!   and can never be removed; extra exemptions come from config or operators.
//! - **Ban map**: `DashMap` of `BanRecord`s carrying an expiry instant.
//!   Expired bans are lazily ignored on lookup; the janitor purges them.
//!
//! A source present in the allow set is never banned: `ban` is a no-op for
//! it and `allow` lifts any existing ban.

use dashmap::{DashMap, DashSet};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::MAX_BAN_SECS;
use crate::error::ShieldError;

/// Exemptions that exist for the lifetime of the process.
pub const SEED_ALLOWED: [&str; 2] = ["127.0.0.1", "::1"];

/// Longer bans are shortened to this.
pub const MAX_BAN: Duration = Duration::from_secs(MAX_BAN_SECS);

/// Who issued a ban.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BanOrigin {
    /// Added by an operator.
    Manual,
    /// Issued by the suspicion tracker.
    Automatic,
}

/// A denied source.
#[derive(Debug, Clone)]
pub struct BanRecord {
    pub reason: String,
    pub origin: BanOrigin,
    pub banned_at: Instant,
    pub expires_at: Instant,
}

impl BanRecord {
    #[inline]
    pub fn is_active(&self, now: Instant) -> bool {
        now < self.expires_at
    }

    /// Time left before the ban lapses.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.expires_at.saturating_duration_since(now)
    }
}

/// Operator-facing view of an active ban.
#[derive(Debug, Clone, Serialize)]
pub struct BanEntry {
    pub source: String,
    pub reason: String,
    pub origin: BanOrigin,
    pub remaining_secs: u64,
}

/// Exempt and banned sources.
#[derive(Debug)]
pub struct AccessRegistry {
    allowed: DashSet<String>,
    banned: DashMap<String, BanRecord>,
}

impl AccessRegistry {
    /// Create a registry holding only the loopback seeds.
    pub fn new() -> Self {
        let allowed = DashSet::new();
        for seed in SEED_ALLOWED {
            allowed.insert(seed.to_string());
        }
        Self {
            allowed,
            banned: DashMap::new(),
        }
    }

    /// Create a registry seeded with loopback plus configured exemptions.
    pub fn with_exempt<I, S>(exempt: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let registry = Self::new();
        for source in exempt {
            registry.allowed.insert(source.into());
        }
        registry
    }

    #[inline]
    pub fn is_allowed(&self, source: &str) -> bool {
        self.allowed.contains(source)
    }

    /// Whether `source` has a ban that has not yet expired.
    #[inline]
    pub fn is_banned(&self, source: &str, now: Instant) -> bool {
        self.banned
            .get(source)
            .is_some_and(|record| record.is_active(now))
    }

    /// Ban `source` for `duration`.
    ///
    /// Returns `false` without doing anything when the source is exempt or
    /// the expiry cannot be represented on this platform's clock.
    /// An existing ban is replaced by the new one. Durations above
    /// [`MAX_BAN`] are clamped.
    pub fn ban(
        &self,
        source: &str,
        reason: impl Into<String>,
        origin: BanOrigin,
        duration: Duration,
        now: Instant,
    ) -> bool {
        if self.is_allowed(source) {
            debug!(source = %source, "ban skipped for exempt source");
            return false;
        }

        let duration = duration.min(MAX_BAN);
        let Some(expires_at) = now.checked_add(duration) else {
            warn!(
                source = %source,
                duration_secs = duration.as_secs(),
                "ban expiry not representable, ban skipped"
            );
            return false;
        };

        let reason = reason.into();
        warn!(
            source = %source,
            reason = %reason,
            origin = ?origin,
            duration_secs = duration.as_secs(),
            "source banned"
        );
        self.banned.insert(
            source.to_string(),
            BanRecord {
                reason,
                origin,
                banned_at: now,
                expires_at,
            },
        );
        true
    }

    /// Lift a ban. Returns whether a record was removed.
    pub fn unban(&self, source: &str) -> bool {
        let removed = self.banned.remove(source).is_some();
        if removed {
            info!(source = %source, "source unbanned");
        }
        removed
    }

    /// Exempt `source` from every check, lifting any ban it has.
    pub fn allow(&self, source: &str) {
        self.banned.remove(source);
        if self.allowed.insert(source.to_string()) {
            info!(source = %source, "source exempted");
        }
    }

    /// Remove an exemption. Returns whether one was removed.
    ///
    /// Seed entries are refused with [`ShieldError::SeedEntry`].
    pub fn disallow(&self, source: &str) -> Result<bool, ShieldError> {
        if SEED_ALLOWED.contains(&source) {
            return Err(ShieldError::SeedEntry(source.to_string()));
        }
        let removed = self.allowed.remove(source).is_some();
        if removed {
            info!(source = %source, "source exemption removed");
        }
        Ok(removed)
    }

    /// Look up the active ban for `source`.
    pub fn ban_record(&self, source: &str, now: Instant) -> Option<BanRecord> {
        self.banned
            .get(source)
            .filter(|record| record.is_active(now))
            .map(|record| record.clone())
    }

    /// Active bans, sorted by source.
    pub fn bans(&self, now: Instant) -> Vec<BanEntry> {
        let mut entries: Vec<BanEntry> = self
            .banned
            .iter()
            .filter(|entry| entry.value().is_active(now))
            .map(|entry| BanEntry {
                source: entry.key().clone(),
                reason: entry.reason.clone(),
                origin: entry.origin,
                remaining_secs: entry.remaining(now).as_secs(),
            })
            .collect();
        entries.sort_by(|a, b| a.source.cmp(&b.source));
        entries
    }

    /// Number of active bans.
    pub fn ban_count(&self, now: Instant) -> usize {
        self.banned
            .iter()
            .filter(|entry| entry.value().is_active(now))
            .count()
    }

    pub fn allow_count(&self) -> usize {
        self.allowed.len()
    }

    /// Drop expired ban records. Returns the number removed.
    pub fn purge_expired(&self, now: Instant) -> usize {
        let before = self.banned.len();
        self.banned.retain(|_, record| record.is_active(now));
        before.saturating_sub(self.banned.len())
    }
}

impl Default for AccessRegistry {
    fn default() -> Self {
        Self::new()
    }
}
