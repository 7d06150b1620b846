//! Stateless per-request suspicion signals.
//!
//! Detection mechanisms:
//! 1. **Suspicious path**: path and query against a case-insensitive regex set (`.env`, `.git`,
//!    admin panels, traversal, shell and eval markers)
//! 2. **Missing User-Agent**
//! 3. **Bot User-Agent**: case-insensitive regex set (crawlers, CLI clients)
//! 4. **Forwarded chain**: too many `X-Forwarded-For` hops
//! 5. **Too fast**: the source's previous flagged request was only
//!    milliseconds ago
//!
//! Every check is total over malformed input: an absent or non-UTF-8 header
//! is treated as missing, never as an error.

use regex::{RegexSet, RegexSetBuilder};
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};

use crate::config::SuspicionConfig;
use crate::error::ShieldError;
use crate::security::RequestMeta;

/// A single abuse indicator observed on a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    SuspiciousPath,
    MissingUserAgent,
    BotUserAgent,
    ForwardedChain,
    TooFast,
}

impl Signal {
    pub fn name(&self) -> &'static str {
        match self {
            Signal::SuspiciousPath => "suspicious_path",
            Signal::MissingUserAgent => "missing_user_agent",
            Signal::BotUserAgent => "bot_user_agent",
            Signal::ForwardedChain => "forwarded_chain",
            Signal::TooFast => "too_fast",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Compiled pattern sets and thresholds for signal extraction.
#[derive(Debug)]
pub struct SuspicionDetector {
    path_patterns: RegexSet,
    bot_patterns: RegexSet,
    max_forwarded_hops: usize,
    too_fast: Duration,
}

impl SuspicionDetector {
    pub fn new(config: &SuspicionConfig) -> Result<Self, ShieldError> {
        let path_patterns = RegexSetBuilder::new(&config.path_patterns)
            .case_insensitive(true)
            .build()
            .map_err(|source| ShieldError::Pattern {
                list: "path",
                source,
            })?;
        let bot_patterns = RegexSetBuilder::new(&config.bot_patterns)
            .case_insensitive(true)
            .build()
            .map_err(|source| ShieldError::Pattern { list: "bot", source })?;

        Ok(Self {
            path_patterns,
            bot_patterns,
            max_forwarded_hops: config.max_forwarded_hops,
            too_fast: config.too_fast(),
        })
    }

    /// Extract every signal present on `req`.
    ///
    /// `last_seen` is the source's last flagged request according to the
    /// suspicion tracker, if any.
    pub fn inspect(
        &self,
        req: &RequestMeta,
        last_seen: Option<Instant>,
        now: Instant,
    ) -> Vec<Signal> {
        let mut signals = Vec::new();

        if self.path_patterns.is_match(&req.path) {
            signals.push(Signal::SuspiciousPath);
        }

        match req.header("user-agent").map(str::trim) {
            None | Some("") => signals.push(Signal::MissingUserAgent),
            Some(ua) if self.bot_patterns.is_match(ua) => signals.push(Signal::BotUserAgent),
            Some(_) => {}
        }

        if let Some(forwarded) = req.header("x-forwarded-for")
            && forwarded_hops(forwarded) > self.max_forwarded_hops
        {
            signals.push(Signal::ForwardedChain);
        }

        if let Some(last) = last_seen
            && now.saturating_duration_since(last) < self.too_fast
        {
            signals.push(Signal::TooFast);
        }

        signals
    }
}

/// Count non-empty comma-separated entries.
fn forwarded_hops(value: &str) -> usize {
    value.split(',').filter(|hop| !hop.trim().is_empty()).count()
}
