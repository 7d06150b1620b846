//! Abuse protection configuration: burst, suspicion, fingerprint, global
//! attack detection, bans, and janitor cadence.

use serde::Deserialize;
use std::time::Duration;

/// Abuse protection configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ShieldConfig {
    /// Source exemptions and identifier resolution.
    #[serde(default)]
    pub access: AccessConfig,
    /// Per-source burst window.
    #[serde(default)]
    pub burst: BurstConfig,
    /// Suspicion scoring and pattern lists.
    #[serde(default)]
    pub suspicion: SuspicionConfig,
    /// Per-request-shape rate limiting.
    #[serde(default)]
    pub fingerprint: FingerprintConfig,
    /// System-wide attack detection.
    #[serde(default)]
    pub global: GlobalConfig,
    /// Ban durations.
    #[serde(default)]
    pub bans: BanConfig,
    /// Stale entry sweeping.
    #[serde(default)]
    pub janitor: JanitorConfig,
}

/// Source exemptions and identifier resolution.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AccessConfig {
    /// Sources exempt from every check, in addition to loopback.
    /// Unlike loopback these can be removed at runtime.
    #[serde(default)]
    pub exempt_sources: Vec<String>,
    /// Use the left-most `X-Forwarded-For` hop as the source identifier.
    /// Only enable behind a reverse proxy that overwrites the header.
    #[serde(default)]
    pub trust_forwarded_for: bool,
}

/// Burst tracking configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BurstConfig {
    /// Sliding window length in milliseconds (default: 1000).
    #[serde(default = "default_burst_window_ms")]
    pub window_ms: u64,
    /// Requests allowed within the window (default: 50).
    #[serde(default = "default_burst_max_requests")]
    pub max_requests: usize,
    /// Seconds of inactivity before a window is swept (default: 60).
    #[serde(default = "default_burst_idle_secs")]
    pub idle_secs: u64,
}

impl BurstConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn idle(&self) -> Duration {
        Duration::from_secs(self.idle_secs)
    }
}

impl Default for BurstConfig {
    fn default() -> Self {
        Self {
            window_ms: default_burst_window_ms(),
            max_requests: default_burst_max_requests(),
            idle_secs: default_burst_idle_secs(),
        }
    }
}

fn default_burst_window_ms() -> u64 {
    1000
}

fn default_burst_max_requests() -> usize {
    50
}

fn default_burst_idle_secs() -> u64 {
    60
}

/// Suspicion detection and scoring configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SuspicionConfig {
    /// Base threshold; a source is banned once its score reaches
    /// `threshold * 5` (default: 5).
    #[serde(default = "default_suspicious_threshold")]
    pub threshold: u32,
    /// Idle seconds after which a score resets (default: 3600).
    #[serde(default = "default_decay_secs")]
    pub decay_secs: u64,
    /// Requests closer together than this are flagged (default: 10).
    #[serde(default = "default_too_fast_ms")]
    pub too_fast_ms: u64,
    /// More `X-Forwarded-For` hops than this are flagged (default: 3).
    #[serde(default = "default_max_forwarded_hops")]
    pub max_forwarded_hops: usize,
    /// Regex patterns matched against the request path and query.
    #[serde(default = "default_path_patterns")]
    pub path_patterns: Vec<String>,
    /// Regex patterns matched against the User-Agent (case-insensitive).
    #[serde(default = "default_bot_patterns")]
    pub bot_patterns: Vec<String>,
}

impl SuspicionConfig {
    pub fn decay(&self) -> Duration {
        Duration::from_secs(self.decay_secs)
    }

    pub fn too_fast(&self) -> Duration {
        Duration::from_millis(self.too_fast_ms)
    }

    /// Score at which a source is automatically banned.
    pub fn ban_score(&self) -> u32 {
        self.threshold.saturating_mul(5)
    }
}

impl Default for SuspicionConfig {
    fn default() -> Self {
        Self {
            threshold: default_suspicious_threshold(),
            decay_secs: default_decay_secs(),
            too_fast_ms: default_too_fast_ms(),
            max_forwarded_hops: default_max_forwarded_hops(),
            path_patterns: default_path_patterns(),
            bot_patterns: default_bot_patterns(),
        }
    }
}

fn default_suspicious_threshold() -> u32 {
    5
}

fn default_decay_secs() -> u64 {
    3600
}

fn default_too_fast_ms() -> u64 {
    10
}

fn default_max_forwarded_hops() -> usize {
    3
}

fn default_path_patterns() -> Vec<String> {
    [
        r"\.env",
        r"\.git",
        r"wp-admin",
        r"wp-login",
        r"phpmyadmin",
        r"/admin\.php",
        r"\.\./",
        r"<script",
        r"union(\s|%20|\+)+select",
        r"eval\(",
        r"exec\(",
        r"base64",
        r"/bin/(ba)?sh",
        r"cmd\.exe",
        r"etc/passwd",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_bot_patterns() -> Vec<String> {
    [
        "bot",
        "crawler",
        "spider",
        "scraper",
        "curl",
        "wget",
        "python-requests",
        "go-http-client",
        "scrapy",
        "httpclient",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Fingerprint limiting configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FingerprintConfig {
    /// Fixed window length in seconds (default: 300).
    #[serde(default = "default_fingerprint_window_secs")]
    pub window_secs: u64,
    /// Requests per fingerprint allowed within a window (default: 100).
    #[serde(default = "default_fingerprint_limit")]
    pub limit: u32,
}

impl FingerprintConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            window_secs: default_fingerprint_window_secs(),
            limit: default_fingerprint_limit(),
        }
    }
}

fn default_fingerprint_window_secs() -> u64 {
    300
}

fn default_fingerprint_limit() -> u32 {
    100
}

/// Global attack detection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GlobalConfig {
    /// Requests per window above which the system is under attack
    /// (default: 1000).
    #[serde(default = "default_attack_threshold")]
    pub attack_threshold: u64,
    /// Fraction of the threshold the count must fall below to leave
    /// attack mode (default: 0.5).
    #[serde(default = "default_exit_ratio")]
    pub exit_ratio: f64,
    /// Counting window in seconds (default: 60).
    #[serde(default = "default_global_window_secs")]
    pub window_secs: u64,
}

impl GlobalConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// Count below which attack mode is left.
    pub fn exit_threshold(&self) -> u64 {
        (self.attack_threshold as f64 * self.exit_ratio) as u64
    }
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            attack_threshold: default_attack_threshold(),
            exit_ratio: default_exit_ratio(),
            window_secs: default_global_window_secs(),
        }
    }
}

fn default_attack_threshold() -> u64 {
    1000
}

fn default_exit_ratio() -> f64 {
    0.5
}

fn default_global_window_secs() -> u64 {
    60
}

/// Longest ban the registry will record, in seconds (ten years).
pub const MAX_BAN_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Ban duration configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BanConfig {
    /// Default duration of operator bans in seconds (default: 86400).
    #[serde(default = "default_manual_ban_secs")]
    pub manual_secs: u64,
    /// Duration of automatic suspicion bans in seconds (default: 1800).
    /// Both durations must be between 1 and [`MAX_BAN_SECS`].
    #[serde(default = "default_auto_ban_secs")]
    pub auto_secs: u64,
}

impl BanConfig {
    pub fn manual(&self) -> Duration {
        Duration::from_secs(self.manual_secs)
    }

    pub fn auto(&self) -> Duration {
        Duration::from_secs(self.auto_secs)
    }
}

impl Default for BanConfig {
    fn default() -> Self {
        Self {
            manual_secs: default_manual_ban_secs(),
            auto_secs: default_auto_ban_secs(),
        }
    }
}

fn default_manual_ban_secs() -> u64 {
    24 * 60 * 60
}

fn default_auto_ban_secs() -> u64 {
    30 * 60
}

/// Janitor configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct JanitorConfig {
    /// Seconds between sweeps (default: 300).
    #[serde(default = "default_janitor_interval_secs")]
    pub interval_secs: u64,
}

impl JanitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for JanitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_janitor_interval_secs(),
        }
    }
}

fn default_janitor_interval_secs() -> u64 {
    300
}
