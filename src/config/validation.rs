//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::{Config, MAX_BAN_SECS};
use regex::Regex;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("shield.burst.window_ms must be greater than 0")]
    ZeroBurstWindow,
    #[error("shield.burst.max_requests must be greater than 0")]
    ZeroBurstLimit,
    #[error("shield.suspicion.threshold must be greater than 0")]
    ZeroSuspicionThreshold,
    #[error("shield.suspicion.decay_secs must be greater than 0")]
    ZeroDecayWindow,
    #[error("shield.fingerprint.window_secs must be greater than 0")]
    ZeroFingerprintWindow,
    #[error("shield.fingerprint.limit must be greater than 0")]
    ZeroFingerprintLimit,
    #[error("shield.global.window_secs must be greater than 0")]
    ZeroGlobalWindow,
    #[error("shield.global.attack_threshold must be greater than 0")]
    ZeroAttackThreshold,
    #[error("shield.global.exit_ratio must be in (0.0, 1.0], got {0}")]
    InvalidExitRatio(f64),
    #[error("shield.bans.{field} must be between 1 and {max}, got {value}")]
    BanDurationOutOfRange {
        field: &'static str,
        value: u64,
        max: u64,
    },
    #[error("shield.janitor.interval_secs must be greater than 0")]
    ZeroJanitorInterval,
    #[error("invalid pattern in shield.suspicion.{list}: {pattern}: {reason}")]
    InvalidPattern {
        list: &'static str,
        pattern: String,
        reason: String,
    },
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let shield = &config.shield;

    if shield.burst.window_ms == 0 {
        errors.push(ValidationError::ZeroBurstWindow);
    }
    if shield.burst.max_requests == 0 {
        errors.push(ValidationError::ZeroBurstLimit);
    }

    if shield.suspicion.threshold == 0 {
        errors.push(ValidationError::ZeroSuspicionThreshold);
    }
    if shield.suspicion.decay_secs == 0 {
        errors.push(ValidationError::ZeroDecayWindow);
    }
    check_patterns("path_patterns", &shield.suspicion.path_patterns, &mut errors);
    check_patterns("bot_patterns", &shield.suspicion.bot_patterns, &mut errors);

    if shield.fingerprint.window_secs == 0 {
        errors.push(ValidationError::ZeroFingerprintWindow);
    }
    if shield.fingerprint.limit == 0 {
        errors.push(ValidationError::ZeroFingerprintLimit);
    }

    if shield.global.window_secs == 0 {
        errors.push(ValidationError::ZeroGlobalWindow);
    }
    if shield.global.attack_threshold == 0 {
        errors.push(ValidationError::ZeroAttackThreshold);
    }
    let ratio = shield.global.exit_ratio;
    if !(ratio > 0.0 && ratio <= 1.0) {
        errors.push(ValidationError::InvalidExitRatio(ratio));
    }

    for (field, value) in [
        ("manual_secs", shield.bans.manual_secs),
        ("auto_secs", shield.bans.auto_secs),
    ] {
        if !(1..=MAX_BAN_SECS).contains(&value) {
            errors.push(ValidationError::BanDurationOutOfRange {
                field,
                value,
                max: MAX_BAN_SECS,
            });
        }
    }

    if shield.janitor.interval_secs == 0 {
        errors.push(ValidationError::ZeroJanitorInterval);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_patterns(list: &'static str, patterns: &[String], errors: &mut Vec<ValidationError>) {
    for pattern in patterns {
        if let Err(e) = Regex::new(pattern) {
            errors.push(ValidationError::InvalidPattern {
                list,
                pattern: pattern.clone(),
                reason: e.to_string(),
            });
        }
    }
}
