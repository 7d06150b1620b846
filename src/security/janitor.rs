//! Periodic eviction of stale protection state.

use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::security::Shield;

/// Entries removed by one sweep, per store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub bursts: usize,
    pub fingerprints: usize,
    pub suspicions: usize,
    pub bans: usize,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.bursts + self.fingerprints + self.suspicions + self.bans
    }
}

/// Spawn the background sweep task.
///
/// The first sweep runs one full `interval` after spawning. Abort the
/// returned handle to stop it.
pub fn spawn_janitor(shield: Arc<Shield>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let report = shield.sweep(Instant::now());
            if report.total() > 0 {
                info!(
                    bursts = report.bursts,
                    fingerprints = report.fingerprints,
                    suspicions = report.suspicions,
                    bans = report.bans,
                    "Stale protection entries pruned"
                );
            } else {
                debug!("Janitor sweep found nothing to prune");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BurstConfig, ShieldConfig};
    use crate::security::RequestMeta;

    #[test]
    fn total_adds_every_store() {
        let report = SweepReport {
            bursts: 1,
            fingerprints: 2,
            suspicions: 3,
            bans: 4,
        };
        assert_eq!(report.total(), 10);
        assert_eq!(SweepReport::default().total(), 0);
    }

    #[tokio::test]
    async fn janitor_sweeps_in_background() {
        let config = ShieldConfig {
            burst: BurstConfig {
                idle_secs: 0,
                ..BurstConfig::default()
            },
            ..ShieldConfig::default()
        };
        let shield = Arc::new(Shield::new(config).unwrap());
        shield.evaluate(&RequestMeta::new("192.0.2.1", "GET", "/").with_header("user-agent", "Mozilla/5.0"));
        assert_eq!(shield.status(Instant::now()).burst_tracked, 1);

        let handle = spawn_janitor(Arc::clone(&shield), Duration::from_millis(20));
        let mut swept = false;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            if shield.status(Instant::now()).burst_tracked == 0 {
                swept = true;
                break;
            }
        }
        handle.abort();
        assert!(swept, "janitor never evicted the idle burst window");
    }
}
