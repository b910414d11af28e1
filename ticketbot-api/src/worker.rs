use chrono::Duration as ChronoDuration;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use ticketbot_core::clock::Clock;
use ticketbot_core::repository::SessionRepository;
use ticketbot_order::ReservationManager;
use ticketbot_store::RedisClient;

use crate::metrics::Metrics;

const LEASE_NAME: &str = "reservation-sweep";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    pub holds_released: usize,
    pub sessions_deleted: u64,
    /// Another instance held the lease, nothing was done.
    pub skipped: bool,
}

/// Periodic cleanup: expired seat holds and idle sessions.
#[derive(Clone)]
pub struct Sweeper {
    pub reservations: ReservationManager,
    pub sessions: Arc<dyn SessionRepository>,
    pub clock: Arc<dyn Clock>,
    pub redis: Option<Arc<RedisClient>>,
    pub metrics: Arc<Metrics>,
    pub session_timeout_minutes: i64,
    /// Lease owner id, unique per process.
    pub owner: String,
}

impl Sweeper {
    pub async fn run(self, interval: Duration) {
        info!(interval_secs = interval.as_secs(), "Reservation sweeper started");
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let lease_ttl = interval.as_secs().max(1);
        loop {
            ticker.tick().await;
            let outcome = self.sweep_once(lease_ttl).await;
            debug!(?outcome, "Sweep finished");
        }
    }

    /// One pass. With Redis configured only the lease holder sweeps.
    pub async fn sweep_once(&self, lease_ttl_seconds: u64) -> SweepOutcome {
        if let Some(redis) = &self.redis {
            match redis.acquire_lease(LEASE_NAME, &self.owner, lease_ttl_seconds).await {
                Ok(true) => {}
                Ok(false) => {
                    return SweepOutcome {
                        skipped: true,
                        ..Default::default()
                    }
                }
                // Fall back to the in-process guard; holds are only expired once per row anyway.
                Err(e) => error!(error = %e, "Sweep lease unavailable, sweeping locally"),
            }
        }

        let mut outcome = SweepOutcome::default();
        match self.reservations.sweep_expired().await {
            Ok(released) => {
                outcome.holds_released = released;
                self.metrics.holds_released.inc_by(released as u64);
            }
            Err(e) => error!(error = %e, "Reservation sweep failed"),
        }

        let idle_since = self.clock.now() - ChronoDuration::minutes(self.session_timeout_minutes);
        match self.sessions.delete_idle_sessions(idle_since).await {
            Ok(deleted) => {
                if deleted > 0 {
                    info!(deleted, "Idle sessions deleted");
                }
                outcome.sessions_deleted = deleted;
                self.metrics.sessions_swept.inc_by(deleted);
            }
            Err(e) => error!(error = %e, "Session cleanup failed"),
        }

        if let Some(redis) = &self.redis {
            if let Err(e) = redis.release_lease(LEASE_NAME, &self.owner).await {
                error!(error = %e, "Failed to release sweep lease");
            }
        }
        outcome
    }
}
