use chrono::Duration;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use ticketbot_core::clock::Clock;
use ticketbot_core::repository::ReservationRepository;
use ticketbot_core::{HoldError, StoreResult};
use ticketbot_shared::pii::mask;
use ticketbot_shared::{ActiveHold, EventId, HoldRequest, ReservationId};

/// Lifecycle of time-limited seat holds: `active -> confirmed | expired`.
#[derive(Clone)]
pub struct ReservationManager {
    repo: Arc<dyn ReservationRepository>,
    clock: Arc<dyn Clock>,
    default_ttl_minutes: i64,
    sweep_guard: Arc<Mutex<()>>,
}

impl ReservationManager {
    pub fn new(
        repo: Arc<dyn ReservationRepository>,
        clock: Arc<dyn Clock>,
        default_ttl_minutes: i64,
    ) -> Self {
        Self {
            repo,
            clock,
            default_ttl_minutes,
            sweep_guard: Arc::new(Mutex::new(())),
        }
    }

    pub fn default_ttl_minutes(&self) -> i64 {
        self.default_ttl_minutes
    }

    /// Holds `quantity` seats for `ttl_minutes`, replacing any hold the phone already has.
    pub async fn create_hold(
        &self,
        event_id: EventId,
        phone: &str,
        quantity: i32,
        ttl_minutes: i64,
    ) -> Result<ReservationId, HoldError> {
        if quantity <= 0 {
            return Err(HoldError::InvalidRequest(format!("quantity must be positive, got {quantity}")));
        }
        if ttl_minutes <= 0 {
            return Err(HoldError::InvalidRequest(format!("ttl must be positive, got {ttl_minutes}")));
        }

        let now = self.clock.now();
        let request = HoldRequest {
            event_id,
            phone: phone.to_string(),
            quantity,
            reserved_at: now,
            expires_at: now + Duration::minutes(ttl_minutes),
        };
        let id = self.repo.create_hold(&request).await?;
        info!(
            reservation_id = id,
            event_id,
            quantity,
            phone = %mask(phone),
            expires_at = %request.expires_at,
            "Seat hold created"
        );
        Ok(id)
    }

    /// The phone's hold, if it is active and not yet past its deadline.
    pub async fn active_hold(&self, phone: &str) -> StoreResult<Option<ActiveHold>> {
        self.repo.find_active_hold(phone, self.clock.now()).await
    }

    pub async fn confirm(&self, id: ReservationId) -> StoreResult<bool> {
        let confirmed = self.repo.confirm_reservation(id).await?;
        debug!(reservation_id = id, confirmed, "Confirm hold");
        Ok(confirmed)
    }

    /// Releases the hold and its seats. Returns false if it was not active.
    pub async fn cancel(&self, id: ReservationId) -> StoreResult<bool> {
        let released = self.repo.release_reservation(id).await?;
        if released {
            info!(reservation_id = id, "Seat hold cancelled");
        }
        Ok(released)
    }

    /// Undoes a confirmation whose booking could not be written: the
    /// reservation expires and its seats are restored.
    pub async fn revert_confirmation(&self, id: ReservationId) -> StoreResult<bool> {
        let reverted = self.repo.revert_confirmation(id).await?;
        if reverted {
            warn!(reservation_id = id, "Confirmed hold reverted, seats restored");
        }
        Ok(reverted)
    }

    /// Cancels whatever live hold the phone has.
    pub async fn release_for_phone(&self, phone: &str) -> StoreResult<bool> {
        match self.active_hold(phone).await? {
            Some(hold) => self.cancel(hold.reservation.id).await,
            None => Ok(false),
        }
    }

    /// Releases every active hold past its deadline. Overlapping calls return 0.
    pub async fn sweep_expired(&self) -> StoreResult<usize> {
        let Ok(_guard) = self.sweep_guard.try_lock() else {
            debug!("Reservation sweep already running, skipping");
            return Ok(0);
        };

        let now = self.clock.now();
        let due = self.repo.find_expired(now).await?;
        let mut released = 0;
        for id in due {
            match self.repo.expire_reservation(id, now).await {
                Ok(true) => released += 1,
                Ok(false) => debug!(reservation_id = id, "Hold settled before sweep reached it"),
                Err(e) => error!(reservation_id = id, error = %e, "Failed to expire hold"),
            }
        }

        if released > 0 {
            info!(released, "Expired seat holds released");
        }
        Ok(released)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Fixture;
    use ticketbot_shared::ReservationStatus;

    #[tokio::test]
    async fn test_hold_lifecycle_confirm() {
        let fx = Fixture::new().await;
        let event = fx.event(10, 20_000).await;

        let id = fx.reservations.create_hold(event, "919000000001", 3, 5).await.unwrap();
        assert_eq!(fx.available(event).await, 7);

        let hold = fx.reservations.active_hold("919000000001").await.unwrap().unwrap();
        assert_eq!(hold.reservation.id, id);
        assert_eq!(hold.total_price(), 60_000);

        assert!(fx.reservations.confirm(id).await.unwrap());
        assert!(!fx.reservations.confirm(id).await.unwrap());
        assert!(!fx.reservations.cancel(id).await.unwrap());
        assert_eq!(fx.available(event).await, 7);
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let fx = Fixture::new().await;
        let event = fx.event(10, 20_000).await;
        let id = fx.reservations.create_hold(event, "919000000001", 4, 5).await.unwrap();

        assert!(fx.reservations.cancel(id).await.unwrap());
        assert!(!fx.reservations.cancel(id).await.unwrap());
        assert!(!fx.reservations.cancel(9_999).await.unwrap());
        assert_eq!(fx.available(event).await, 10);
    }

    #[tokio::test]
    async fn test_sweep_releases_only_past_deadline() {
        let fx = Fixture::new().await;
        let event = fx.event(10, 20_000).await;
        let old = fx.reservations.create_hold(event, "919000000001", 2, 5).await.unwrap();
        fx.clock.advance(Duration::minutes(3));
        let young = fx.reservations.create_hold(event, "919000000002", 3, 5).await.unwrap();

        fx.clock.advance(Duration::minutes(2));
        assert_eq!(fx.reservations.sweep_expired().await.unwrap(), 1);
        assert_eq!(fx.available(event).await, 7);

        let old = fx.store.get_reservation(old).await.unwrap().unwrap();
        assert_eq!(old.status, ReservationStatus::Expired);
        let young = fx.store.get_reservation(young).await.unwrap().unwrap();
        assert_eq!(young.status, ReservationStatus::Active);

        assert_eq!(fx.reservations.sweep_expired().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_expired_hold_is_not_reported_active() {
        let fx = Fixture::new().await;
        let event = fx.event(10, 20_000).await;
        fx.reservations.create_hold(event, "919000000001", 1, 5).await.unwrap();

        fx.clock.advance(Duration::minutes(5));
        assert!(fx.reservations.active_hold("919000000001").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejects_non_positive_quantity() {
        let fx = Fixture::new().await;
        let event = fx.event(10, 20_000).await;
        let err = fx.reservations.create_hold(event, "919000000001", 0, 5).await.unwrap_err();
        assert!(matches!(err, HoldError::InvalidRequest(_)));
        assert_eq!(fx.available(event).await, 10);
    }

    #[tokio::test]
    async fn test_at_most_one_active_hold_per_phone() {
        let fx = Fixture::new().await;
        let a = fx.event(10, 20_000).await;
        let b = fx.event(10, 20_000).await;

        fx.reservations.create_hold(a, "919000000001", 2, 5).await.unwrap();
        fx.reservations.create_hold(b, "919000000001", 5, 5).await.unwrap();

        let active: Vec<_> = fx
            .store
            .reservations()
            .await
            .into_iter()
            .filter(|r| r.status == ReservationStatus::Active)
            .collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].event_id, b);
        assert_eq!(fx.available(a).await, 10);
        assert_eq!(fx.available(b).await, 5);
    }

    #[tokio::test]
    async fn test_concurrent_holds_on_last_seat() {
        let fx = Fixture::new().await;
        let event = fx.event(1, 20_000).await;

        let a = tokio::spawn({
            let reservations = fx.reservations.clone();
            async move { reservations.create_hold(event, "919000000001", 1, 5).await }
        });
        let b = tokio::spawn({
            let reservations = fx.reservations.clone();
            async move { reservations.create_hold(event, "919000000002", 1, 5).await }
        });
        let results = [a.await.unwrap(), b.await.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(HoldError::InsufficientSeats { requested: 1, available: 0 }))));
        assert_eq!(fx.available(event).await, 0);
    }
}
