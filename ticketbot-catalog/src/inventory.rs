use std::sync::Arc;
use tracing::{info, warn};

use ticketbot_core::repository::EventRepository;
use ticketbot_core::StoreError;
use ticketbot_shared::{Event, EventId, SeatAdjustment};

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("Event not found: {0}")]
    NotFound(EventId),
    #[error("Insufficient seats: requested {requested}, available {available}")]
    InsufficientSeats { requested: i32, available: i32 },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Seat counters of the event catalogue.
#[derive(Clone)]
pub struct SeatLedger {
    events: Arc<dyn EventRepository>,
}

impl SeatLedger {
    pub fn new(events: Arc<dyn EventRepository>) -> Self {
        Self { events }
    }

    /// Live row, inactive events included.
    pub async fn event(&self, id: EventId) -> Result<Option<Event>, StoreError> {
        self.events.get_event(id).await
    }

    /// Re-reads the event and checks `quantity` against the seats free right now.
    pub async fn check_availability(&self, id: EventId, quantity: i32) -> Result<Event, InventoryError> {
        let event = self
            .events
            .get_event(id)
            .await?
            .filter(|e| e.is_active)
            .ok_or(InventoryError::NotFound(id))?;

        if event.available_seats < quantity {
            return Err(InventoryError::InsufficientSeats {
                requested: quantity,
                available: event.available_seats,
            });
        }
        Ok(event)
    }

    /// Takes seats out of circulation. `false` when not enough are free.
    pub async fn withhold(&self, id: EventId, quantity: i32) -> Result<bool, StoreError> {
        let ok = self
            .events
            .adjust_seats(id, quantity, SeatAdjustment::Decrease)
            .await?;
        if !ok {
            warn!(event_id = id, quantity, "Seat withhold rejected");
        }
        Ok(ok)
    }

    /// Returns seats to circulation.
    pub async fn restore(&self, id: EventId, quantity: i32) -> Result<bool, StoreError> {
        let ok = self
            .events
            .adjust_seats(id, quantity, SeatAdjustment::Increase)
            .await?;
        info!(event_id = id, quantity, restored = ok, "Seats restored");
        Ok(ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use ticketbot_shared::NewEvent;
    use ticketbot_store::MemoryStore;

    async fn ledger_with_event(seats: i32) -> (SeatLedger, EventId) {
        let store = Arc::new(MemoryStore::new());
        let id = store
            .create_event(&NewEvent {
                title: "Kabaddi Finals".into(),
                description: None,
                city: "Pune".into(),
                venue: "Balewadi".into(),
                event_date: Utc::now() + Duration::days(3),
                total_seats: seats,
                price: 40_000,
            })
            .await
            .unwrap();
        (SeatLedger::new(store), id)
    }

    #[tokio::test]
    async fn test_check_availability_uses_live_counter() {
        let (ledger, id) = ledger_with_event(4).await;
        assert!(ledger.check_availability(id, 4).await.is_ok());

        assert!(ledger.withhold(id, 3).await.unwrap());
        let err = ledger.check_availability(id, 2).await.unwrap_err();
        assert!(matches!(err, InventoryError::InsufficientSeats { requested: 2, available: 1 }));

        assert!(matches!(
            ledger.check_availability(999, 1).await.unwrap_err(),
            InventoryError::NotFound(999)
        ));
    }

    #[tokio::test]
    async fn test_restore_never_exceeds_total() {
        let (ledger, id) = ledger_with_event(4).await;
        assert!(ledger.withhold(id, 2).await.unwrap());
        assert!(ledger.restore(id, 2).await.unwrap());
        assert_eq!(ledger.event(id).await.unwrap().unwrap().available_seats, 4);

        ledger.restore(id, 3).await.unwrap();
        assert_eq!(ledger.event(id).await.unwrap().unwrap().available_seats, 4);
    }

    #[tokio::test]
    async fn test_concurrent_withholds_never_oversell() {
        let (ledger, id) = ledger_with_event(10).await;
        let mut handles = Vec::new();
        for _ in 0..25 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move { ledger.withhold(id, 1).await.unwrap() }));
        }
        let mut granted = 0;
        for h in handles {
            if h.await.unwrap() {
                granted += 1;
            }
        }
        assert_eq!(granted, 10);
        assert_eq!(ledger.event(id).await.unwrap().unwrap().available_seats, 0);
    }
}
