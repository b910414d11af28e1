use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;

use ticketbot_catalog::SeatLedger;
use ticketbot_core::clock::FixedClock;
use ticketbot_core::repository::EventRepository;
use ticketbot_core::ticket::{RenderError, RenderedTicket, TicketRenderer};
use ticketbot_shared::{EventId, NewEvent, QrPayload};
use ticketbot_store::MemoryStore;

use crate::{BalanceCheckout, BookingFinalizer, HoldCheckout, ReservationManager};

pub struct StaticRenderer;

#[async_trait]
impl TicketRenderer for StaticRenderer {
    async fn render(&self, payload: &QrPayload) -> Result<RenderedTicket, RenderError> {
        Ok(RenderedTicket {
            url: Some(format!("https://qr.test/{}", payload.booking_id)),
            image_png: None,
        })
    }
}

pub struct FailingRenderer;

#[async_trait]
impl TicketRenderer for FailingRenderer {
    async fn render(&self, _payload: &QrPayload) -> Result<RenderedTicket, RenderError> {
        Err(RenderError::Publish("image host down".into()))
    }
}

pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<FixedClock>,
    pub reservations: ReservationManager,
    pub finalizer: BookingFinalizer,
    pub hold_checkout: HoldCheckout,
    pub balance_checkout: BalanceCheckout,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_renderer(Arc::new(StaticRenderer)).await
    }

    pub async fn with_renderer(renderer: Arc<dyn TicketRenderer>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap()));
        let ledger = SeatLedger::new(store.clone());
        let reservations = ReservationManager::new(store.clone(), clock.clone(), 5);
        let finalizer = BookingFinalizer::new(store.clone(), store.clone(), renderer, clock.clone(), 5);
        let hold_checkout = HoldCheckout::new(reservations.clone(), finalizer.clone());
        let balance_checkout =
            BalanceCheckout::new(finalizer.clone(), store.clone(), ledger, clock.clone(), 10_000);
        Self {
            store,
            clock,
            reservations,
            finalizer,
            hold_checkout,
            balance_checkout,
        }
    }

    pub async fn event(&self, seats: i32, price: i64) -> EventId {
        self.store
            .create_event(&NewEvent {
                title: "Coldplay: Music of the Spheres".into(),
                description: None,
                city: "Ahmedabad".into(),
                venue: "Narendra Modi Stadium".into(),
                event_date: self.clock_now() + Duration::days(14),
                total_seats: seats,
                price,
            })
            .await
            .unwrap()
    }

    pub async fn available(&self, id: EventId) -> i32 {
        self.store.get_event(id).await.unwrap().unwrap().available_seats
    }

    fn clock_now(&self) -> chrono::DateTime<Utc> {
        use ticketbot_core::clock::Clock;
        self.clock.now()
    }
}
