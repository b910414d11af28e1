use std::sync::Arc;

use sqlx::PgPool;
use ticketbot_catalog::{EventSearch, SeatLedger};
use ticketbot_chat::{ChatRules, ConversationServices, Replies, Router};
use ticketbot_core::clock::Clock;
use ticketbot_core::messaging::MessageTransport;
use ticketbot_core::repository::{
    AccountRepository, BookingRepository, EventRepository, ReservationRepository, SessionRepository,
};
use ticketbot_order::{BalanceCheckout, BookingFinalizer, HoldCheckout, HostedQrRenderer, ReservationManager};
use ticketbot_store::app_config::BusinessRules;
use ticketbot_store::{
    MemoryStore, PgAccountRepository, PgBookingRepository, PgEventRepository, PgReservationRepository,
    PgSessionRepository, RedisClient,
};

use crate::metrics::Metrics;

/// One handle per repository trait, backed by Postgres or by memory.
#[derive(Clone)]
pub struct Stores {
    pub events: Arc<dyn EventRepository>,
    pub reservations: Arc<dyn ReservationRepository>,
    pub bookings: Arc<dyn BookingRepository>,
    pub accounts: Arc<dyn AccountRepository>,
    pub sessions: Arc<dyn SessionRepository>,
}

impl Stores {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            events: Arc::new(PgEventRepository::new(pool.clone())),
            reservations: Arc::new(PgReservationRepository::new(pool.clone())),
            bookings: Arc::new(PgBookingRepository::new(pool.clone())),
            accounts: Arc::new(PgAccountRepository::new(pool.clone())),
            sessions: Arc::new(PgSessionRepository::new(pool)),
        }
    }

    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self {
            events: store.clone(),
            reservations: store.clone(),
            bookings: store.clone(),
            accounts: store.clone(),
            sessions: store,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub router: Arc<Router>,
    pub transport: Arc<dyn MessageTransport>,
    pub redis: Option<Arc<RedisClient>>,
    pub metrics: Arc<Metrics>,
    pub reservations: ReservationManager,
    pub finalizer: BookingFinalizer,
    pub sessions: Arc<dyn SessionRepository>,
    pub qr: Arc<HostedQrRenderer>,
    pub clock: Arc<dyn Clock>,
    pub verify_token: Option<String>,
    pub business_rules: BusinessRules,
}

impl AppState {
    /// Wires the conversation services on top of `stores`.
    pub fn build(
        stores: Stores,
        rules: BusinessRules,
        qr: HostedQrRenderer,
        transport: Arc<dyn MessageTransport>,
        redis: Option<Arc<RedisClient>>,
        clock: Arc<dyn Clock>,
        verify_token: Option<String>,
    ) -> Result<Self, prometheus::Error> {
        let qr = Arc::new(qr);
        let ledger = SeatLedger::new(stores.events.clone());
        let reservations =
            ReservationManager::new(stores.reservations.clone(), clock.clone(), rules.reservation_ttl_minutes);
        let finalizer = BookingFinalizer::new(
            stores.bookings.clone(),
            stores.accounts.clone(),
            qr.clone(),
            clock.clone(),
            rules.booking_id_attempts,
        );

        let services = ConversationServices {
            sessions: stores.sessions.clone(),
            search: EventSearch::new(stores.events.clone(), rules.max_search_results),
            ledger: ledger.clone(),
            reservations: reservations.clone(),
            finalizer: finalizer.clone(),
            hold_checkout: HoldCheckout::new(reservations.clone(), finalizer.clone()),
            balance_checkout: BalanceCheckout::new(
                finalizer.clone(),
                stores.accounts.clone(),
                ledger,
                clock.clone(),
                rules.opening_balance,
            ),
            clock: clock.clone(),
        };
        let chat_rules = ChatRules {
            max_tickets: rules.max_tickets,
            session_timeout_minutes: rules.session_timeout_minutes,
            checkout: rules.checkout,
        };
        let replies = Replies::new(rules.display_utc_offset_minutes, rules.max_tickets);

        Ok(Self {
            router: Arc::new(Router::new(services, chat_rules, replies)),
            transport,
            redis,
            metrics: Arc::new(Metrics::new()?),
            reservations,
            finalizer,
            sessions: stores.sessions,
            qr,
            clock,
            verify_token,
            business_rules: rules,
        })
    }
}
