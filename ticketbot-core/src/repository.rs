use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ticketbot_shared::{
    Account, ActiveHold, BookingDetails, BookingId, BookingRef, ConversationState, Event,
    EventId, HoldRequest, NewBooking, NewEvent, Reservation, ReservationId, SeatAdjustment,
    Session,
};

use crate::{HoldError, PurchaseError, StoreResult};

/// Event catalogue and the seat ledger that lives on it.
#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn create_event(&self, event: &NewEvent) -> StoreResult<EventId>;

    async fn get_event(&self, id: EventId) -> StoreResult<Option<Event>>;

    /// Active events with free seats whose title, city, venue or description
    /// contains `keywords` (case-insensitive), soonest first.
    async fn search_events(&self, keywords: &str, limit: usize) -> StoreResult<Vec<Event>>;

    /// Conditional counter update. A decrease succeeds only when enough seats
    /// are free; an increase never lifts the counter above `total_seats`.
    async fn adjust_seats(
        &self,
        id: EventId,
        quantity: i32,
        adjustment: SeatAdjustment,
    ) -> StoreResult<bool>;
}

#[async_trait]
pub trait ReservationRepository: Send + Sync {
    /// Atomically supersedes the phone's active hold (restoring its seats),
    /// withholds the requested seats and records the new hold.
    async fn create_hold(&self, request: &HoldRequest) -> Result<ReservationId, HoldError>;

    async fn get_reservation(&self, id: ReservationId) -> StoreResult<Option<Reservation>>;

    async fn find_active_hold(
        &self,
        phone: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<ActiveHold>>;

    /// `active -> confirmed`. Seats stay withheld.
    async fn confirm_reservation(&self, id: ReservationId) -> StoreResult<bool>;

    /// `active -> expired` with seats restored, regardless of deadline.
    async fn release_reservation(&self, id: ReservationId) -> StoreResult<bool>;

    /// `confirmed -> expired` with seats restored, for a confirmation that
    /// never produced a booking.
    async fn revert_confirmation(&self, id: ReservationId) -> StoreResult<bool>;

    /// Like `release_reservation`, but only if the hold is past its deadline at `now`.
    async fn expire_reservation(&self, id: ReservationId, now: DateTime<Utc>) -> StoreResult<bool>;

    async fn find_expired(&self, now: DateTime<Utc>) -> StoreResult<Vec<ReservationId>>;
}

#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Fails with `StoreError::DuplicateBookingRef` when the reference is taken.
    async fn insert_booking(&self, booking: &NewBooking) -> StoreResult<BookingId>;

    async fn find_booking(&self, booking_ref: &BookingRef) -> StoreResult<Option<BookingDetails>>;

    /// Confirmed bookings, newest first.
    async fn list_bookings_for_phone(&self, phone: &str) -> StoreResult<Vec<BookingDetails>>;

    /// `confirmed -> cancelled` with seats restored.
    async fn cancel_booking(&self, booking_ref: &BookingRef) -> StoreResult<bool>;
}

#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn find_account(&self, phone: &str) -> StoreResult<Option<Account>>;

    /// Returns the existing account, or opens one with `opening_balance`.
    async fn open_account(
        &self,
        phone: &str,
        opening_balance: i64,
        now: DateTime<Utc>,
    ) -> StoreResult<Account>;

    async fn credit(
        &self,
        phone: &str,
        amount: i64,
        description: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<i64>;

    /// Debits the account, withholds seats, inserts the booking and records
    /// the transaction in one unit. Returns the booking id and new balance.
    async fn purchase(
        &self,
        booking: &NewBooking,
        description: &str,
    ) -> Result<(BookingId, i64), PurchaseError>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Returns the stored session, or a fresh `Initial` one.
    async fn load_session(&self, phone: &str, now: DateTime<Utc>) -> StoreResult<Session>;

    async fn save_session(
        &self,
        phone: &str,
        state: &ConversationState,
        now: DateTime<Utc>,
    ) -> StoreResult<()>;

    async fn reset_session(&self, phone: &str, now: DateTime<Utc>) -> StoreResult<()>;

    /// Deletes sessions whose last activity is older than `idle_since`.
    async fn delete_idle_sessions(&self, idle_since: DateTime<Utc>) -> StoreResult<u64>;
}
