use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

use ticketbot_core::repository::{
    AccountRepository, BookingRepository, EventRepository, ReservationRepository,
    SessionRepository,
};
use ticketbot_core::{HoldError, PurchaseError, StoreError, StoreResult};
use ticketbot_shared::{
    Account, AccountTransaction, ActiveHold, Booking, BookingDetails, BookingId, BookingRef,
    BookingStatus, ConversationState, Event, EventId, HoldRequest, NewBooking, NewEvent,
    Reservation, ReservationId, ReservationStatus, SeatAdjustment, Session,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    events: BTreeMap<EventId, Event>,
    reservations: BTreeMap<ReservationId, Reservation>,
    bookings: BTreeMap<BookingId, Booking>,
    accounts: HashMap<String, Account>,
    transactions: Vec<AccountTransaction>,
    sessions: HashMap<String, Session>,
    last_event_id: EventId,
    last_reservation_id: ReservationId,
    last_booking_id: BookingId,
}

impl Tables {
    fn adjust_seats(&mut self, id: EventId, quantity: i32, adjustment: SeatAdjustment) -> bool {
        if quantity <= 0 {
            return false;
        }
        let Some(event) = self.events.get_mut(&id) else {
            return false;
        };
        match adjustment {
            SeatAdjustment::Decrease => {
                if event.available_seats < quantity {
                    return false;
                }
                event.available_seats -= quantity;
            }
            SeatAdjustment::Increase => {
                let target = event.available_seats + quantity;
                if target > event.total_seats {
                    warn!(
                        event_id = id,
                        quantity,
                        total = event.total_seats,
                        "Seat restore capped at capacity"
                    );
                }
                event.available_seats = target.min(event.total_seats);
            }
        }
        true
    }

    fn release(&mut self, id: ReservationId) -> bool {
        self.expire_from(id, ReservationStatus::Active)
    }

    /// Moves a reservation in status `from` to `Expired` and restores its seats.
    fn expire_from(&mut self, id: ReservationId, from: ReservationStatus) -> bool {
        let Some(reservation) = self.reservations.get_mut(&id) else {
            return false;
        };
        if reservation.status != from {
            return false;
        }
        reservation.status = ReservationStatus::Expired;
        let (event_id, quantity) = (reservation.event_id, reservation.quantity);
        self.adjust_seats(event_id, quantity, SeatAdjustment::Increase);
        true
    }

    fn details(&self, booking: &Booking) -> StoreResult<BookingDetails> {
        let event = self.events.get(&booking.event_id).ok_or_else(|| {
            StoreError::Corrupt(format!(
                "booking {} references missing event {}",
                booking.booking_ref, booking.event_id
            ))
        })?;
        Ok(BookingDetails {
            booking: booking.clone(),
            event: event.snapshot(),
        })
    }

    fn insert_booking(&mut self, new: &NewBooking) -> StoreResult<BookingId> {
        if self
            .bookings
            .values()
            .any(|b| b.booking_ref == new.booking_ref)
        {
            return Err(StoreError::DuplicateBookingRef(new.booking_ref.to_string()));
        }
        self.last_booking_id += 1;
        let id = self.last_booking_id;
        self.bookings.insert(
            id,
            Booking {
                id,
                booking_ref: new.booking_ref.clone(),
                event_id: new.event_id,
                phone: new.phone.clone(),
                user_name: new.user_name.clone(),
                quantity: new.quantity,
                total_price: new.total_price,
                status: BookingStatus::Confirmed,
                qr_code_data: new.qr_code_data.clone(),
                qr_code_url: new.qr_code_url.clone(),
                created_at: new.created_at,
            },
        );
        Ok(id)
    }

    fn record_transaction(
        &mut self,
        phone: &str,
        amount: i64,
        description: &str,
        booking_ref: Option<&BookingRef>,
        at: DateTime<Utc>,
    ) {
        self.transactions.push(AccountTransaction {
            phone: phone.to_string(),
            amount,
            description: description.to_string(),
            booking_ref: booking_ref.map(|r| r.to_string()),
            created_at: at,
        });
    }
}

/// Process-local store with the same semantics as the Postgres repositories.
///
/// Multi-step operations run against a draft copy of the tables that replaces
/// the live copy only on success, so a failed operation leaves no trace.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn reservations(&self) -> Vec<Reservation> {
        self.tables.lock().await.reservations.values().cloned().collect()
    }

    pub async fn bookings(&self) -> Vec<Booking> {
        self.tables.lock().await.bookings.values().cloned().collect()
    }

    pub async fn transactions(&self, phone: &str) -> Vec<AccountTransaction> {
        self.tables
            .lock()
            .await
            .transactions
            .iter()
            .filter(|t| t.phone == phone)
            .cloned()
            .collect()
    }

    pub async fn set_event_active(&self, id: EventId, active: bool) {
        if let Some(event) = self.tables.lock().await.events.get_mut(&id) {
            event.is_active = active;
        }
    }
}

#[async_trait]
impl EventRepository for MemoryStore {
    async fn create_event(&self, event: &NewEvent) -> StoreResult<EventId> {
        let mut tables = self.tables.lock().await;
        tables.last_event_id += 1;
        let id = tables.last_event_id;
        tables.events.insert(
            id,
            Event {
                id,
                title: event.title.clone(),
                description: event.description.clone(),
                city: event.city.clone(),
                venue: event.venue.clone(),
                event_date: event.event_date,
                total_seats: event.total_seats,
                available_seats: event.total_seats,
                price: event.price,
                is_active: true,
            },
        );
        Ok(id)
    }

    async fn get_event(&self, id: EventId) -> StoreResult<Option<Event>> {
        Ok(self.tables.lock().await.events.get(&id).cloned())
    }

    async fn search_events(&self, keywords: &str, limit: usize) -> StoreResult<Vec<Event>> {
        let needle = keywords.to_lowercase();
        let tables = self.tables.lock().await;
        let mut found: Vec<Event> = tables
            .events
            .values()
            .filter(|e| e.is_bookable())
            .filter(|e| {
                e.title.to_lowercase().contains(&needle)
                    || e.city.to_lowercase().contains(&needle)
                    || e.venue.to_lowercase().contains(&needle)
                    || e
                        .description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect();
        found.sort_by_key(|e| (e.event_date, e.id));
        found.truncate(limit);
        Ok(found)
    }

    async fn adjust_seats(
        &self,
        id: EventId,
        quantity: i32,
        adjustment: SeatAdjustment,
    ) -> StoreResult<bool> {
        Ok(self
            .tables
            .lock()
            .await
            .adjust_seats(id, quantity, adjustment))
    }
}

#[async_trait]
impl ReservationRepository for MemoryStore {
    async fn create_hold(&self, request: &HoldRequest) -> Result<ReservationId, HoldError> {
        let mut tables = self.tables.lock().await;
        let mut draft = tables.clone();

        match draft.events.get(&request.event_id) {
            Some(event) if event.is_active => {}
            _ => return Err(HoldError::EventNotFound(request.event_id)),
        }

        let superseded: Vec<ReservationId> = draft
            .reservations
            .values()
            .filter(|r| r.phone == request.phone && r.status == ReservationStatus::Active)
            .map(|r| r.id)
            .collect();
        for id in superseded {
            draft.release(id);
        }

        let available = draft
            .events
            .get(&request.event_id)
            .map(|e| e.available_seats)
            .unwrap_or_default();
        if available < request.quantity {
            return Err(HoldError::InsufficientSeats {
                requested: request.quantity,
                available,
            });
        }
        if !draft.adjust_seats(request.event_id, request.quantity, SeatAdjustment::Decrease) {
            return Err(HoldError::ReservationFailed);
        }

        draft.last_reservation_id += 1;
        let id = draft.last_reservation_id;
        draft.reservations.insert(
            id,
            Reservation {
                id,
                event_id: request.event_id,
                phone: request.phone.clone(),
                quantity: request.quantity,
                status: ReservationStatus::Active,
                reserved_at: request.reserved_at,
                expires_at: request.expires_at,
            },
        );

        *tables = draft;
        Ok(id)
    }

    async fn get_reservation(&self, id: ReservationId) -> StoreResult<Option<Reservation>> {
        Ok(self.tables.lock().await.reservations.get(&id).cloned())
    }

    async fn find_active_hold(
        &self,
        phone: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<ActiveHold>> {
        let tables = self.tables.lock().await;
        let Some(reservation) = tables
            .reservations
            .values()
            .filter(|r| r.phone == phone && r.is_live_at(now))
            .max_by_key(|r| (r.reserved_at, r.id))
        else {
            return Ok(None);
        };
        let event = tables.events.get(&reservation.event_id).ok_or_else(|| {
            StoreError::Corrupt(format!(
                "reservation {} references missing event {}",
                reservation.id, reservation.event_id
            ))
        })?;
        Ok(Some(ActiveHold {
            reservation: reservation.clone(),
            event: event.snapshot(),
        }))
    }

    async fn confirm_reservation(&self, id: ReservationId) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        match tables.reservations.get_mut(&id) {
            Some(r) if r.status == ReservationStatus::Active => {
                r.status = ReservationStatus::Confirmed;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_reservation(&self, id: ReservationId) -> StoreResult<bool> {
        Ok(self.tables.lock().await.release(id))
    }

    async fn revert_confirmation(&self, id: ReservationId) -> StoreResult<bool> {
        Ok(self
            .tables
            .lock()
            .await
            .expire_from(id, ReservationStatus::Confirmed))
    }

    async fn expire_reservation(&self, id: ReservationId, now: DateTime<Utc>) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        let due = tables
            .reservations
            .get(&id)
            .is_some_and(|r| r.status == ReservationStatus::Active && r.expires_at <= now);
        Ok(due && tables.release(id))
    }

    async fn find_expired(&self, now: DateTime<Utc>) -> StoreResult<Vec<ReservationId>> {
        Ok(self
            .tables
            .lock()
            .await
            .reservations
            .values()
            .filter(|r| r.status == ReservationStatus::Active && r.expires_at <= now)
            .map(|r| r.id)
            .collect())
    }
}

#[async_trait]
impl BookingRepository for MemoryStore {
    async fn insert_booking(&self, booking: &NewBooking) -> StoreResult<BookingId> {
        self.tables.lock().await.insert_booking(booking)
    }

    async fn find_booking(&self, booking_ref: &BookingRef) -> StoreResult<Option<BookingDetails>> {
        let tables = self.tables.lock().await;
        tables
            .bookings
            .values()
            .find(|b| &b.booking_ref == booking_ref)
            .map(|b| tables.details(b))
            .transpose()
    }

    async fn list_bookings_for_phone(&self, phone: &str) -> StoreResult<Vec<BookingDetails>> {
        let tables = self.tables.lock().await;
        let mut bookings: Vec<&Booking> = tables
            .bookings
            .values()
            .filter(|b| b.phone == phone && b.status == BookingStatus::Confirmed)
            .collect();
        bookings.sort_by_key(|b| std::cmp::Reverse((b.created_at, b.id)));
        bookings.into_iter().map(|b| tables.details(b)).collect()
    }

    async fn cancel_booking(&self, booking_ref: &BookingRef) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        let Some(booking) = tables
            .bookings
            .values_mut()
            .find(|b| &b.booking_ref == booking_ref)
        else {
            return Ok(false);
        };
        if booking.status == BookingStatus::Cancelled {
            return Ok(false);
        }
        booking.status = BookingStatus::Cancelled;
        let (event_id, quantity) = (booking.event_id, booking.quantity);
        tables.adjust_seats(event_id, quantity, SeatAdjustment::Increase);
        Ok(true)
    }
}

#[async_trait]
impl AccountRepository for MemoryStore {
    async fn find_account(&self, phone: &str) -> StoreResult<Option<Account>> {
        Ok(self.tables.lock().await.accounts.get(phone).cloned())
    }

    async fn open_account(
        &self,
        phone: &str,
        opening_balance: i64,
        now: DateTime<Utc>,
    ) -> StoreResult<Account> {
        let mut tables = self.tables.lock().await;
        if let Some(account) = tables.accounts.get(phone) {
            return Ok(account.clone());
        }
        let account = Account {
            phone: phone.to_string(),
            holder_name: None,
            balance: opening_balance,
            updated_at: now,
        };
        tables.accounts.insert(phone.to_string(), account.clone());
        if opening_balance != 0 {
            tables.record_transaction(phone, opening_balance, "Opening balance", None, now);
        }
        Ok(account)
    }

    async fn credit(
        &self,
        phone: &str,
        amount: i64,
        description: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<i64> {
        let mut tables = self.tables.lock().await;
        let account = tables
            .accounts
            .entry(phone.to_string())
            .or_insert_with(|| Account {
                phone: phone.to_string(),
                holder_name: None,
                balance: 0,
                updated_at: now,
            });
        account.balance += amount;
        account.updated_at = now;
        let balance = account.balance;
        tables.record_transaction(phone, amount, description, None, now);
        Ok(balance)
    }

    async fn purchase(
        &self,
        booking: &NewBooking,
        description: &str,
    ) -> Result<(BookingId, i64), PurchaseError> {
        let mut tables = self.tables.lock().await;
        let mut draft = tables.clone();

        let available = match draft.events.get(&booking.event_id) {
            Some(event) if event.is_active => event.available_seats,
            _ => return Err(PurchaseError::EventNotFound(booking.event_id)),
        };

        let balance = draft
            .accounts
            .get(&booking.phone)
            .map(|a| a.balance)
            .unwrap_or_default();
        if balance < booking.total_price {
            return Err(PurchaseError::InsufficientBalance {
                required: booking.total_price,
                balance,
            });
        }

        if !draft.adjust_seats(booking.event_id, booking.quantity, SeatAdjustment::Decrease) {
            return Err(PurchaseError::InsufficientSeats {
                requested: booking.quantity,
                available,
            });
        }

        let id = draft.insert_booking(booking).map_err(|e| match e {
            StoreError::DuplicateBookingRef(r) => PurchaseError::DuplicateBookingRef(r),
            other => PurchaseError::Store(other),
        })?;

        let new_balance = balance - booking.total_price;
        if let Some(account) = draft.accounts.get_mut(&booking.phone) {
            account.balance = new_balance;
            account.holder_name = Some(booking.user_name.clone());
            account.updated_at = booking.created_at;
        }
        draft.record_transaction(
            &booking.phone,
            -booking.total_price,
            description,
            Some(&booking.booking_ref),
            booking.created_at,
        );

        *tables = draft;
        Ok((id, new_balance))
    }
}

#[async_trait]
impl SessionRepository for MemoryStore {
    async fn load_session(&self, phone: &str, now: DateTime<Utc>) -> StoreResult<Session> {
        let mut tables = self.tables.lock().await;
        Ok(tables
            .sessions
            .entry(phone.to_string())
            .or_insert_with(|| Session::new(phone, now))
            .clone())
    }

    async fn save_session(
        &self,
        phone: &str,
        state: &ConversationState,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        tables.sessions.insert(
            phone.to_string(),
            Session {
                phone: phone.to_string(),
                state: state.clone(),
                last_activity: now,
            },
        );
        Ok(())
    }

    async fn reset_session(&self, phone: &str, now: DateTime<Utc>) -> StoreResult<()> {
        self.save_session(phone, &ConversationState::Initial, now)
            .await
    }

    async fn delete_idle_sessions(&self, idle_since: DateTime<Utc>) -> StoreResult<u64> {
        let mut tables = self.tables.lock().await;
        let before = tables.sessions.len();
        tables.sessions.retain(|_, s| s.last_activity >= idle_since);
        Ok((before - tables.sessions.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn concert(seats: i32) -> NewEvent {
        NewEvent {
            title: "Arijit Singh Live".into(),
            description: Some("Bollywood night".into()),
            city: "Mumbai".into(),
            venue: "DY Patil Stadium".into(),
            event_date: Utc::now() + Duration::days(10),
            total_seats: seats,
            price: 150_000,
        }
    }

    fn hold(event_id: EventId, phone: &str, quantity: i32, now: DateTime<Utc>) -> HoldRequest {
        HoldRequest {
            event_id,
            phone: phone.into(),
            quantity,
            reserved_at: now,
            expires_at: now + Duration::minutes(5),
        }
    }

    #[tokio::test]
    async fn test_decrease_never_goes_negative_and_increase_is_capped() {
        let store = MemoryStore::new();
        let id = store.create_event(&concert(3)).await.unwrap();

        assert!(!store.adjust_seats(id, 4, SeatAdjustment::Decrease).await.unwrap());
        assert!(store.adjust_seats(id, 3, SeatAdjustment::Decrease).await.unwrap());
        assert!(!store.adjust_seats(id, 1, SeatAdjustment::Decrease).await.unwrap());
        assert!(store.adjust_seats(id, 10, SeatAdjustment::Increase).await.unwrap());
        assert_eq!(store.get_event(id).await.unwrap().unwrap().available_seats, 3);
        assert!(!store.adjust_seats(id, 0, SeatAdjustment::Decrease).await.unwrap());
    }

    #[tokio::test]
    async fn test_new_hold_supersedes_and_restores_previous() {
        let store = MemoryStore::new();
        let id = store.create_event(&concert(10)).await.unwrap();
        let now = Utc::now();

        let first = store.create_hold(&hold(id, "911", 4, now)).await.unwrap();
        let second = store.create_hold(&hold(id, "911", 2, now)).await.unwrap();

        let first = store.get_reservation(first).await.unwrap().unwrap();
        assert_eq!(first.status, ReservationStatus::Expired);
        assert_eq!(store.get_event(id).await.unwrap().unwrap().available_seats, 8);

        let active = store.find_active_hold("911", now).await.unwrap().unwrap();
        assert_eq!(active.reservation.id, second);
    }

    #[tokio::test]
    async fn test_failed_hold_leaves_previous_hold_untouched() {
        let store = MemoryStore::new();
        let id = store.create_event(&concert(5)).await.unwrap();
        let now = Utc::now();

        let first = store.create_hold(&hold(id, "911", 2, now)).await.unwrap();
        let err = store.create_hold(&hold(id, "911", 6, now)).await.unwrap_err();
        assert!(matches!(err, HoldError::InsufficientSeats { requested: 6, available: 5 }));

        let first = store.get_reservation(first).await.unwrap().unwrap();
        assert_eq!(first.status, ReservationStatus::Active);
        assert_eq!(store.get_event(id).await.unwrap().unwrap().available_seats, 3);
    }

    #[tokio::test]
    async fn test_purchase_is_all_or_nothing() {
        let store = MemoryStore::new();
        let id = store.create_event(&concert(5)).await.unwrap();
        let now = Utc::now();
        store.open_account("911", 100_000, now).await.unwrap();

        let booking = NewBooking {
            booking_ref: BookingRef::parse("BKG-ABC123").unwrap(),
            event_id: id,
            phone: "911".into(),
            user_name: "Ravi".into(),
            quantity: 1,
            total_price: 150_000,
            qr_code_data: None,
            qr_code_url: None,
            created_at: now,
        };
        let err = store.purchase(&booking, "Ticket").await.unwrap_err();
        assert!(matches!(err, PurchaseError::InsufficientBalance { .. }));
        assert_eq!(store.get_event(id).await.unwrap().unwrap().available_seats, 5);
        assert!(store.bookings().await.is_empty());

        store.credit("911", 100_000, "Top up", now).await.unwrap();
        let (_, balance) = store.purchase(&booking, "Ticket").await.unwrap();
        assert_eq!(balance, 50_000);
        assert_eq!(store.get_event(id).await.unwrap().unwrap().available_seats, 4);
        assert_eq!(store.transactions("911").await.len(), 3);
    }

    #[tokio::test]
    async fn test_idle_sessions_are_deleted() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store
            .save_session("911", &ConversationState::AwaitingKeywords, now - Duration::minutes(31))
            .await
            .unwrap();
        store
            .save_session("912", &ConversationState::AwaitingKeywords, now)
            .await
            .unwrap();

        let removed = store
            .delete_idle_sessions(now - Duration::minutes(30))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        let fresh = store.load_session("911", now).await.unwrap();
        assert!(fresh.state.is_initial());
    }
}
