use chrono::Duration;
use std::sync::Arc;
use tracing::{error, info, warn};

use ticketbot_catalog::{EventSearch, InventoryError, SeatLedger};
use ticketbot_core::clock::Clock;
use ticketbot_core::messaging::Outbound;
use ticketbot_core::repository::SessionRepository;
use ticketbot_core::{CheckoutMode, HoldError, StoreError};
use ticketbot_order::{
    BalanceCheckout, BookingFinalizer, CheckoutError, HoldCheckout, Receipt, ReservationManager,
    Settlement,
};
use ticketbot_shared::pii::mask;
use ticketbot_shared::{
    Browsing, ConversationState, HoldPending, ItemSelected, PaymentPending, QuantityChosen,
};

use crate::parser::{
    extract_booking_ref, extract_search_keywords, parse_confirmation, parse_message,
    parse_quantity, parse_selection, parse_user_name, Intent, ParsedMessage,
};
use crate::replies::Replies;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Checkout(#[from] CheckoutError),
}

#[derive(Debug, Clone)]
pub struct ChatRules {
    pub max_tickets: i32,
    pub session_timeout_minutes: i64,
    pub checkout: CheckoutMode,
}

/// Everything the conversation needs to act on a message.
#[derive(Clone)]
pub struct ConversationServices {
    pub sessions: Arc<dyn SessionRepository>,
    pub search: EventSearch,
    pub ledger: SeatLedger,
    pub reservations: ReservationManager,
    pub finalizer: BookingFinalizer,
    pub hold_checkout: HoldCheckout,
    pub balance_checkout: BalanceCheckout,
    pub clock: Arc<dyn Clock>,
}

type Step = (ConversationState, Vec<Outbound>);

/// Per-phone conversation state machine.
pub struct Router {
    services: ConversationServices,
    rules: ChatRules,
    replies: Replies,
}

fn say(text: String) -> Vec<Outbound> {
    vec![Outbound::text(text)]
}

impl Router {
    pub fn new(services: ConversationServices, rules: ChatRules, replies: Replies) -> Self {
        Self {
            services,
            rules,
            replies,
        }
    }

    /// Handles one inbound message and returns the replies to send, in order.
    ///
    /// Never fails: on an internal error the session is reset and the user
    /// gets a generic apology.
    pub async fn route(&self, phone: &str, raw: &str) -> Vec<Outbound> {
        match self.dispatch(phone, raw).await {
            Ok(replies) => replies,
            Err(e) => {
                error!(phone = %mask(phone), error = %e, "Routing failed, resetting session");
                let now = self.services.clock.now();
                if let Err(reset_err) = self.services.sessions.reset_session(phone, now).await {
                    error!(phone = %mask(phone), error = %reset_err, "Session reset failed");
                }
                say(self.replies.error())
            }
        }
    }

    async fn dispatch(&self, phone: &str, raw: &str) -> Result<Vec<Outbound>, ChatError> {
        let parsed = parse_message(raw);
        let now = self.services.clock.now();

        match parsed.intent {
            Intent::Help => return self.abort(phone, self.replies.help()).await,
            Intent::Cancel => return self.abort(phone, self.replies.cancelled()).await,
            Intent::RetrieveBooking => return self.retrieve_booking(phone, &parsed).await,
            Intent::MyBookings => return self.my_bookings(phone).await,
            _ => {}
        }

        let session = self.services.sessions.load_session(phone, now).await?;
        info!(
            phone = %mask(phone),
            state = session.state.name(),
            intent = ?parsed.intent,
            "Routing message"
        );

        let idle = now - session.last_activity;
        if !session.state.is_initial()
            && idle > Duration::minutes(self.rules.session_timeout_minutes)
        {
            info!(phone = %mask(phone), idle_minutes = idle.num_minutes(), "Session timed out");
            return self.abort(phone, self.replies.session_expired()).await;
        }

        let (next, replies) = match session.state {
            ConversationState::Initial => self.on_initial(&parsed).await?,
            ConversationState::AwaitingKeywords => self.on_awaiting_keywords(&parsed).await?,
            ConversationState::Browsing(ctx) => self.on_browsing(ctx, &parsed),
            ConversationState::ItemSelected(ctx) => self.on_item_selected(ctx, &parsed).await?,
            ConversationState::QuantityChosen(ctx) => {
                self.on_quantity_chosen(phone, ctx, &parsed).await?
            }
            ConversationState::HoldPending(ctx) => self.on_hold_pending(phone, ctx, &parsed).await?,
            ConversationState::PaymentPending(ctx) => {
                self.on_payment_pending(phone, ctx, &parsed).await?
            }
        };

        self.services.sessions.save_session(phone, &next, now).await?;
        Ok(replies)
    }

    /// Releases any live hold, resets the session and answers with `text`.
    async fn abort(&self, phone: &str, text: String) -> Result<Vec<Outbound>, ChatError> {
        if self.services.reservations.release_for_phone(phone).await? {
            info!(phone = %mask(phone), "Released hold on abort");
        }
        self.services
            .sessions
            .reset_session(phone, self.services.clock.now())
            .await?;
        Ok(say(text))
    }

    async fn on_initial(&self, parsed: &ParsedMessage) -> Result<Step, ChatError> {
        match parsed.intent {
            Intent::Search => {
                let keywords = extract_search_keywords(&parsed.cleaned);
                if keywords.is_empty() {
                    return Ok((ConversationState::AwaitingKeywords, say(self.replies.search_prompt())));
                }
                self.search(&keywords, ConversationState::Initial).await
            }
            Intent::Book => Ok((ConversationState::AwaitingKeywords, say(self.replies.search_prompt()))),
            Intent::Unknown if !parsed.is_empty && !parsed.is_number => {
                self.search(&parsed.cleaned, ConversationState::Initial).await
            }
            _ => Ok((ConversationState::Initial, say(self.replies.welcome()))),
        }
    }

    async fn on_awaiting_keywords(&self, parsed: &ParsedMessage) -> Result<Step, ChatError> {
        let keywords = extract_search_keywords(&parsed.cleaned);
        if keywords.is_empty() {
            return Ok((ConversationState::AwaitingKeywords, say(self.replies.search_prompt())));
        }
        self.search(&keywords, ConversationState::AwaitingKeywords).await
    }

    async fn search(&self, keywords: &str, on_miss: ConversationState) -> Result<Step, ChatError> {
        let results = self.services.search.search(keywords).await?;
        if results.is_empty() {
            return Ok((on_miss, say(self.replies.no_results(keywords))));
        }
        let text = self.replies.search_results(keywords, &results);
        Ok((
            ConversationState::Browsing(Browsing {
                keywords: keywords.to_string(),
                results,
            }),
            say(text),
        ))
    }

    fn on_browsing(&self, ctx: Browsing, parsed: &ParsedMessage) -> Step {
        if ctx.results.is_empty() {
            return (ConversationState::Initial, say(self.replies.session_expired()));
        }
        match parse_selection(&parsed.cleaned, ctx.results.len()) {
            Some(n) => {
                let item = ctx.results[n - 1].clone();
                let text = self.replies.event_details(&item);
                (ConversationState::ItemSelected(ItemSelected { item }), say(text))
            }
            None => {
                let text = self.replies.invalid_selection(ctx.results.len());
                (ConversationState::Browsing(ctx), say(text))
            }
        }
    }

    async fn on_item_selected(&self, ctx: ItemSelected, parsed: &ParsedMessage) -> Result<Step, ChatError> {
        let Some(quantity) = parse_quantity(&parsed.cleaned, self.rules.max_tickets) else {
            return Ok((ConversationState::ItemSelected(ctx), say(self.replies.invalid_quantity())));
        };

        match self.services.ledger.check_availability(ctx.item.id, quantity).await {
            Ok(live) => {
                let text = self.replies.ask_name(&live, quantity);
                let chosen = ItemSelected { item: live }.with_quantity(quantity);
                Ok((ConversationState::QuantityChosen(chosen), say(text)))
            }
            Err(InventoryError::InsufficientSeats { requested, available }) => {
                let text = self.replies.insufficient_seats(available, requested);
                Ok((ConversationState::ItemSelected(ctx), say(text)))
            }
            Err(InventoryError::NotFound(_)) => {
                Ok((ConversationState::Initial, say(self.replies.event_not_found())))
            }
            Err(InventoryError::Store(e)) => Err(e.into()),
        }
    }

    async fn on_quantity_chosen(
        &self,
        phone: &str,
        ctx: QuantityChosen,
        parsed: &ParsedMessage,
    ) -> Result<Step, ChatError> {
        let Some(user_name) = parse_user_name(&parsed.cleaned) else {
            return Ok((ConversationState::QuantityChosen(ctx), say(self.replies.invalid_name())));
        };

        match self.rules.checkout {
            CheckoutMode::Hold => self.begin_hold(phone, ctx, user_name).await,
            CheckoutMode::Balance => {
                let quote = self
                    .services
                    .balance_checkout
                    .quote(phone, &ctx.item, ctx.quantity)
                    .await?;
                let text = self
                    .replies
                    .balance_summary(&user_name, &ctx.item, ctx.quantity, &quote);
                Ok((ConversationState::PaymentPending(ctx.into_payment(user_name)), say(text)))
            }
        }
    }

    async fn begin_hold(&self, phone: &str, ctx: QuantityChosen, user_name: String) -> Result<Step, ChatError> {
        let hold_checkout = &self.services.hold_checkout;
        let reservation_id = match hold_checkout.start(phone, &ctx.item, ctx.quantity).await {
            Ok(id) => id,
            Err(HoldError::Store(e)) => return Err(e.into()),
            Err(HoldError::EventNotFound(_)) => {
                return Ok((ConversationState::Initial, say(self.replies.event_not_found())))
            }
            Err(HoldError::InsufficientSeats { requested, available }) => {
                let text = self.replies.insufficient_seats(available, requested);
                return Ok((ConversationState::Initial, say(text)));
            }
            Err(e @ (HoldError::ReservationFailed | HoldError::InvalidRequest(_))) => {
                warn!(phone = %mask(phone), error = %e, "Seat hold failed");
                return Ok((ConversationState::Initial, say(self.replies.hold_failed())));
            }
        };

        let Some(hold) = self.services.reservations.active_hold(phone).await? else {
            return Ok((ConversationState::Initial, say(self.replies.hold_failed())));
        };
        let minutes_left = hold.minutes_left(self.services.clock.now());
        let text = self.replies.hold_summary(&user_name, &hold, minutes_left);
        Ok((
            ConversationState::HoldPending(ctx.into_hold(user_name, reservation_id)),
            say(text),
        ))
    }

    async fn on_hold_pending(
        &self,
        phone: &str,
        ctx: HoldPending,
        parsed: &ParsedMessage,
    ) -> Result<Step, ChatError> {
        match parse_confirmation(&parsed.cleaned) {
            None => Ok((ConversationState::HoldPending(ctx), say(self.replies.confirm_prompt()))),
            Some(false) => {
                self.services.hold_checkout.abandon(ctx.reservation_id).await?;
                Ok((ConversationState::Initial, say(self.replies.cancelled())))
            }
            Some(true) => {
                let settlement = self.services.hold_checkout.settle(phone, &ctx).await?;
                Ok((ConversationState::Initial, self.settled(settlement)))
            }
        }
    }

    async fn on_payment_pending(
        &self,
        phone: &str,
        ctx: PaymentPending,
        parsed: &ParsedMessage,
    ) -> Result<Step, ChatError> {
        match parse_confirmation(&parsed.cleaned) {
            None => Ok((ConversationState::PaymentPending(ctx), say(self.replies.confirm_prompt()))),
            Some(false) => Ok((ConversationState::Initial, say(self.replies.cancelled()))),
            Some(true) => {
                let settlement = self.services.balance_checkout.settle(phone, &ctx).await?;
                Ok((ConversationState::Initial, self.settled(settlement)))
            }
        }
    }

    fn settled(&self, settlement: Settlement) -> Vec<Outbound> {
        match settlement {
            Settlement::Completed(receipt) => self.ticket_messages(&receipt),
            Settlement::HoldExpired => say(self.replies.hold_expired()),
            Settlement::SoldOut { requested, available } => {
                say(self.replies.insufficient_seats(available, requested))
            }
            Settlement::InsufficientBalance { required, balance } => {
                say(self.replies.insufficient_balance(required, balance))
            }
            Settlement::EventUnavailable => say(self.replies.event_not_found()),
        }
    }

    fn ticket_messages(&self, receipt: &Receipt) -> Vec<Outbound> {
        let mut out = say(self.replies.ticket_confirmation(receipt));
        if let Some(url) = &receipt.ticket.qr_code_url {
            out.push(Outbound::Media {
                url: url.clone(),
                caption: self.replies.qr_caption(&receipt.ticket.booking_ref),
            });
        }
        out
    }

    async fn retrieve_booking(&self, phone: &str, parsed: &ParsedMessage) -> Result<Vec<Outbound>, ChatError> {
        let Some(booking_ref) = extract_booking_ref(&parsed.cleaned) else {
            return Ok(say(self.replies.invalid_booking_ref()));
        };

        // Bookings are only shown to the phone that made them.
        let details = self
            .services
            .finalizer
            .retrieve(&booking_ref)
            .await?
            .filter(|d| d.booking.phone == phone);
        let Some(details) = details else {
            return Ok(say(self.replies.booking_not_found(&booking_ref)));
        };

        let mut out = say(self.replies.booking_details(&details));
        if let Some(url) = &details.booking.qr_code_url {
            out.push(Outbound::Media {
                url: url.clone(),
                caption: self.replies.qr_caption(&booking_ref),
            });
        }
        Ok(out)
    }

    async fn my_bookings(&self, phone: &str) -> Result<Vec<Outbound>, ChatError> {
        let bookings = self.services.finalizer.list_for_phone(phone).await?;
        if bookings.is_empty() {
            return Ok(say(self.replies.no_bookings()));
        }
        Ok(say(self.replies.bookings_list(&bookings)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    use ticketbot_core::clock::FixedClock;
    use ticketbot_core::repository::EventRepository;
    use ticketbot_core::ticket::{RenderError, RenderedTicket, TicketRenderer};
    use ticketbot_shared::{BookingStatus, EventId, NewEvent, QrPayload, ReservationStatus};
    use ticketbot_store::MemoryStore;

    const PHONE: &str = "919876543210";

    struct StaticRenderer;

    #[async_trait]
    impl TicketRenderer for StaticRenderer {
        async fn render(&self, payload: &QrPayload) -> Result<RenderedTicket, RenderError> {
            Ok(RenderedTicket {
                url: Some(format!("https://qr.test/{}.png", payload.booking_id)),
                image_png: None,
            })
        }
    }

    struct Harness {
        router: Router,
        store: Arc<MemoryStore>,
        clock: Arc<FixedClock>,
        concert: EventId,
    }

    impl Harness {
        async fn new(checkout: CheckoutMode) -> Self {
            let store = Arc::new(MemoryStore::new());
            let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap()));
            let ledger = SeatLedger::new(store.clone());
            let reservations = ReservationManager::new(store.clone(), clock.clone(), 5);
            let finalizer =
                BookingFinalizer::new(store.clone(), store.clone(), Arc::new(StaticRenderer), clock.clone(), 5);
            let services = ConversationServices {
                sessions: store.clone(),
                search: EventSearch::new(store.clone(), 3),
                ledger: ledger.clone(),
                reservations: reservations.clone(),
                finalizer: finalizer.clone(),
                hold_checkout: HoldCheckout::new(reservations, finalizer.clone()),
                balance_checkout: BalanceCheckout::new(finalizer, store.clone(), ledger, clock.clone(), 600_000),
                clock: clock.clone(),
            };
            let rules = ChatRules {
                max_tickets: 10,
                session_timeout_minutes: 30,
                checkout,
            };
            let router = Router::new(services, rules, Replies::new(330, 10));

            let concert = store
                .create_event(&NewEvent {
                    title: "Coldplay: Music of the Spheres".into(),
                    description: Some("Stadium tour".into()),
                    city: "Mumbai".into(),
                    venue: "DY Patil Stadium".into(),
                    event_date: Utc.with_ymd_and_hms(2026, 3, 20, 14, 0, 0).unwrap(),
                    total_seats: 100,
                    price: 250_000,
                })
                .await
                .unwrap();
            store
                .create_event(&NewEvent {
                    title: "Majestic to Whitefield Metro".into(),
                    description: None,
                    city: "Bangalore".into(),
                    venue: "Majestic Station".into(),
                    event_date: Utc.with_ymd_and_hms(2026, 3, 2, 3, 30, 0).unwrap(),
                    total_seats: 200,
                    price: 4_500,
                })
                .await
                .unwrap();

            Self {
                router,
                store,
                clock,
                concert,
            }
        }

        async fn send(&self, text: &str) -> Vec<Outbound> {
            self.router.route(PHONE, text).await
        }

        async fn first(&self, text: &str) -> String {
            let out = self.send(text).await;
            assert!(!out.is_empty(), "no reply to {text:?}");
            out[0].body().to_string()
        }

        async fn state(&self) -> ConversationState {
            self.store.load_session(PHONE, self.clock.now()).await.unwrap().state
        }

        async fn available(&self) -> i32 {
            self.store.get_event(self.concert).await.unwrap().unwrap().available_seats
        }

        async fn reach_quantity_chosen(&self) {
            self.send("book").await;
            self.send("coldplay").await;
            self.send("1").await;
            self.send("2").await;
        }
    }

    #[tokio::test]
    async fn test_hold_booking_end_to_end() {
        let h = Harness::new(CheckoutMode::Hold).await;

        assert!(h.first("hi").await.contains("Welcome"));
        assert!(h.first("book").await.contains("What are you looking for"));

        let results = h.first("coldplay").await;
        assert!(results.contains("1. Coldplay: Music of the Spheres"));
        assert_eq!(h.state().await.name(), "BROWSING");

        assert!(h.first("1").await.contains("How many tickets"));
        assert!(h.first("2").await.contains("name for the booking"));
        assert_eq!(h.available().await, 100);

        let summary = h.first("Priya Sharma").await;
        assert!(summary.contains("Seats held for you"));
        assert!(summary.contains("₹5,000.00"));
        assert!(summary.contains("expires in 5 minute(s)"));
        assert_eq!(h.available().await, 98);
        assert_eq!(h.state().await.name(), "HOLD_PENDING");

        let out = h.send("yes").await;
        assert_eq!(out.len(), 2);
        assert!(out[0].body().contains("Booking confirmed"));
        let booking = &h.store.bookings().await[0];
        assert_eq!(booking.user_name, "Priya Sharma");
        assert_eq!(booking.quantity, 2);
        assert_eq!(booking.total_price, 500_000);
        assert_eq!(
            out[1],
            Outbound::Media {
                url: format!("https://qr.test/{}.png", booking.booking_ref),
                caption: format!("QR Code for {}", booking.booking_ref),
            }
        );
        assert_eq!(h.available().await, 98);
        assert!(h.state().await.is_initial());
        assert_eq!(h.store.reservations().await[0].status, ReservationStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_search_keywords_in_first_message() {
        let h = Harness::new(CheckoutMode::Hold).await;

        let reply = h.first("search bangalore").await;
        assert!(reply.contains("Majestic to Whitefield Metro"));
        assert!(!reply.contains("Coldplay"));

        let reply = h.first("search").await;
        assert!(reply.contains("What are you looking for"));
        assert_eq!(h.state().await, ConversationState::AwaitingKeywords);

        assert!(h.first("atlantis").await.contains("Nothing found"));
        assert_eq!(h.state().await, ConversationState::AwaitingKeywords);
    }

    #[tokio::test]
    async fn test_out_of_range_selection_keeps_results() {
        let h = Harness::new(CheckoutMode::Hold).await;
        for (title, day) in [("Arijit Singh Live", 12), ("Zakir Khan Standup", 15)] {
            h.store
                .create_event(&NewEvent {
                    title: title.into(),
                    description: None,
                    city: "Mumbai".into(),
                    venue: "NSCI Dome".into(),
                    event_date: Utc.with_ymd_and_hms(2026, 3, day, 14, 0, 0).unwrap(),
                    total_seats: 40,
                    price: 90_000,
                })
                .await
                .unwrap();
        }

        let results = h.first("search mumbai").await;
        assert!(results.contains("3. "));
        let ConversationState::Browsing(before) = h.state().await else {
            panic!("expected BROWSING");
        };
        assert_eq!(before.results.len(), 3);

        let reply = h.first("9").await;
        assert!(reply.contains("Invalid selection"));
        assert!(reply.contains("between 1 and 3"));
        assert_eq!(h.state().await, ConversationState::Browsing(before));
    }

    #[tokio::test]
    async fn test_invalid_inputs_keep_state() {
        let h = Harness::new(CheckoutMode::Hold).await;
        h.send("search coldplay").await;

        assert!(h.first("7").await.contains("between 1 and 1"));
        assert_eq!(h.state().await.name(), "BROWSING");

        h.send("1").await;
        assert!(h.first("0").await.contains("between 1 and 10"));
        assert!(h.first("11").await.contains("between 1 and 10"));
        assert_eq!(h.state().await.name(), "ITEM_SELECTED");

        h.send("3").await;
        assert!(h.first("X").await.contains("2 to 50 letters"));
        assert!(h.first("R2D2").await.contains("2 to 50 letters"));
        assert_eq!(h.state().await.name(), "QUANTITY_CHOSEN");
        assert_eq!(h.available().await, 100);
    }

    #[tokio::test]
    async fn test_quantity_checked_against_live_seats() {
        let h = Harness::new(CheckoutMode::Hold).await;
        h.send("search coldplay").await;
        h.send("1").await;

        // Someone else takes most of the seats after the results were shown.
        h.store
            .adjust_seats(h.concert, 97, ticketbot_shared::SeatAdjustment::Decrease)
            .await
            .unwrap();

        let reply = h.first("5").await;
        assert!(reply.contains("Only 3 seat(s) left"));
        assert_eq!(h.state().await.name(), "ITEM_SELECTED");

        assert!(h.first("3").await.contains("name for the booking"));
    }

    #[tokio::test]
    async fn test_no_at_confirmation_releases_hold() {
        let h = Harness::new(CheckoutMode::Hold).await;
        h.reach_quantity_chosen().await;
        h.send("Priya").await;
        assert_eq!(h.available().await, 98);

        assert!(h.first("no").await.contains("booking cancelled"));
        assert_eq!(h.available().await, 100);
        assert!(h.state().await.is_initial());
        assert!(h.store.bookings().await.is_empty());
    }

    #[tokio::test]
    async fn test_unrecognized_confirmation_reprompts() {
        let h = Harness::new(CheckoutMode::Hold).await;
        h.reach_quantity_chosen().await;
        h.send("Priya").await;

        assert!(h.first("maybe").await.contains("reply *YES*"));
        assert_eq!(h.state().await.name(), "HOLD_PENDING");
    }

    #[tokio::test]
    async fn test_hold_expires_before_confirmation() {
        let h = Harness::new(CheckoutMode::Hold).await;
        h.reach_quantity_chosen().await;
        h.send("Priya").await;

        h.clock.advance(Duration::minutes(6));
        assert!(h.first("yes").await.contains("hold has expired"));
        assert!(h.store.bookings().await.is_empty());
        assert!(h.state().await.is_initial());
    }

    #[tokio::test]
    async fn test_cancel_and_help_release_hold() {
        let h = Harness::new(CheckoutMode::Hold).await;
        h.reach_quantity_chosen().await;
        h.send("Priya").await;
        assert_eq!(h.available().await, 98);

        assert!(h.first("CANCEL").await.contains("booking cancelled"));
        assert_eq!(h.available().await, 100);

        h.reach_quantity_chosen().await;
        h.send("Priya").await;
        assert!(h.first("help").await.contains("What I can do"));
        assert_eq!(h.available().await, 100);
        assert!(h.state().await.is_initial());
    }

    #[tokio::test]
    async fn test_idle_session_times_out() {
        let h = Harness::new(CheckoutMode::Hold).await;
        h.send("search coldplay").await;
        h.send("1").await;

        h.clock.advance(Duration::minutes(31));
        assert!(h.first("2").await.contains("session expired"));
        assert!(h.state().await.is_initial());
    }

    #[tokio::test]
    async fn test_retrieve_and_list_bookings() {
        let h = Harness::new(CheckoutMode::Hold).await;
        assert!(h.first("my bookings").await.contains("no bookings yet"));

        h.reach_quantity_chosen().await;
        h.send("Priya").await;
        h.send("yes").await;
        let booking_ref = h.store.bookings().await[0].booking_ref.clone();

        let out = h.send(&booking_ref.as_str().to_lowercase()).await;
        assert_eq!(out.len(), 2);
        assert!(out[0].body().contains("✅ Confirmed"));

        let list = h.first("my bookings").await;
        assert!(list.contains("Your bookings (1)"));
        assert!(list.contains(booking_ref.as_str()));

        // Another phone cannot look the booking up.
        let other = h.router.route("919000000000", booking_ref.as_str()).await;
        assert!(other[0].body().contains("not found"));

        assert!(h.first("BKG-12").await.contains("Invalid booking ID"));
    }

    #[tokio::test]
    async fn test_balance_checkout_debits_account() {
        let h = Harness::new(CheckoutMode::Balance).await;
        h.reach_quantity_chosen().await;

        let summary = h.first("Priya").await;
        assert!(summary.contains("Payment summary"));
        assert!(summary.contains("After payment: ₹1,000.00"));
        assert_eq!(h.available().await, 100);
        assert_eq!(h.state().await.name(), "PAYMENT_PENDING");

        let out = h.send("yes").await;
        assert!(out[0].body().contains("Remaining balance: ₹1,000.00"));
        assert_eq!(out.len(), 2);
        assert_eq!(h.available().await, 98);
        assert_eq!(h.store.bookings().await[0].status, BookingStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_balance_shortfall_books_nothing() {
        let h = Harness::new(CheckoutMode::Balance).await;
        h.send("search coldplay").await;
        h.send("1").await;
        h.send("3").await;

        let summary = h.first("Priya").await;
        assert!(summary.contains("Short by: ₹1,500.00"));

        assert!(h.first("yes").await.contains("Insufficient balance"));
        assert!(h.store.bookings().await.is_empty());
        assert_eq!(h.available().await, 100);
        assert!(h.state().await.is_initial());
    }

    #[tokio::test]
    async fn test_sold_out_between_selection_and_hold() {
        let h = Harness::new(CheckoutMode::Hold).await;
        h.reach_quantity_chosen().await;
        h.store
            .adjust_seats(h.concert, 100, ticketbot_shared::SeatAdjustment::Decrease)
            .await
            .unwrap();

        assert!(h.first("Priya").await.contains("sold out"));
        assert!(h.state().await.is_initial());
        assert!(h.store.reservations().await.is_empty());
    }
}
