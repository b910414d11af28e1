use std::sync::Arc;
use tracing::{info, warn};

use ticketbot_catalog::line_total;
use ticketbot_core::clock::Clock;
use ticketbot_core::repository::{AccountRepository, BookingRepository};
use ticketbot_core::ticket::TicketRenderer;
use ticketbot_core::{PurchaseError, StoreError, StoreResult};
use ticketbot_shared::pii::mask;
use ticketbot_shared::{BookingDetails, BookingRef, EventSnapshot, NewBooking, QrPayload, Ticket};

#[derive(Debug, thiserror::Error)]
pub enum FinalizeError {
    #[error("Could not allocate a unique booking reference after {0} attempts")]
    ReferenceExhausted(u32),
    #[error("Failed to encode ticket payload: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Turns held (or paid-for) seats into permanent bookings with a ticket.
#[derive(Clone)]
pub struct BookingFinalizer {
    bookings: Arc<dyn BookingRepository>,
    accounts: Arc<dyn AccountRepository>,
    renderer: Arc<dyn TicketRenderer>,
    clock: Arc<dyn Clock>,
    max_attempts: u32,
}

struct Draft {
    booking: NewBooking,
    ticket: Ticket,
}

impl BookingFinalizer {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        accounts: Arc<dyn AccountRepository>,
        renderer: Arc<dyn TicketRenderer>,
        clock: Arc<dyn Clock>,
        max_attempts: u32,
    ) -> Self {
        Self {
            bookings,
            accounts,
            renderer,
            clock,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Records a confirmed booking for seats that are already withheld.
    pub async fn finalize(
        &self,
        event: &EventSnapshot,
        phone: &str,
        user_name: &str,
        quantity: i32,
    ) -> Result<Ticket, FinalizeError> {
        for attempt in 1..=self.max_attempts {
            let draft = self.draft(event, phone, user_name, quantity).await?;
            match self.bookings.insert_booking(&draft.booking).await {
                Ok(id) => {
                    info!(
                        booking_id = id,
                        booking_ref = %draft.ticket.booking_ref,
                        event_id = event.id,
                        quantity,
                        phone = %mask(phone),
                        "Booking confirmed"
                    );
                    return Ok(draft.ticket);
                }
                Err(StoreError::DuplicateBookingRef(r)) => {
                    warn!(attempt, booking_ref = %r, "Booking reference collision, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(FinalizeError::ReferenceExhausted(self.max_attempts))
    }

    /// Debits the phone's balance and books the seats in one step.
    /// Returns the ticket and the remaining balance.
    pub async fn purchase(
        &self,
        event: &EventSnapshot,
        phone: &str,
        user_name: &str,
        quantity: i32,
    ) -> Result<(Ticket, i64), PurchaseError> {
        let mut last_ref = String::new();
        for attempt in 1..=self.max_attempts {
            let draft = self
                .draft(event, phone, user_name, quantity)
                .await
                .map_err(|e| match e {
                    FinalizeError::Store(s) => PurchaseError::Store(s),
                    other => PurchaseError::Store(StoreError::Corrupt(other.to_string())),
                })?;
            let description = format!("{} x{}", event.title, quantity);
            match self.accounts.purchase(&draft.booking, &description).await {
                Ok((id, balance)) => {
                    info!(
                        booking_id = id,
                        booking_ref = %draft.ticket.booking_ref,
                        event_id = event.id,
                        quantity,
                        balance,
                        phone = %mask(phone),
                        "Booking paid from balance"
                    );
                    return Ok((draft.ticket, balance));
                }
                Err(PurchaseError::DuplicateBookingRef(r)) => {
                    warn!(attempt, booking_ref = %r, "Booking reference collision, regenerating");
                    last_ref = r;
                }
                Err(e) => return Err(e),
            }
        }
        Err(PurchaseError::DuplicateBookingRef(last_ref))
    }

    /// `confirmed -> cancelled`, seats restored. False if missing or already cancelled.
    pub async fn cancel(&self, booking_ref: &BookingRef) -> StoreResult<bool> {
        let cancelled = self.bookings.cancel_booking(booking_ref).await?;
        if cancelled {
            info!(booking_ref = %booking_ref, "Booking cancelled");
        }
        Ok(cancelled)
    }

    pub async fn retrieve(&self, booking_ref: &BookingRef) -> StoreResult<Option<BookingDetails>> {
        self.bookings.find_booking(booking_ref).await
    }

    pub async fn list_for_phone(&self, phone: &str) -> StoreResult<Vec<BookingDetails>> {
        self.bookings.list_bookings_for_phone(phone).await
    }

    async fn draft(
        &self,
        event: &EventSnapshot,
        phone: &str,
        user_name: &str,
        quantity: i32,
    ) -> Result<Draft, FinalizeError> {
        let booking_ref = BookingRef::generate(&mut rand::thread_rng());
        let issued_at = self.clock.now();
        let total_price = line_total(event.price, quantity);

        let payload = QrPayload::new(&booking_ref, event, user_name, quantity, issued_at);
        let qr_code_data = serde_json::to_string(&payload)?;
        let qr_code_url = match self.renderer.render(&payload).await {
            Ok(rendered) => rendered.url,
            Err(e) => {
                warn!(booking_ref = %booking_ref, error = %e, "Ticket rendering failed, continuing without QR");
                None
            }
        };

        Ok(Draft {
            booking: NewBooking {
                booking_ref: booking_ref.clone(),
                event_id: event.id,
                phone: phone.to_string(),
                user_name: user_name.to_string(),
                quantity,
                total_price,
                qr_code_data: Some(qr_code_data),
                qr_code_url: qr_code_url.clone(),
                created_at: issued_at,
            },
            ticket: Ticket {
                booking_ref,
                event: event.clone(),
                user_name: user_name.to_string(),
                quantity,
                total_price,
                qr_code_url,
            },
        })
    }
}
