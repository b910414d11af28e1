use std::sync::Arc;
use tracing::{error, info, warn};

use ticketbot_catalog::{line_total, InventoryError, SeatLedger};
use ticketbot_core::clock::Clock;
use ticketbot_core::repository::AccountRepository;
use ticketbot_core::{HoldError, PurchaseError, StoreError};
use ticketbot_shared::pii::mask;
use ticketbot_shared::{Event, HoldPending, PaymentPending, ReservationId, Ticket};

use crate::fulfillment::{BookingFinalizer, FinalizeError};
use crate::manager::ReservationManager;

#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error(transparent)]
    Finalize(#[from] FinalizeError),
    #[error(transparent)]
    Purchase(#[from] PurchaseError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub ticket: Ticket,
    /// Remaining balance when the booking was paid from one.
    pub balance_after: Option<i64>,
}

/// How a confirmed checkout ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    Completed(Receipt),
    /// The hold lapsed or was replaced before the user confirmed.
    HoldExpired,
    SoldOut { requested: i32, available: i32 },
    InsufficientBalance { required: i64, balance: i64 },
    EventUnavailable,
}

/// Checkout that withholds seats for a limited time before the user confirms.
#[derive(Clone)]
pub struct HoldCheckout {
    reservations: ReservationManager,
    finalizer: BookingFinalizer,
}

impl HoldCheckout {
    pub fn new(reservations: ReservationManager, finalizer: BookingFinalizer) -> Self {
        Self {
            reservations,
            finalizer,
        }
    }

    pub fn ttl_minutes(&self) -> i64 {
        self.reservations.default_ttl_minutes()
    }

    pub async fn start(&self, phone: &str, item: &Event, quantity: i32) -> Result<ReservationId, HoldError> {
        self.reservations
            .create_hold(item.id, phone, quantity, self.ttl_minutes())
            .await
    }

    /// Confirms the hold and books it. A hold that is gone, superseded or
    /// lost to the sweep yields `HoldExpired`.
    pub async fn settle(&self, phone: &str, pending: &HoldPending) -> Result<Settlement, CheckoutError> {
        let Some(hold) = self.reservations.active_hold(phone).await? else {
            return Ok(Settlement::HoldExpired);
        };
        if hold.reservation.id != pending.reservation_id {
            warn!(
                expected = pending.reservation_id,
                found = hold.reservation.id,
                phone = %mask(phone),
                "Pending hold was superseded"
            );
            return Ok(Settlement::HoldExpired);
        }
        if !self.reservations.confirm(hold.reservation.id).await? {
            return Ok(Settlement::HoldExpired);
        }

        match self
            .finalizer
            .finalize(&hold.event, phone, &pending.user_name, hold.reservation.quantity)
            .await
        {
            Ok(ticket) => Ok(Settlement::Completed(Receipt {
                ticket,
                balance_after: None,
            })),
            Err(e) => {
                error!(
                    reservation_id = hold.reservation.id,
                    error = %e,
                    "Finalize failed after confirming hold, reverting"
                );
                if let Err(revert_err) = self.reservations.revert_confirmation(hold.reservation.id).await {
                    error!(reservation_id = hold.reservation.id, error = %revert_err, "Hold revert failed");
                }
                Err(e.into())
            }
        }
    }

    /// Releases the hold immediately.
    pub async fn abandon(&self, reservation_id: ReservationId) -> Result<bool, StoreError> {
        self.reservations.cancel(reservation_id).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceQuote {
    pub balance: i64,
    pub total: i64,
}

impl BalanceQuote {
    pub fn is_sufficient(&self) -> bool {
        self.balance >= self.total
    }

    pub fn balance_after(&self) -> i64 {
        self.balance - self.total
    }

    pub fn shortfall(&self) -> i64 {
        (self.total - self.balance).max(0)
    }
}

/// Checkout that pays from a prepaid balance at confirmation time.
#[derive(Clone)]
pub struct BalanceCheckout {
    finalizer: BookingFinalizer,
    accounts: Arc<dyn AccountRepository>,
    ledger: SeatLedger,
    clock: Arc<dyn Clock>,
    opening_balance: i64,
}

impl BalanceCheckout {
    pub fn new(
        finalizer: BookingFinalizer,
        accounts: Arc<dyn AccountRepository>,
        ledger: SeatLedger,
        clock: Arc<dyn Clock>,
        opening_balance: i64,
    ) -> Self {
        Self {
            finalizer,
            accounts,
            ledger,
            clock,
            opening_balance,
        }
    }

    pub async fn quote(&self, phone: &str, item: &Event, quantity: i32) -> Result<BalanceQuote, StoreError> {
        let account = self
            .accounts
            .open_account(phone, self.opening_balance, self.clock.now())
            .await?;
        Ok(BalanceQuote {
            balance: account.balance,
            total: line_total(item.price, quantity),
        })
    }

    /// Re-checks live seats and balance, then purchases atomically.
    pub async fn settle(&self, phone: &str, pending: &PaymentPending) -> Result<Settlement, CheckoutError> {
        let event = match self
            .ledger
            .check_availability(pending.item.id, pending.quantity)
            .await
        {
            Ok(event) => event,
            Err(InventoryError::NotFound(_)) => return Ok(Settlement::EventUnavailable),
            Err(InventoryError::InsufficientSeats { requested, available }) => {
                return Ok(Settlement::SoldOut { requested, available })
            }
            Err(InventoryError::Store(e)) => return Err(e.into()),
        };

        let quote = self.quote(phone, &event, pending.quantity).await?;
        if !quote.is_sufficient() {
            return Ok(Settlement::InsufficientBalance {
                required: quote.total,
                balance: quote.balance,
            });
        }

        match self
            .finalizer
            .purchase(&event.snapshot(), phone, &pending.user_name, pending.quantity)
            .await
        {
            Ok((ticket, balance)) => {
                info!(booking_ref = %ticket.booking_ref, balance, "Balance checkout completed");
                Ok(Settlement::Completed(Receipt {
                    ticket,
                    balance_after: Some(balance),
                }))
            }
            Err(PurchaseError::InsufficientSeats { requested, available }) => {
                Ok(Settlement::SoldOut { requested, available })
            }
            Err(PurchaseError::InsufficientBalance { required, balance }) => {
                Ok(Settlement::InsufficientBalance { required, balance })
            }
            Err(PurchaseError::EventNotFound(_)) => Ok(Settlement::EventUnavailable),
            Err(e) => Err(e.into()),
        }
    }
}
