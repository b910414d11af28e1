pub mod clock;
pub mod messaging;
pub mod repository;
pub mod ticket;

use ticketbot_shared::EventId;

/// Failure reported by a persistence backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Storage backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Booking reference already taken: {0}")]
    DuplicateBookingRef(String),
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StoreError::Backend(Box::new(err))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Why a seat hold could not be placed.
#[derive(Debug, thiserror::Error)]
pub enum HoldError {
    #[error("Invalid hold request: {0}")]
    InvalidRequest(String),
    #[error("Event not found: {0}")]
    EventNotFound(EventId),
    #[error("Insufficient seats: requested {requested}, available {available}")]
    InsufficientSeats { requested: i32, available: i32 },
    #[error("Reservation failed: seats were taken concurrently")]
    ReservationFailed,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Why a balance-paid booking could not be completed.
#[derive(Debug, thiserror::Error)]
pub enum PurchaseError {
    #[error("Event not found: {0}")]
    EventNotFound(EventId),
    #[error("Insufficient seats: requested {requested}, available {available}")]
    InsufficientSeats { requested: i32, available: i32 },
    #[error("Insufficient balance: required {required}, balance {balance}")]
    InsufficientBalance { required: i64, balance: i64 },
    #[error("Booking reference already taken: {0}")]
    DuplicateBookingRef(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// How a conversation pays for seats once the passenger name is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckoutMode {
    /// Seats are held for a limited time until the user confirms.
    #[default]
    Hold,
    /// The ticket price is debited from a prepaid balance on confirmation.
    Balance,
}
