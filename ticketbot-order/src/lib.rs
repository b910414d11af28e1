pub mod checkout;
pub mod fulfillment;
pub mod manager;
pub mod qr;

pub use checkout::{BalanceCheckout, BalanceQuote, CheckoutError, HoldCheckout, Receipt, Settlement};
pub use fulfillment::{BookingFinalizer, FinalizeError};
pub use manager::ReservationManager;
pub use qr::HostedQrRenderer;

#[cfg(test)]
pub(crate) mod test_support;
