pub mod inventory;
pub mod pricing;
pub mod search;

pub use inventory::{InventoryError, SeatLedger};
pub use pricing::{format_currency, line_total};
pub use search::EventSearch;
