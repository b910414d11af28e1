pub mod account;
pub mod booking;
pub mod event;
pub mod reservation;
pub mod session;

pub use account::*;
pub use booking::*;
pub use event::*;
pub use reservation::*;
pub use session::*;
