pub mod account_repo;
pub mod app_config;
pub mod booking_repo;
pub mod database;
pub mod event_repo;
mod ledger;
pub mod memory;
pub mod redis_repo;
pub mod reservation_repo;
pub mod session_repo;

pub use account_repo::PgAccountRepository;
pub use booking_repo::PgBookingRepository;
pub use database::DbClient;
pub use event_repo::PgEventRepository;
pub use memory::MemoryStore;
pub use redis_repo::RedisClient;
pub use reservation_repo::PgReservationRepository;
pub use session_repo::PgSessionRepository;
