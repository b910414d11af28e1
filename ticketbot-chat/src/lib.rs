pub mod delivery;
pub mod parser;
pub mod replies;
pub mod router;

pub use delivery::{deliver, DeliveryReport};
pub use parser::{parse_message, Intent, ParsedMessage};
pub use replies::Replies;
pub use router::{ChatError, ChatRules, ConversationServices, Router};
