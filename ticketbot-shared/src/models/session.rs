use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::event::Event;
use super::reservation::ReservationId;

/// Per-phone conversation record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub phone: String,
    pub state: ConversationState,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    pub fn new(phone: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            phone: phone.into(),
            state: ConversationState::Initial,
            last_activity: now,
        }
    }
}

/// Where a conversation stands, together with the data collected so far.
///
/// Each payload carries the fields gathered by the states before it, so a
/// state can never be entered without the context it depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "context", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversationState {
    #[default]
    Initial,
    AwaitingKeywords,
    Browsing(Browsing),
    ItemSelected(ItemSelected),
    QuantityChosen(QuantityChosen),
    HoldPending(HoldPending),
    PaymentPending(PaymentPending),
}

impl ConversationState {
    pub fn name(&self) -> &'static str {
        match self {
            ConversationState::Initial => "INITIAL",
            ConversationState::AwaitingKeywords => "AWAITING_KEYWORDS",
            ConversationState::Browsing(_) => "BROWSING",
            ConversationState::ItemSelected(_) => "ITEM_SELECTED",
            ConversationState::QuantityChosen(_) => "QUANTITY_CHOSEN",
            ConversationState::HoldPending(_) => "HOLD_PENDING",
            ConversationState::PaymentPending(_) => "PAYMENT_PENDING",
        }
    }

    pub fn is_initial(&self) -> bool {
        matches!(self, ConversationState::Initial)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Browsing {
    pub keywords: String,
    pub results: Vec<Event>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSelected {
    pub item: Event,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantityChosen {
    pub item: Event,
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldPending {
    pub item: Event,
    pub quantity: i32,
    pub user_name: String,
    pub reservation_id: ReservationId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentPending {
    pub item: Event,
    pub quantity: i32,
    pub user_name: String,
}

impl ItemSelected {
    pub fn with_quantity(self, quantity: i32) -> QuantityChosen {
        QuantityChosen {
            item: self.item,
            quantity,
        }
    }
}

impl QuantityChosen {
    pub fn into_hold(self, user_name: String, reservation_id: ReservationId) -> HoldPending {
        HoldPending {
            item: self.item,
            quantity: self.quantity,
            user_name,
            reservation_id,
        }
    }

    pub fn into_payment(self, user_name: String) -> PaymentPending {
        PaymentPending {
            item: self.item,
            quantity: self.quantity,
            user_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_serializes_with_tag_and_context() {
        let json = serde_json::to_value(ConversationState::Initial).unwrap();
        assert_eq!(json["state"], "INITIAL");

        let state = ConversationState::Browsing(Browsing {
            keywords: "jazz".into(),
            results: vec![],
        });
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["state"], "BROWSING");
        assert_eq!(json["context"]["keywords"], "jazz");

        let back: ConversationState = serde_json::from_value(json).unwrap();
        assert_eq!(back.name(), "BROWSING");
    }
}
