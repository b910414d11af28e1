use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type EventId = i64;

/// A bookable listing: a show, a match or a scheduled train.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub title: String,
    pub description: Option<String>,
    pub city: String,
    pub venue: String,
    pub event_date: DateTime<Utc>,
    pub total_seats: i32,
    pub available_seats: i32,
    /// Price per ticket in paise.
    pub price: i64,
    pub is_active: bool,
}

impl Event {
    /// Display fields captured at booking time.
    pub fn snapshot(&self) -> EventSnapshot {
        EventSnapshot {
            id: self.id,
            title: self.title.clone(),
            city: self.city.clone(),
            venue: self.venue.clone(),
            event_date: self.event_date,
            price: self.price,
        }
    }

    pub fn is_bookable(&self) -> bool {
        self.is_active && self.available_seats > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSnapshot {
    pub id: EventId,
    pub title: String,
    pub city: String,
    pub venue: String,
    pub event_date: DateTime<Utc>,
    pub price: i64,
}

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub title: String,
    pub description: Option<String>,
    pub city: String,
    pub venue: String,
    pub event_date: DateTime<Utc>,
    pub total_seats: i32,
    pub price: i64,
}

/// Direction of an atomic change to an event's available seat counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatAdjustment {
    Decrease,
    Increase,
}

impl SeatAdjustment {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatAdjustment::Decrease => "decrease",
            SeatAdjustment::Increase => "increase",
        }
    }
}
