use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::event::{EventId, EventSnapshot};

pub type ReservationId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Active,
    Confirmed,
    Expired,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Active => "active",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReservationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ReservationStatus::Active),
            "confirmed" => Ok(ReservationStatus::Confirmed),
            "expired" => Ok(ReservationStatus::Expired),
            other => Err(format!("unknown reservation status: {other}")),
        }
    }
}

/// A time-limited seat hold. Its quantity is withheld from the event while `Active`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub event_id: EventId,
    pub phone: String,
    pub quantity: i32,
    pub status: ReservationStatus,
    pub reserved_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Reservation {
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Active && self.expires_at > now
    }
}

#[derive(Debug, Clone)]
pub struct HoldRequest {
    pub event_id: EventId,
    pub phone: String,
    pub quantity: i32,
    pub reserved_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// An unexpired active reservation joined with the event it holds seats on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveHold {
    pub reservation: Reservation,
    pub event: EventSnapshot,
}

impl ActiveHold {
    pub fn total_price(&self) -> i64 {
        self.event.price * i64::from(self.reservation.quantity)
    }

    pub fn time_remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.reservation.expires_at - now).max(Duration::zero())
    }

    /// Whole minutes left on the hold, rounded up.
    pub fn minutes_left(&self, now: DateTime<Utc>) -> i64 {
        (self.time_remaining(now).num_milliseconds() + 59_999) / 60_000
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn hold(reserved_at: DateTime<Utc>, ttl_minutes: i64) -> ActiveHold {
        ActiveHold {
            reservation: Reservation {
                id: 1,
                event_id: 1,
                phone: "919000000001".into(),
                quantity: 2,
                status: ReservationStatus::Active,
                reserved_at,
                expires_at: reserved_at + Duration::minutes(ttl_minutes),
            },
            event: EventSnapshot {
                id: 1,
                title: "Sunburn Arena".into(),
                city: "Pune".into(),
                venue: "Mahalakshmi Lawns".into(),
                event_date: reserved_at + Duration::days(7),
                price: 150_000,
            },
        }
    }

    #[test]
    fn test_minutes_left_rounds_up() {
        let t = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        let h = hold(t, 5);

        assert_eq!(h.minutes_left(t), 5);
        assert_eq!(h.minutes_left(t + Duration::milliseconds(5)), 5);
        assert_eq!(h.minutes_left(t + Duration::seconds(61)), 4);
        assert_eq!(h.minutes_left(t + Duration::seconds(299)), 1);
        assert_eq!(h.minutes_left(t + Duration::minutes(5)), 0);
        assert_eq!(h.minutes_left(t + Duration::minutes(9)), 0);
    }
}
