use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::event::{EventId, EventSnapshot};

pub type BookingId = i64;

const REF_PREFIX: &str = "BKG-";
const REF_SUFFIX_LEN: usize = 6;
const REF_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Customer-facing booking identifier, `BKG-` followed by six of `[A-Z0-9]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BookingRef(String);

impl BookingRef {
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let suffix: String = (0..REF_SUFFIX_LEN)
            .map(|_| REF_ALPHABET[rng.gen_range(0..REF_ALPHABET.len())] as char)
            .collect();
        BookingRef(format!("{REF_PREFIX}{suffix}"))
    }

    /// Accepts any case, stores upper case.
    pub fn parse(raw: &str) -> Option<Self> {
        let upper = raw.trim().to_ascii_uppercase();
        let suffix = upper.strip_prefix(REF_PREFIX)?;
        let valid = suffix.len() == REF_SUFFIX_LEN
            && suffix
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit());
        valid.then_some(BookingRef(upper))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BookingRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for BookingRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BookingRef::parse(s).ok_or_else(|| format!("invalid booking reference: {s}"))
    }
}

impl TryFrom<String> for BookingRef {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BookingRef> for String {
    fn from(value: BookingRef) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            other => Err(format!("unknown booking status: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub booking_ref: BookingRef,
    pub event_id: EventId,
    pub phone: String,
    pub user_name: String,
    pub quantity: i32,
    pub total_price: i64,
    pub status: BookingStatus,
    pub qr_code_data: Option<String>,
    pub qr_code_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A booking joined with the event it was made for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingDetails {
    pub booking: Booking,
    pub event: EventSnapshot,
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub booking_ref: BookingRef,
    pub event_id: EventId,
    pub phone: String,
    pub user_name: String,
    pub quantity: i32,
    pub total_price: i64,
    pub qr_code_data: Option<String>,
    pub qr_code_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Contents encoded into a ticket's QR code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrPayload {
    pub booking_id: String,
    pub event_id: EventId,
    pub event_title: String,
    pub quantity: i32,
    pub user_name: String,
    pub issued_at: DateTime<Utc>,
    pub verification_code: String,
}

impl QrPayload {
    pub fn new(
        booking_ref: &BookingRef,
        event: &EventSnapshot,
        user_name: &str,
        quantity: i32,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            booking_id: booking_ref.to_string(),
            event_id: event.id,
            event_title: event.title.clone(),
            quantity,
            user_name: user_name.to_string(),
            issued_at,
            verification_code: booking_ref.to_string(),
        }
    }
}

/// The artifact handed back to the user after a successful booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub booking_ref: BookingRef,
    pub event: EventSnapshot,
    pub user_name: String,
    pub quantity: i32,
    pub total_price: i64,
    pub qr_code_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_generated_refs_match_format() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let r = BookingRef::generate(&mut rng);
            assert!(r.as_str().starts_with("BKG-"));
            assert_eq!(r.as_str().len(), 10);
            assert_eq!(BookingRef::parse(r.as_str()), Some(r.clone()));
        }
    }

    #[test]
    fn test_parse_normalizes_case_and_rejects_garbage() {
        assert_eq!(
            BookingRef::parse("bkg-ab12cd").map(String::from),
            Some("BKG-AB12CD".to_string())
        );
        assert!(BookingRef::parse("BKG-AB12C").is_none());
        assert!(BookingRef::parse("BKG-AB12CDE").is_none());
        assert!(BookingRef::parse("BKG-AB_2CD").is_none());
        assert!(BookingRef::parse("XYZ-AB12CD").is_none());
    }

    #[test]
    fn test_qr_payload_uses_camel_case_keys() {
        let event = EventSnapshot {
            id: 4,
            title: "Jazz Night".into(),
            city: "Mumbai".into(),
            venue: "NCPA".into(),
            event_date: Utc::now(),
            price: 50_000,
        };
        let r = BookingRef::parse("BKG-AAAAAA").unwrap();
        let payload = QrPayload::new(&r, &event, "Asha Rao", 2, Utc::now());
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["bookingId"], "BKG-AAAAAA");
        assert_eq!(json["verificationCode"], "BKG-AAAAAA");
        assert_eq!(json["eventTitle"], "Jazz Night");
    }
}
