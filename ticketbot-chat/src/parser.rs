use regex::Regex;
use std::sync::LazyLock;

use ticketbot_shared::BookingRef;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static SEARCH_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(search|find|look\s+for)\s+").unwrap());
static BOOKING_REF: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"BKG-[A-Z0-9]{6}").unwrap());
static USER_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\p{L}[\p{L}\p{M} .'\-]*$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Search,
    Book,
    Cancel,
    Help,
    Greeting,
    RetrieveBooking,
    MyBookings,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMessage {
    pub original: String,
    /// Trimmed, with runs of whitespace collapsed to one space.
    pub cleaned: String,
    pub intent: Intent,
    pub is_number: bool,
    pub number: Option<u32>,
    pub is_empty: bool,
}

pub fn sanitize(raw: &str) -> String {
    WHITESPACE.replace_all(raw.trim(), " ").into_owned()
}

pub fn parse_intent(cleaned: &str) -> Intent {
    let msg = cleaned.trim().to_uppercase();
    if msg.starts_with("SEARCH") || msg.starts_with("FIND") || msg.starts_with("LOOK") {
        return Intent::Search;
    }
    match msg.as_str() {
        "BOOK" | "BOOKING" => Intent::Book,
        "CANCEL" | "STOP" => Intent::Cancel,
        "HELP" | "MENU" | "?" => Intent::Help,
        "HI" | "HELLO" | "HEY" | "START" => Intent::Greeting,
        "MY BOOKINGS" | "BOOKINGS" => Intent::MyBookings,
        _ if msg.starts_with("BKG-") => Intent::RetrieveBooking,
        _ => Intent::Unknown,
    }
}

pub fn parse_message(raw: &str) -> ParsedMessage {
    let cleaned = sanitize(raw);
    let is_number = !cleaned.is_empty() && cleaned.bytes().all(|b| b.is_ascii_digit());
    ParsedMessage {
        original: raw.to_string(),
        intent: parse_intent(&cleaned),
        is_number,
        number: leading_number(&cleaned),
        is_empty: cleaned.is_empty(),
        cleaned,
    }
}

/// Leading decimal digits, like `"2 tickets"` -> 2.
fn leading_number(text: &str) -> Option<u32> {
    let digits: String = text
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Strips a leading "search", "find" or "look for".
pub fn extract_search_keywords(cleaned: &str) -> String {
    let stripped = SEARCH_PREFIX.replace(cleaned, "");
    let stripped = stripped.trim();
    // A bare command word carries no keywords.
    if matches!(stripped.to_uppercase().as_str(), "SEARCH" | "FIND" | "LOOK" | "LOOK FOR") {
        return String::new();
    }
    stripped.to_string()
}

/// 1-based position into a list of `count` entries.
pub fn parse_selection(text: &str, count: usize) -> Option<usize> {
    let n = leading_number(text)? as usize;
    (1..=count).contains(&n).then_some(n)
}

pub fn parse_quantity(text: &str, max: i32) -> Option<i32> {
    let n = i32::try_from(leading_number(text)?).ok()?;
    (1..=max).contains(&n).then_some(n)
}

/// 2 to 50 characters of letters, spaces and `.'-`, starting with a letter.
pub fn parse_user_name(text: &str) -> Option<String> {
    let cleaned = sanitize(text);
    let len = cleaned.chars().count();
    if !(2..=50).contains(&len) || !USER_NAME.is_match(&cleaned) {
        return None;
    }
    Some(cleaned)
}

pub fn extract_booking_ref(text: &str) -> Option<BookingRef> {
    let upper = text.trim().to_uppercase();
    BOOKING_REF
        .find(&upper)
        .and_then(|m| BookingRef::parse(m.as_str()))
}

/// `Some(true)` for yes-words, `Some(false)` for no-words.
pub fn parse_confirmation(text: &str) -> Option<bool> {
    match text.trim().to_lowercase().as_str() {
        "yes" | "y" | "confirm" | "ok" | "sure" | "proceed" => Some(true),
        "no" | "n" | "cancel" | "stop" | "abort" => Some(false),
        _ => None,
    }
}

/// Strips a `whatsapp:` prefix and every non-digit.
pub fn normalize_phone(raw: &str) -> String {
    raw.trim()
        .trim_start_matches("whatsapp:")
        .chars()
        .filter(char::is_ascii_digit)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intents() {
        assert_eq!(parse_intent("search mumbai"), Intent::Search);
        assert_eq!(parse_intent("Find comedy"), Intent::Search);
        assert_eq!(parse_intent("look for jazz"), Intent::Search);
        assert_eq!(parse_intent("book"), Intent::Book);
        assert_eq!(parse_intent("BOOKING"), Intent::Book);
        assert_eq!(parse_intent("book now"), Intent::Unknown);
        assert_eq!(parse_intent("stop"), Intent::Cancel);
        assert_eq!(parse_intent("?"), Intent::Help);
        assert_eq!(parse_intent("Menu"), Intent::Help);
        assert_eq!(parse_intent("Hello"), Intent::Greeting);
        assert_eq!(parse_intent("bkg-12ab34"), Intent::RetrieveBooking);
        assert_eq!(parse_intent("my bookings"), Intent::MyBookings);
        assert_eq!(parse_intent("mumbai"), Intent::Unknown);
    }

    #[test]
    fn test_parse_message_collapses_whitespace() {
        let parsed = parse_message("  my \t  bookings \n");
        assert_eq!(parsed.cleaned, "my bookings");
        assert_eq!(parsed.intent, Intent::MyBookings);
        assert!(!parsed.is_number);

        let parsed = parse_message(" 3 ");
        assert!(parsed.is_number);
        assert_eq!(parsed.number, Some(3));

        assert!(parse_message("   ").is_empty);
    }

    #[test]
    fn test_extract_search_keywords() {
        assert_eq!(extract_search_keywords("search mumbai concerts"), "mumbai concerts");
        assert_eq!(extract_search_keywords("LOOK FOR jazz"), "jazz");
        assert_eq!(extract_search_keywords("find"), "");
        assert_eq!(extract_search_keywords("search"), "");
        assert_eq!(extract_search_keywords("majestic"), "majestic");
    }

    #[test]
    fn test_selection_and_quantity_bounds() {
        assert_eq!(parse_selection("2", 3), Some(2));
        assert_eq!(parse_selection("0", 3), None);
        assert_eq!(parse_selection("4", 3), None);
        assert_eq!(parse_selection("two", 3), None);

        assert_eq!(parse_quantity("10", 10), Some(10));
        assert_eq!(parse_quantity("11", 10), None);
        assert_eq!(parse_quantity("0", 10), None);
        assert_eq!(parse_quantity("3 tickets", 10), Some(3));
        assert_eq!(parse_quantity("99999999999", 10), None);
    }

    #[test]
    fn test_user_names() {
        assert_eq!(parse_user_name("  Priya   Sharma "), Some("Priya Sharma".to_string()));
        assert_eq!(parse_user_name("D'Souza"), Some("D'Souza".to_string()));
        assert!(parse_user_name("A").is_none());
        assert!(parse_user_name("R2D2").is_none());
        assert!(parse_user_name(&"a".repeat(51)).is_none());
        assert!(parse_user_name("-Dash").is_none());
    }

    #[test]
    fn test_booking_ref_and_confirmation() {
        assert_eq!(
            extract_booking_ref("status of bkg-57rf1a please").map(String::from),
            Some("BKG-57RF1A".to_string())
        );
        assert!(extract_booking_ref("BKG-57R").is_none());

        assert_eq!(parse_confirmation("YES"), Some(true));
        assert_eq!(parse_confirmation(" ok "), Some(true));
        assert_eq!(parse_confirmation("abort"), Some(false));
        assert_eq!(parse_confirmation("maybe"), None);
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("whatsapp:+91 98765-43210"), "919876543210");
        assert_eq!(normalize_phone("919876543210"), "919876543210");
    }
}
