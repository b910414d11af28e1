use chrono::{DateTime, FixedOffset, Offset, Utc};
use std::fmt::Write;

use ticketbot_catalog::{format_currency, line_total};
use ticketbot_order::{BalanceQuote, Receipt};
use ticketbot_shared::{ActiveHold, BookingDetails, BookingRef, BookingStatus, Event, Ticket};

const DIVIDER: &str = "━━━━━━━━━━━━━━━━";

/// Chat reply templates.
#[derive(Debug, Clone)]
pub struct Replies {
    offset: FixedOffset,
    max_tickets: i32,
}

impl Replies {
    pub fn new(utc_offset_minutes: i32, max_tickets: i32) -> Self {
        let offset = FixedOffset::east_opt(utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix());
        Self {
            offset,
            max_tickets,
        }
    }

    fn long_date(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.offset)
            .format("%-d %B %Y, %-I:%M %p")
            .to_string()
    }

    fn short_date(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.offset)
            .format("%-d %b, %-I:%M %p")
            .to_string()
    }

    pub fn welcome(&self) -> String {
        "👋 *Welcome to the ticket booking bot!*\n\n\
         Search for an event or train, pick seats and get a QR ticket right here.\n\n\
         Type *BOOK* to start, or *HELP* for all options."
            .to_string()
    }

    pub fn help(&self) -> String {
        "ℹ️ *What I can do*\n\n\
         • *book* to start a booking\n\
         • *search <keywords>* e.g. \"search mumbai\" or \"search majestic\"\n\
         • *my bookings* to list your tickets\n\
         • send a booking ID like *BKG-57RF1A* to see it again\n\
         • *cancel* to stop the current booking\n\
         • *help* to show this menu"
            .to_string()
    }

    pub fn cancelled(&self) -> String {
        "❌ Current booking cancelled. Any held seats were released.\n\n\
         Type *BOOK* to start again or *HELP* for options."
            .to_string()
    }

    pub fn session_expired(&self) -> String {
        "⏱️ Your session expired due to inactivity.\n\n\
         Type *BOOK* to start fresh or *HELP* for options."
            .to_string()
    }

    pub fn error(&self) -> String {
        "😕 Something went wrong on our side. Please try again, or type *HELP*.".to_string()
    }

    pub fn search_prompt(&self) -> String {
        "🔍 What are you looking for?\n\n\
         Send a city, venue, station or event name, e.g. \"mumbai\" or \"majestic\"."
            .to_string()
    }

    pub fn no_results(&self, keywords: &str) -> String {
        format!(
            "😕 Nothing found for \"{keywords}\".\n\n\
             Try a city, venue, station or event name, or type *HELP*."
        )
    }

    pub fn search_results(&self, keywords: &str, results: &[Event]) -> String {
        let mut msg = format!("🎫 *Results for \"{keywords}\"*\n\n");
        for (i, event) in results.iter().enumerate() {
            let _ = writeln!(msg, "*{}. {}*", i + 1, event.title);
            let _ = writeln!(msg, "📍 {}, {}", event.venue, event.city);
            let _ = writeln!(msg, "📅 {}", self.long_date(event.event_date));
            let _ = writeln!(msg, "💰 {} per ticket", format_currency(event.price));
            let _ = writeln!(msg, "🪑 {} seats left\n", event.available_seats);
        }
        let _ = write!(msg, "Reply with a number (1-{}) to choose.", results.len());
        msg
    }

    pub fn invalid_selection(&self, count: usize) -> String {
        format!(
            "❌ Invalid selection. Reply with a number between 1 and {count}, or *CANCEL* to start over."
        )
    }

    pub fn event_details(&self, event: &Event) -> String {
        let mut msg = format!("🎫 *{}*\n\n", event.title);
        if let Some(description) = &event.description {
            let _ = writeln!(msg, "{description}\n");
        }
        let _ = writeln!(msg, "📍 {}, {}", event.venue, event.city);
        let _ = writeln!(msg, "📅 {}", self.long_date(event.event_date));
        let _ = writeln!(msg, "💰 {} per ticket", format_currency(event.price));
        let _ = writeln!(msg, "🪑 {} seats left\n", event.available_seats);
        let _ = writeln!(msg, "{DIVIDER}\n");
        let _ = write!(msg, "How many tickets? Reply with a number (1-{}).", self.max_tickets);
        msg
    }

    pub fn invalid_quantity(&self) -> String {
        format!("❌ Please reply with a number of tickets between 1 and {}.", self.max_tickets)
    }

    pub fn insufficient_seats(&self, available: i32, requested: i32) -> String {
        if available <= 0 {
            return "😕 Sorry, this event just sold out. Type *BOOK* to search again.".to_string();
        }
        format!(
            "❌ Only {available} seat(s) left, you asked for {requested}.\n\nReply with a smaller number."
        )
    }

    pub fn event_not_found(&self) -> String {
        "❌ That event is no longer available. Type *BOOK* to search again.".to_string()
    }

    pub fn ask_name(&self, event: &Event, quantity: i32) -> String {
        format!(
            "✅ {quantity} ticket(s) for *{}*\n💰 Total: {}\n\nPlease reply with the name for the booking.",
            event.title,
            format_currency(line_total(event.price, quantity))
        )
    }

    pub fn invalid_name(&self) -> String {
        "❌ Please send a name of 2 to 50 letters (spaces, dots, apostrophes and hyphens allowed)."
            .to_string()
    }

    pub fn hold_summary(&self, user_name: &str, hold: &ActiveHold, minutes_left: i64) -> String {
        let mut msg = String::from("⏳ *Seats held for you*\n\n");
        let _ = writeln!(msg, "🎫 {}", hold.event.title);
        let _ = writeln!(msg, "📍 {}, {}", hold.event.venue, hold.event.city);
        let _ = writeln!(msg, "📅 {}", self.long_date(hold.event.event_date));
        let _ = writeln!(msg, "👤 {user_name}");
        let _ = writeln!(msg, "🪑 {} ticket(s)", hold.reservation.quantity);
        let _ = writeln!(msg, "💰 Total: {}\n", format_currency(hold.total_price()));
        let _ = writeln!(msg, "The hold expires in {minutes_left} minute(s).\n");
        msg.push_str("Reply *YES* to confirm or *NO* to release the seats.");
        msg
    }

    pub fn hold_failed(&self) -> String {
        "❌ We couldn't hold those seats, someone may have just taken them.\n\n\
         Type *BOOK* to try again."
            .to_string()
    }

    pub fn balance_summary(
        &self,
        user_name: &str,
        event: &Event,
        quantity: i32,
        quote: &BalanceQuote,
    ) -> String {
        let mut msg = String::from("💳 *Payment summary*\n\n");
        let _ = writeln!(msg, "🎫 {}", event.title);
        let _ = writeln!(msg, "📅 {}", self.long_date(event.event_date));
        let _ = writeln!(msg, "👤 {user_name}");
        let _ = writeln!(msg, "🪑 {quantity} ticket(s)");
        let _ = writeln!(msg, "💰 Total: {}\n", format_currency(quote.total));
        let _ = writeln!(msg, "Balance: {}", format_currency(quote.balance));
        if quote.is_sufficient() {
            let _ = writeln!(msg, "After payment: {}\n", format_currency(quote.balance_after()));
            msg.push_str("Reply *YES* to pay or *NO* to cancel.");
        } else {
            let _ = writeln!(msg, "Short by: {}\n", format_currency(quote.shortfall()));
            msg.push_str("Please top up your balance, then reply *YES*, or *NO* to cancel.");
        }
        msg
    }

    pub fn confirm_prompt(&self) -> String {
        "❓ Please reply *YES* to confirm or *NO* to cancel.".to_string()
    }

    pub fn hold_expired(&self) -> String {
        "⏱️ Your seat hold has expired and the seats were released.\n\n\
         Type *BOOK* to start again."
            .to_string()
    }

    pub fn insufficient_balance(&self, required: i64, balance: i64) -> String {
        format!(
            "❌ Insufficient balance: the booking costs {} and your balance is {}.\n\n\
             Please top up and type *BOOK* to try again.",
            format_currency(required),
            format_currency(balance)
        )
    }

    pub fn ticket_confirmation(&self, receipt: &Receipt) -> String {
        let ticket = &receipt.ticket;
        let mut msg = String::from("🎉 *Booking confirmed!*\n\n");
        let _ = writeln!(msg, "🆔 *{}*", ticket.booking_ref);
        self.write_ticket_body(&mut msg, ticket);
        if let Some(balance) = receipt.balance_after {
            let _ = writeln!(msg, "💳 Remaining balance: {}", format_currency(balance));
        }
        let _ = writeln!(msg, "\n{DIVIDER}\n");
        let _ = write!(
            msg,
            "Show the QR code at entry. Send *{}* any time to see this ticket again.",
            ticket.booking_ref
        );
        msg
    }

    fn write_ticket_body(&self, msg: &mut String, ticket: &Ticket) {
        let _ = writeln!(msg, "🎫 {}", ticket.event.title);
        let _ = writeln!(msg, "📍 {}, {}", ticket.event.venue, ticket.event.city);
        let _ = writeln!(msg, "📅 {}", self.long_date(ticket.event.event_date));
        let _ = writeln!(msg, "👤 {}", ticket.user_name);
        let _ = writeln!(msg, "🪑 {} ticket(s)", ticket.quantity);
        let _ = writeln!(msg, "💰 Paid: {}", format_currency(ticket.total_price));
    }

    pub fn qr_caption(&self, booking_ref: &BookingRef) -> String {
        format!("QR Code for {booking_ref}")
    }

    pub fn invalid_booking_ref(&self) -> String {
        "❌ Invalid booking ID format.\n\nExample: BKG-57RF1A".to_string()
    }

    pub fn booking_not_found(&self, booking_ref: &BookingRef) -> String {
        format!("❌ Booking {booking_ref} not found. Please check the ID and try again.")
    }

    pub fn booking_details(&self, details: &BookingDetails) -> String {
        let booking = &details.booking;
        let status = match booking.status {
            BookingStatus::Confirmed => "✅ Confirmed",
            BookingStatus::Cancelled => "🚫 Cancelled",
        };
        let mut msg = format!("🎫 *Booking {}*\n\n", booking.booking_ref);
        let _ = writeln!(msg, "{status}");
        let _ = writeln!(msg, "🎭 {}", details.event.title);
        let _ = writeln!(msg, "📍 {}, {}", details.event.venue, details.event.city);
        let _ = writeln!(msg, "📅 {}", self.long_date(details.event.event_date));
        let _ = writeln!(msg, "👤 {}", booking.user_name);
        let _ = writeln!(msg, "🪑 {} ticket(s)", booking.quantity);
        let _ = writeln!(msg, "💰 {}", format_currency(booking.total_price));
        let _ = write!(msg, "🕒 Booked {}", self.short_date(booking.created_at));
        msg
    }

    pub fn no_bookings(&self) -> String {
        "📭 You have no bookings yet.\n\nType *BOOK* to find something!".to_string()
    }

    pub fn bookings_list(&self, bookings: &[BookingDetails]) -> String {
        let mut msg = format!("📋 *Your bookings ({})*\n\n", bookings.len());
        for (i, details) in bookings.iter().enumerate() {
            let b = &details.booking;
            let _ = writeln!(msg, "{}. *{}*", i + 1, b.booking_ref);
            let _ = writeln!(msg, "   🎭 {}", details.event.title);
            let _ = writeln!(msg, "   📅 {}", self.short_date(details.event.event_date));
            let _ = writeln!(
                msg,
                "   🪑 {} ticket(s) • {}\n",
                b.quantity,
                format_currency(b.total_price)
            );
        }
        let _ = writeln!(msg, "{DIVIDER}\n");
        if let Some(first) = bookings.first() {
            let _ = write!(
                msg,
                "Send a booking ID to see its details, e.g. {}",
                first.booking.booking_ref
            );
        }
        msg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event() -> Event {
        Event {
            id: 1,
            title: "Metro: Majestic to Whitefield".into(),
            description: None,
            city: "Bangalore".into(),
            venue: "Majestic Metro Station".into(),
            event_date: Utc.with_ymd_and_hms(2026, 3, 1, 4, 30, 0).unwrap(),
            total_seats: 300,
            available_seats: 120,
            price: 6_000,
            is_active: true,
        }
    }

    #[test]
    fn test_dates_render_in_configured_offset() {
        let replies = Replies::new(330, 10);
        let text = replies.event_details(&event());
        assert!(text.contains("1 March 2026, 10:00 AM"), "{text}");
        assert!(text.contains("₹60.00 per ticket"));
        assert!(text.contains("(1-10)"));
    }

    #[test]
    fn test_balance_summary_shows_shortfall() {
        let replies = Replies::new(0, 10);
        let quote = BalanceQuote {
            balance: 5_000,
            total: 12_000,
        };
        let text = replies.balance_summary("Kiran", &event(), 2, &quote);
        assert!(text.contains("Short by: ₹70.00"), "{text}");
    }

    #[test]
    fn test_search_results_are_numbered() {
        let replies = Replies::new(0, 10);
        let text = replies.search_results("majestic", &[event(), event()]);
        assert!(text.contains("*1. Metro: Majestic to Whitefield*"));
        assert!(text.contains("*2. Metro: Majestic to Whitefield*"));
        assert!(text.ends_with("(1-2) to choose."));
    }
}
