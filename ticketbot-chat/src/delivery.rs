use tracing::{debug, warn};

use ticketbot_core::messaging::{MessageTransport, Outbound};
use ticketbot_shared::pii::mask;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub sent: usize,
    pub failed: usize,
}

/// Sends replies in order. A failed message is logged and the rest still go out.
pub async fn deliver(transport: &dyn MessageTransport, to: &str, messages: &[Outbound]) -> DeliveryReport {
    let mut report = DeliveryReport::default();
    for message in messages {
        let result = match message {
            Outbound::Text(body) => transport.send_text(to, body).await,
            Outbound::Media { url, caption } => transport.send_media(to, url, caption).await,
        };
        match result {
            Ok(receipt) => {
                debug!(to = %mask(to), message_id = ?receipt.message_id, "Message sent");
                report.sent += 1;
            }
            Err(e) => {
                warn!(to = %mask(to), error = %e, "Message delivery failed");
                report.failed += 1;
            }
        }
    }
    report
}
