use async_trait::async_trait;
use tracing::info;

use ticketbot_core::messaging::{DeliveryReceipt, MessageTransport, TransportError};
use ticketbot_shared::pii::mask;

/// Writes outbound messages to the log instead of sending them. For local runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTransport;

#[async_trait]
impl MessageTransport for LogTransport {
    async fn send_text(&self, to: &str, body: &str) -> Result<DeliveryReceipt, TransportError> {
        info!(to = %mask(to), body, "Outbound text");
        Ok(DeliveryReceipt { message_id: None })
    }

    async fn send_media(
        &self,
        to: &str,
        media_url: &str,
        caption: &str,
    ) -> Result<DeliveryReceipt, TransportError> {
        info!(to = %mask(to), media_url, caption, "Outbound media");
        Ok(DeliveryReceipt { message_id: None })
    }
}
