use async_trait::async_trait;
use ticketbot_shared::QrPayload;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedTicket {
    /// Where the QR image can be fetched by the messaging provider.
    pub url: Option<String>,
    pub image_png: Option<Vec<u8>>,
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Failed to encode QR payload: {0}")]
    Encode(String),
    #[error("Failed to publish ticket image: {0}")]
    Publish(String),
}

/// Turns a QR payload into something the user can be sent.
#[async_trait]
pub trait TicketRenderer: Send + Sync {
    async fn render(&self, payload: &QrPayload) -> Result<RenderedTicket, RenderError>;
}
