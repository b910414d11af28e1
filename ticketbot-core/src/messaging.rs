use async_trait::async_trait;

/// One reply produced by the conversation router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    Media { url: String, caption: String },
}

impl Outbound {
    pub fn text(body: impl Into<String>) -> Self {
        Outbound::Text(body.into())
    }

    /// The text a user would read, for logging and tests.
    pub fn body(&self) -> &str {
        match self {
            Outbound::Text(body) => body,
            Outbound::Media { caption, .. } => caption,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub message_id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("Provider rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Outbound side of the chat channel.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    async fn send_text(&self, to: &str, body: &str) -> Result<DeliveryReceipt, TransportError>;

    async fn send_media(
        &self,
        to: &str,
        media_url: &str,
        caption: &str,
    ) -> Result<DeliveryReceipt, TransportError>;
}
