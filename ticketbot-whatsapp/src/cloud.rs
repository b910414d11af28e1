use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use ticketbot_core::messaging::{DeliveryReceipt, MessageTransport, TransportError};
use ticketbot_shared::pii::mask;

use crate::check_status;

const GRAPH_API: &str = "https://graph.facebook.com";

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    messages: Vec<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    id: String,
}

/// Meta's WhatsApp Business Cloud API.
#[derive(Debug, Clone)]
pub struct CloudApiTransport {
    client: Client,
    api_base: String,
    api_version: String,
    phone_number_id: String,
    access_token: String,
}

impl CloudApiTransport {
    pub fn new(access_token: String, phone_number_id: String, api_version: String) -> Self {
        Self {
            client: Client::new(),
            api_base: GRAPH_API.to_string(),
            api_version,
            phone_number_id,
            access_token,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    async fn post(&self, to: &str, payload: Value) -> Result<DeliveryReceipt, TransportError> {
        let url = format!(
            "{}/{}/{}/messages",
            self.api_base, self.api_version, self.phone_number_id
        );
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;
        let sent: SendResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;

        let message_id = sent.messages.into_iter().next().map(|m| m.id);
        info!(to = %mask(to), message_id = ?message_id, "Message sent via Cloud API");
        Ok(DeliveryReceipt { message_id })
    }
}

fn recipient(to: &str) -> String {
    to.chars().filter(char::is_ascii_digit).collect()
}

#[async_trait]
impl MessageTransport for CloudApiTransport {
    async fn send_text(&self, to: &str, body: &str) -> Result<DeliveryReceipt, TransportError> {
        let payload = json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": recipient(to),
            "type": "text",
            "text": { "preview_url": false, "body": body }
        });
        self.post(to, payload).await
    }

    async fn send_media(
        &self,
        to: &str,
        media_url: &str,
        caption: &str,
    ) -> Result<DeliveryReceipt, TransportError> {
        let payload = json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": recipient(to),
            "type": "image",
            "image": { "link": media_url, "caption": caption }
        });
        self.post(to, payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_send_media_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v18.0/1055/messages"))
            .and(header("authorization", "Bearer token-1"))
            .and(body_partial_json(json!({
                "to": "919876543210",
                "type": "image",
                "image": { "link": "https://qr.test/a.png", "caption": "QR Code for BKG-57RF1A" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "messaging_product": "whatsapp",
                "messages": [{ "id": "wamid.abc" }]
            })))
            .mount(&server)
            .await;

        let transport = CloudApiTransport::new("token-1".into(), "1055".into(), "v18.0".into())
            .with_api_base(server.uri());
        let receipt = transport
            .send_media("+91 98765 43210", "https://qr.test/a.png", "QR Code for BKG-57RF1A")
            .await
            .unwrap();

        assert_eq!(receipt.message_id.as_deref(), Some("wamid.abc"));
    }

    #[tokio::test]
    async fn test_unauthorized_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
            .mount(&server)
            .await;

        let transport = CloudApiTransport::new("bad".into(), "1055".into(), "v18.0".into())
            .with_api_base(server.uri());
        let err = transport.send_text("919876543210", "hi").await.unwrap_err();

        assert!(matches!(err, TransportError::Rejected { status: 401, .. }));
    }
}
