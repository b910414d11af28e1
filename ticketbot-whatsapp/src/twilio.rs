use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::info;

use ticketbot_core::messaging::{DeliveryReceipt, MessageTransport, TransportError};
use ticketbot_shared::pii::mask;

use crate::check_status;

const TWILIO_API: &str = "https://api.twilio.com";

#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: Option<String>,
}

/// Twilio Programmable Messaging over the WhatsApp channel.
#[derive(Debug, Clone)]
pub struct TwilioTransport {
    client: Client,
    api_base: String,
    account_sid: String,
    auth_token: String,
    from: String,
}

/// `whatsapp:+<digits>`, accepting numbers with or without the prefix.
fn whatsapp_address(number: &str) -> String {
    if number.starts_with("whatsapp:") {
        return number.to_string();
    }
    let digits = number.trim().trim_start_matches('+');
    format!("whatsapp:+{digits}")
}

impl TwilioTransport {
    pub fn new(account_sid: String, auth_token: String, from_number: &str) -> Self {
        Self {
            client: Client::new(),
            api_base: TWILIO_API.to_string(),
            account_sid,
            auth_token,
            from: whatsapp_address(from_number),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    async fn create_message(&self, to: &str, fields: &[(&str, &str)]) -> Result<DeliveryReceipt, TransportError> {
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base, self.account_sid
        );
        let to_address = whatsapp_address(to);
        let mut form: Vec<(&str, &str)> = vec![("From", self.from.as_str()), ("To", to_address.as_str())];
        form.extend_from_slice(fields);

        let response = self
            .client
            .post(url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;
        let resource: MessageResource = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;

        info!(to = %mask(to), sid = ?resource.sid, "Message sent via Twilio");
        Ok(DeliveryReceipt {
            message_id: resource.sid,
        })
    }
}

#[async_trait]
impl MessageTransport for TwilioTransport {
    async fn send_text(&self, to: &str, body: &str) -> Result<DeliveryReceipt, TransportError> {
        self.create_message(to, &[("Body", body)]).await
    }

    async fn send_media(
        &self,
        to: &str,
        media_url: &str,
        caption: &str,
    ) -> Result<DeliveryReceipt, TransportError> {
        self.create_message(to, &[("Body", caption), ("MediaUrl", media_url)])
            .await
    }
}
