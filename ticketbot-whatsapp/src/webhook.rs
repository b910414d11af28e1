use serde::Deserialize;

/// A user message received from either provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Sender number without the `whatsapp:` prefix.
    pub phone: String,
    pub body: String,
    pub message_id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("Malformed form payload: {0}")]
    Form(#[from] serde_urlencoded::de::Error),
    #[error("Malformed JSON payload: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct TwilioForm {
    #[serde(rename = "From", default)]
    from: String,
    #[serde(rename = "Body", default)]
    body: String,
    #[serde(rename = "MessageSid")]
    message_sid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CloudWebhook {
    #[serde(default)]
    entry: Vec<CloudEntry>,
}

#[derive(Debug, Deserialize)]
struct CloudEntry {
    #[serde(default)]
    changes: Vec<CloudChange>,
}

#[derive(Debug, Deserialize)]
struct CloudChange {
    value: CloudValue,
}

#[derive(Debug, Deserialize)]
struct CloudValue {
    // Status callbacks arrive without messages.
    #[serde(default)]
    messages: Vec<CloudMessage>,
}

#[derive(Debug, Deserialize)]
struct CloudMessage {
    from: String,
    id: Option<String>,
    text: Option<CloudText>,
}

#[derive(Debug, Deserialize)]
struct CloudText {
    body: String,
}

impl From<TwilioForm> for InboundMessage {
    fn from(form: TwilioForm) -> Self {
        Self {
            phone: form.from.trim_start_matches("whatsapp:").to_string(),
            body: form.body,
            message_id: form.message_sid.filter(|s| !s.is_empty()),
        }
    }
}

impl CloudWebhook {
    fn into_message(self) -> Option<InboundMessage> {
        let message = self
            .entry
            .into_iter()
            .next()?
            .changes
            .into_iter()
            .next()?
            .value
            .messages
            .into_iter()
            .next()?;
        Some(InboundMessage {
            phone: message.from,
            body: message.text.map(|t| t.body).unwrap_or_default(),
            message_id: message.id,
        })
    }
}

/// Decodes a webhook body: JSON is the Cloud API format, anything else a Twilio form.
///
/// `Ok(None)` means the payload carried no user message (delivery statuses and
/// similar) or had no sender.
pub fn parse_inbound(content_type: Option<&str>, body: &[u8]) -> Result<Option<InboundMessage>, WebhookError> {
    let is_json = content_type.is_some_and(|ct| ct.starts_with("application/json"));
    let message = if is_json {
        serde_json::from_slice::<CloudWebhook>(body)?.into_message()
    } else {
        Some(serde_urlencoded::from_bytes::<TwilioForm>(body)?.into())
    };
    Ok(message.filter(|m| !m.phone.is_empty()))
}

/// Query of the Cloud API subscription handshake (`GET /webhook`).
#[derive(Debug, Default, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

impl VerifyQuery {
    /// The challenge to echo back, if the request is a subscribe with the expected token.
    pub fn accept(self, expected_token: Option<&str>) -> Option<String> {
        let expected = expected_token?;
        if self.mode.as_deref() == Some("subscribe") && self.verify_token.as_deref() == Some(expected) {
            return self.challenge;
        }
        None
    }
}
