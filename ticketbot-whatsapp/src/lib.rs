pub mod cloud;
pub mod log;
pub mod twilio;
pub mod webhook;

pub use cloud::CloudApiTransport;
pub use log::LogTransport;
pub use twilio::TwilioTransport;
pub use webhook::{parse_inbound, InboundMessage, VerifyQuery, WebhookError};

use reqwest::Response;
use ticketbot_core::messaging::TransportError;

/// Maps a non-2xx provider response to `Rejected`, keeping the body for the logs.
pub(crate) async fn check_status(response: Response) -> Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(TransportError::Rejected {
        status: status.as_u16(),
        body,
    })
}
