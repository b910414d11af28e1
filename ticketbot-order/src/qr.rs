use async_trait::async_trait;
use url::Url;

use ticketbot_core::ticket::{RenderError, RenderedTicket, TicketRenderer};
use ticketbot_shared::{BookingRef, QrPayload};

/// Points tickets at `{public_base_url}/qr/{booking}.png`; the API answers
/// that path by redirecting to an external QR image service.
#[derive(Debug, Clone)]
pub struct HostedQrRenderer {
    public_base_url: Url,
    qr_service_url: Url,
    size: u32,
}

impl HostedQrRenderer {
    pub fn new(public_base_url: &str, qr_service_url: &str, size: u32) -> Result<Self, RenderError> {
        let public_base_url =
            Url::parse(public_base_url).map_err(|e| RenderError::Publish(e.to_string()))?;
        let qr_service_url =
            Url::parse(qr_service_url).map_err(|e| RenderError::Publish(e.to_string()))?;
        Ok(Self {
            public_base_url,
            qr_service_url,
            size,
        })
    }

    /// Public URL under which the ticket image is served.
    pub fn ticket_url(&self, booking_ref: &BookingRef) -> Result<String, RenderError> {
        let path = format!(
            "{}/qr/{}.png",
            self.public_base_url.path().trim_end_matches('/'),
            booking_ref
        );
        let mut url = self.public_base_url.clone();
        url.set_path(&path);
        Ok(url.to_string())
    }

    /// Image URL at the QR service. Only the booking reference leaves the
    /// bot; the full ticket payload stays in the booking record.
    pub fn image_url(&self, booking_ref: &BookingRef) -> String {
        let mut url = self.qr_service_url.clone();
        url.query_pairs_mut()
            .append_pair("size", &format!("{0}x{0}", self.size))
            .append_pair("format", "png")
            .append_pair("data", booking_ref.as_str());
        url.to_string()
    }
}

#[async_trait]
impl TicketRenderer for HostedQrRenderer {
    async fn render(&self, payload: &QrPayload) -> Result<RenderedTicket, RenderError> {
        let booking_ref = BookingRef::parse(&payload.booking_id)
            .ok_or_else(|| RenderError::Encode(format!("bad booking id {}", payload.booking_id)))?;
        Ok(RenderedTicket {
            url: Some(self.ticket_url(&booking_ref)?),
            image_png: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_url_respects_base_path() {
        let renderer =
            HostedQrRenderer::new("https://bot.example.com/tickets/", "https://qr.example.com/v1/", 300)
                .unwrap();
        let r = BookingRef::parse("BKG-A1B2C3").unwrap();
        assert_eq!(
            renderer.ticket_url(&r).unwrap(),
            "https://bot.example.com/tickets/qr/BKG-A1B2C3.png"
        );
    }

    #[test]
    fn test_image_url_carries_only_the_reference() {
        let renderer =
            HostedQrRenderer::new("https://bot.example.com", "https://qr.example.com/v1/create", 250)
                .unwrap();
        let r = BookingRef::parse("BKG-A1B2C3").unwrap();
        assert_eq!(
            renderer.image_url(&r),
            "https://qr.example.com/v1/create?size=250x250&format=png&data=BKG-A1B2C3"
        );
    }
}
