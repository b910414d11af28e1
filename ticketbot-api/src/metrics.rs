use prometheus::{Encoder, IntCounter, Registry, TextEncoder};

/// Process-wide counters exposed on `GET /metrics`.
pub struct Metrics {
    registry: Registry,
    pub inbound_messages: IntCounter,
    pub rate_limited: IntCounter,
    pub delivery_failures: IntCounter,
    pub holds_released: IntCounter,
    pub sessions_swept: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let counter = |name: &str, help: &str| -> Result<IntCounter, prometheus::Error> {
            let c = IntCounter::new(name, help)?;
            registry.register(Box::new(c.clone()))?;
            Ok(c)
        };

        Ok(Self {
            inbound_messages: counter("ticketbot_inbound_messages_total", "Inbound chat messages routed")?,
            rate_limited: counter("ticketbot_rate_limited_total", "Inbound messages dropped by the rate limit")?,
            delivery_failures: counter("ticketbot_delivery_failures_total", "Outbound messages the transport rejected")?,
            holds_released: counter("ticketbot_holds_released_total", "Expired seat holds released by the sweep")?,
            sessions_swept: counter("ticketbot_sessions_swept_total", "Idle sessions deleted by the sweep")?,
            registry,
        })
    }

    /// Prometheus text exposition of every registered counter.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
