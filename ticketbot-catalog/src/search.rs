use std::sync::Arc;
use tracing::debug;

use ticketbot_core::repository::EventRepository;
use ticketbot_core::StoreError;
use ticketbot_shared::Event;

/// Keyword search over bookable events.
#[derive(Clone)]
pub struct EventSearch {
    events: Arc<dyn EventRepository>,
    max_results: usize,
}

impl EventSearch {
    pub fn new(events: Arc<dyn EventRepository>, max_results: usize) -> Self {
        Self {
            events,
            max_results: max_results.max(1),
        }
    }

    pub async fn search(&self, keywords: &str) -> Result<Vec<Event>, StoreError> {
        let keywords = keywords.trim();
        if keywords.is_empty() {
            return Ok(Vec::new());
        }
        let results = self.events.search_events(keywords, self.max_results).await?;
        debug!(keywords, hits = results.len(), "Event search");
        Ok(results)
    }
}
