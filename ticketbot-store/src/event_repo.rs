use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use ticketbot_core::repository::EventRepository;
use ticketbot_core::{StoreError, StoreResult};
use ticketbot_shared::{Event, EventId, NewEvent, SeatAdjustment};

use crate::ledger;

pub struct PgEventRepository {
    pool: PgPool,
}

impl PgEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct EventRow {
    id: i64,
    title: String,
    description: Option<String>,
    city: String,
    venue: String,
    event_date: DateTime<Utc>,
    total_seats: i32,
    available_seats: i32,
    price: i64,
    is_active: bool,
}

impl From<EventRow> for Event {
    fn from(row: EventRow) -> Self {
        Event {
            id: row.id,
            title: row.title,
            description: row.description,
            city: row.city,
            venue: row.venue,
            event_date: row.event_date,
            total_seats: row.total_seats,
            available_seats: row.available_seats,
            price: row.price,
            is_active: row.is_active,
        }
    }
}

const EVENT_COLUMNS: &str =
    "id, title, description, city, venue, event_date, total_seats, available_seats, price, is_active";

/// Escapes LIKE wildcards so user input only ever matches literally.
fn like_pattern(keywords: &str) -> String {
    let escaped = keywords
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[async_trait]
impl EventRepository for PgEventRepository {
    async fn create_event(&self, event: &NewEvent) -> StoreResult<EventId> {
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO events (title, description, city, venue, event_date, total_seats, available_seats, price)
             VALUES ($1, $2, $3, $4, $5, $6, $6, $7)
             RETURNING id",
        )
        .bind(&event.title)
        .bind(&event.description)
        .bind(&event.city)
        .bind(&event.venue)
        .bind(event.event_date)
        .bind(event.total_seats)
        .bind(event.price)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::backend)?;
        Ok(id)
    }

    async fn get_event(&self, id: EventId) -> StoreResult<Option<Event>> {
        let row: Option<EventRow> =
            sqlx::query_as(&format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(StoreError::backend)?;
        Ok(row.map(Event::from))
    }

    async fn search_events(&self, keywords: &str, limit: usize) -> StoreResult<Vec<Event>> {
        let rows: Vec<EventRow> = sqlx::query_as(&format!(
            "SELECT {EVENT_COLUMNS} FROM events
             WHERE is_active AND available_seats > 0
               AND (title ILIKE $1 OR city ILIKE $1 OR venue ILIKE $1 OR description ILIKE $1)
             ORDER BY event_date ASC, id ASC
             LIMIT $2"
        ))
        .bind(like_pattern(keywords))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;
        Ok(rows.into_iter().map(Event::from).collect())
    }

    async fn adjust_seats(
        &self,
        id: EventId,
        quantity: i32,
        adjustment: SeatAdjustment,
    ) -> StoreResult<bool> {
        let mut conn = self.pool.acquire().await.map_err(StoreError::backend)?;
        ledger::adjust_seats(&mut *conn, id, quantity, adjustment)
            .await
            .map_err(StoreError::backend)
    }
}

#[cfg(test)]
mod tests {
    use super::like_pattern;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("jazz"), "%jazz%");
        assert_eq!(like_pattern("100%_fun"), "%100\\%\\_fun%");
    }
}
