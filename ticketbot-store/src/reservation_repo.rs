use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::info;

use ticketbot_core::repository::ReservationRepository;
use ticketbot_core::{HoldError, StoreError, StoreResult};
use ticketbot_shared::pii::mask;
use ticketbot_shared::{
    ActiveHold, EventId, EventSnapshot, HoldRequest, Reservation, ReservationId, ReservationStatus,
    SeatAdjustment,
};

use crate::ledger;

pub struct PgReservationRepository {
    pool: PgPool,
}

impl PgReservationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Moves a reservation in status `from` to `expired` and gives its seats
    /// back. With `due_at`, only holds whose deadline has passed are touched.
    async fn release_where(
        &self,
        id: ReservationId,
        from: ReservationStatus,
        due_at: Option<DateTime<Utc>>,
    ) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await.map_err(StoreError::backend)?;

        let released: Option<(i64, i32)> = sqlx::query_as(
            "UPDATE reservations SET status = 'expired'
             WHERE id = $1 AND status = $2
               AND ($3::timestamptz IS NULL OR expires_at <= $3)
             RETURNING event_id, quantity",
        )
        .bind(id)
        .bind(from.as_str())
        .bind(due_at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(StoreError::backend)?;

        let Some((event_id, quantity)) = released else {
            return Ok(false);
        };

        ledger::adjust_seats(&mut *tx, event_id, quantity, SeatAdjustment::Increase)
            .await
            .map_err(StoreError::backend)?;
        tx.commit().await.map_err(StoreError::backend)?;
        Ok(true)
    }
}

/// Event rows a hold touches, ascending and without repeats. Every writer
/// locks events in this order.
fn lock_order(previous: impl IntoIterator<Item = EventId>, target: EventId) -> Vec<EventId> {
    let mut ids: Vec<EventId> = previous.into_iter().collect();
    ids.push(target);
    ids.sort_unstable();
    ids.dedup();
    ids
}

#[derive(sqlx::FromRow)]
struct ReservationRow {
    id: i64,
    event_id: i64,
    phone: String,
    quantity: i32,
    status: String,
    reserved_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl TryFrom<ReservationRow> for Reservation {
    type Error = StoreError;

    fn try_from(row: ReservationRow) -> Result<Self, Self::Error> {
        Ok(Reservation {
            id: row.id,
            event_id: row.event_id,
            phone: row.phone,
            quantity: row.quantity,
            status: row.status.parse().map_err(StoreError::Corrupt)?,
            reserved_at: row.reserved_at,
            expires_at: row.expires_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ActiveHoldRow {
    #[sqlx(flatten)]
    reservation: ReservationRow,
    title: String,
    city: String,
    venue: String,
    event_date: DateTime<Utc>,
    price: i64,
}

#[async_trait]
impl ReservationRepository for PgReservationRepository {
    async fn create_hold(&self, request: &HoldRequest) -> Result<ReservationId, HoldError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::backend)?;

        // 1. Lock the phone's active hold, then every event row this touches in id order
        let previous: Vec<(i64,)> = sqlx::query_as(
            "SELECT event_id FROM reservations
             WHERE phone = $1 AND status = 'active'
             FOR UPDATE",
        )
        .bind(&request.phone)
        .fetch_all(&mut *tx)
        .await
        .map_err(StoreError::backend)?;

        let event_ids = lock_order(previous.into_iter().map(|(id,)| id), request.event_id);

        let locked: Vec<(i64, bool)> = sqlx::query_as(
            "SELECT id, is_active FROM events
             WHERE id = ANY($1)
             ORDER BY id
             FOR UPDATE",
        )
        .bind(&event_ids)
        .fetch_all(&mut *tx)
        .await
        .map_err(StoreError::backend)?;
        if !locked.iter().any(|&(id, active)| id == request.event_id && active) {
            return Err(HoldError::EventNotFound(request.event_id));
        }

        // 2. Supersede the phone's previous hold and give its seats back
        let superseded: Vec<(i64, i64, i32)> = sqlx::query_as(
            "UPDATE reservations SET status = 'expired'
             WHERE phone = $1 AND status = 'active'
             RETURNING id, event_id, quantity",
        )
        .bind(&request.phone)
        .fetch_all(&mut *tx)
        .await
        .map_err(StoreError::backend)?;

        for (old_id, event_id, quantity) in superseded {
            ledger::adjust_seats(&mut *tx, event_id, quantity, SeatAdjustment::Increase)
                .await
                .map_err(StoreError::backend)?;
            info!(reservation_id = old_id, phone = %mask(&request.phone), "Superseded active hold");
        }

        // 3. Withhold the seats
        let (available,): (i32,) =
            sqlx::query_as("SELECT available_seats FROM events WHERE id = $1")
                .bind(request.event_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(StoreError::backend)?;
        if available < request.quantity {
            return Err(HoldError::InsufficientSeats {
                requested: request.quantity,
                available,
            });
        }
        let withheld = ledger::adjust_seats(
            &mut *tx,
            request.event_id,
            request.quantity,
            SeatAdjustment::Decrease,
        )
        .await
        .map_err(StoreError::backend)?;
        if !withheld {
            return Err(HoldError::ReservationFailed);
        }

        // 4. Record the hold
        let inserted: Result<(i64,), sqlx::Error> = sqlx::query_as(
            "INSERT INTO reservations (event_id, phone, quantity, status, reserved_at, expires_at)
             VALUES ($1, $2, $3, 'active', $4, $5)
             RETURNING id",
        )
        .bind(request.event_id)
        .bind(&request.phone)
        .bind(request.quantity)
        .bind(request.reserved_at)
        .bind(request.expires_at)
        .fetch_one(&mut *tx)
        .await;

        let (id,) = match inserted {
            Ok(row) => row,
            // A concurrent request for the same phone won the one-active-hold index.
            Err(e) if ledger::is_unique_violation(&e) => return Err(HoldError::ReservationFailed),
            Err(e) => return Err(StoreError::backend(e).into()),
        };

        tx.commit().await.map_err(StoreError::backend)?;
        Ok(id)
    }

    async fn get_reservation(&self, id: ReservationId) -> StoreResult<Option<Reservation>> {
        let row: Option<ReservationRow> = sqlx::query_as(
            "SELECT id, event_id, phone, quantity, status, reserved_at, expires_at
             FROM reservations WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;
        row.map(Reservation::try_from).transpose()
    }

    async fn find_active_hold(
        &self,
        phone: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<ActiveHold>> {
        let row: Option<ActiveHoldRow> = sqlx::query_as(
            "SELECT r.id, r.event_id, r.phone, r.quantity, r.status, r.reserved_at, r.expires_at,
                    e.title, e.city, e.venue, e.event_date, e.price
             FROM reservations r
             JOIN events e ON e.id = r.event_id
             WHERE r.phone = $1 AND r.status = 'active' AND r.expires_at > $2
             ORDER BY r.reserved_at DESC
             LIMIT 1",
        )
        .bind(phone)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let event = EventSnapshot {
            id: row.reservation.event_id,
            title: row.title,
            city: row.city,
            venue: row.venue,
            event_date: row.event_date,
            price: row.price,
        };
        Ok(Some(ActiveHold {
            reservation: row.reservation.try_into()?,
            event,
        }))
    }

    async fn confirm_reservation(&self, id: ReservationId) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE reservations SET status = 'confirmed' WHERE id = $1 AND status = 'active'",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::backend)?;
        Ok(result.rows_affected() == 1)
    }

    async fn release_reservation(&self, id: ReservationId) -> StoreResult<bool> {
        self.release_where(id, ReservationStatus::Active, None).await
    }

    async fn revert_confirmation(&self, id: ReservationId) -> StoreResult<bool> {
        self.release_where(id, ReservationStatus::Confirmed, None).await
    }

    async fn expire_reservation(&self, id: ReservationId, now: DateTime<Utc>) -> StoreResult<bool> {
        self.release_where(id, ReservationStatus::Active, Some(now)).await
    }

    async fn find_expired(&self, now: DateTime<Utc>) -> StoreResult<Vec<ReservationId>> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            "SELECT id FROM reservations
             WHERE status = 'active' AND expires_at <= $1
             ORDER BY expires_at ASC",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_order_is_ascending_and_unique() {
        assert_eq!(lock_order([9], 4), vec![4, 9]);
        assert_eq!(lock_order([4], 9), vec![4, 9]);
        assert_eq!(lock_order([7], 7), vec![7]);
        assert_eq!(lock_order(Vec::<EventId>::new(), 3), vec![3]);
    }
}
