use sqlx::PgConnection;
use tracing::warn;

use ticketbot_shared::{EventId, SeatAdjustment};

/// The only code path that writes `events.available_seats`.
///
/// Runs as one conditional statement so concurrent callers cannot push the
/// counter below zero or above capacity.
pub(crate) async fn adjust_seats(
    conn: &mut PgConnection,
    id: EventId,
    quantity: i32,
    adjustment: SeatAdjustment,
) -> Result<bool, sqlx::Error> {
    if quantity <= 0 {
        return Ok(false);
    }

    match adjustment {
        SeatAdjustment::Decrease => {
            let result = sqlx::query(
                "UPDATE events SET available_seats = available_seats - $2
                 WHERE id = $1 AND available_seats >= $2",
            )
            .bind(id)
            .bind(quantity)
            .execute(&mut *conn)
            .await?;
            Ok(result.rows_affected() == 1)
        }
        SeatAdjustment::Increase => {
            let capped: Option<(bool,)> = sqlx::query_as(
                "WITH prev AS (SELECT available_seats FROM events WHERE id = $1 FOR UPDATE)
                 UPDATE events e
                 SET available_seats = LEAST(e.total_seats, e.available_seats + $2)
                 FROM prev
                 WHERE e.id = $1
                 RETURNING prev.available_seats + $2 > e.total_seats",
            )
            .bind(id)
            .bind(quantity)
            .fetch_optional(&mut *conn)
            .await?;

            match capped {
                Some((true,)) => {
                    warn!(event_id = id, quantity, "Seat restore capped at capacity");
                    Ok(true)
                }
                Some((false,)) => Ok(true),
                None => Ok(false),
            }
        }
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}
