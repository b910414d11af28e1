use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use ticketbot_core::repository::BookingRepository;
use ticketbot_core::{StoreError, StoreResult};
use ticketbot_shared::{
    Booking, BookingDetails, BookingId, BookingRef, EventSnapshot, NewBooking, SeatAdjustment,
};

use crate::ledger;

pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BookingDetailsRow {
    id: i64,
    booking_id: String,
    event_id: i64,
    phone: String,
    user_name: String,
    quantity: i32,
    total_price: i64,
    status: String,
    qr_code_data: Option<String>,
    qr_code_url: Option<String>,
    created_at: DateTime<Utc>,
    title: String,
    city: String,
    venue: String,
    event_date: DateTime<Utc>,
    price: i64,
}

impl TryFrom<BookingDetailsRow> for BookingDetails {
    type Error = StoreError;

    fn try_from(row: BookingDetailsRow) -> Result<Self, Self::Error> {
        let booking_ref = BookingRef::parse(&row.booking_id)
            .ok_or_else(|| StoreError::Corrupt(format!("bad booking id {}", row.booking_id)))?;
        Ok(BookingDetails {
            booking: Booking {
                id: row.id,
                booking_ref,
                event_id: row.event_id,
                phone: row.phone,
                user_name: row.user_name,
                quantity: row.quantity,
                total_price: row.total_price,
                status: row.status.parse().map_err(StoreError::Corrupt)?,
                qr_code_data: row.qr_code_data,
                qr_code_url: row.qr_code_url,
                created_at: row.created_at,
            },
            event: EventSnapshot {
                id: row.event_id,
                title: row.title,
                city: row.city,
                venue: row.venue,
                event_date: row.event_date,
                price: row.price,
            },
        })
    }
}

const DETAILS_QUERY: &str =
    "SELECT b.id, b.booking_id, b.event_id, b.phone, b.user_name, b.quantity, b.total_price,
            b.status, b.qr_code_data, b.qr_code_url, b.created_at,
            e.title, e.city, e.venue, e.event_date, e.price
     FROM bookings b
     JOIN events e ON e.id = b.event_id";

/// Inserts a confirmed booking on an existing connection or transaction.
pub(crate) async fn insert_booking(
    conn: &mut PgConnection,
    booking: &NewBooking,
) -> StoreResult<BookingId> {
    let inserted: Result<(i64,), sqlx::Error> = sqlx::query_as(
        "INSERT INTO bookings
            (booking_id, event_id, phone, user_name, quantity, total_price, status,
             qr_code_data, qr_code_url, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, 'confirmed', $7, $8, $9)
         RETURNING id",
    )
    .bind(booking.booking_ref.as_str())
    .bind(booking.event_id)
    .bind(&booking.phone)
    .bind(&booking.user_name)
    .bind(booking.quantity)
    .bind(booking.total_price)
    .bind(&booking.qr_code_data)
    .bind(&booking.qr_code_url)
    .bind(booking.created_at)
    .fetch_one(conn)
    .await;

    match inserted {
        Ok((id,)) => Ok(id),
        Err(e) if ledger::is_unique_violation(&e) => Err(StoreError::DuplicateBookingRef(
            booking.booking_ref.to_string(),
        )),
        Err(e) => Err(StoreError::backend(e)),
    }
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn insert_booking(&self, booking: &NewBooking) -> StoreResult<BookingId> {
        let mut conn = self.pool.acquire().await.map_err(StoreError::backend)?;
        insert_booking(&mut *conn, booking).await
    }

    async fn find_booking(&self, booking_ref: &BookingRef) -> StoreResult<Option<BookingDetails>> {
        let row: Option<BookingDetailsRow> =
            sqlx::query_as(&format!("{DETAILS_QUERY} WHERE b.booking_id = $1"))
                .bind(booking_ref.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(StoreError::backend)?;
        row.map(BookingDetails::try_from).transpose()
    }

    async fn list_bookings_for_phone(&self, phone: &str) -> StoreResult<Vec<BookingDetails>> {
        let rows: Vec<BookingDetailsRow> = sqlx::query_as(&format!(
            "{DETAILS_QUERY} WHERE b.phone = $1 AND b.status = 'confirmed'
             ORDER BY b.created_at DESC, b.id DESC"
        ))
        .bind(phone)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;
        rows.into_iter().map(BookingDetails::try_from).collect()
    }

    async fn cancel_booking(&self, booking_ref: &BookingRef) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await.map_err(StoreError::backend)?;

        let cancelled: Option<(i64, i32)> = sqlx::query_as(
            "UPDATE bookings SET status = 'cancelled'
             WHERE booking_id = $1 AND status = 'confirmed'
             RETURNING event_id, quantity",
        )
        .bind(booking_ref.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(StoreError::backend)?;

        let Some((event_id, quantity)) = cancelled else {
            return Ok(false);
        };
        ledger::adjust_seats(&mut *tx, event_id, quantity, SeatAdjustment::Increase)
            .await
            .map_err(StoreError::backend)?;
        tx.commit().await.map_err(StoreError::backend)?;
        Ok(true)
    }
}
