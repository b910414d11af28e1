use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use ticketbot_core::repository::AccountRepository;
use ticketbot_core::{PurchaseError, StoreError, StoreResult};
use ticketbot_shared::{Account, BookingId, NewBooking, SeatAdjustment};

use crate::{booking_repo, ledger};

pub struct PgAccountRepository {
    pool: PgPool,
}

impl PgAccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct AccountRow {
    phone: String,
    holder_name: Option<String>,
    balance: i64,
    updated_at: DateTime<Utc>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Account {
            phone: row.phone,
            holder_name: row.holder_name,
            balance: row.balance,
            updated_at: row.updated_at,
        }
    }
}

async fn record_transaction(
    conn: &mut PgConnection,
    phone: &str,
    amount: i64,
    description: &str,
    booking_id: Option<&str>,
    at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO account_transactions (phone, amount, description, booking_id, created_at)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(phone)
    .bind(amount)
    .bind(description)
    .bind(booking_id)
    .bind(at)
    .execute(conn)
    .await?;
    Ok(())
}

#[async_trait]
impl AccountRepository for PgAccountRepository {
    async fn find_account(&self, phone: &str) -> StoreResult<Option<Account>> {
        let row: Option<AccountRow> = sqlx::query_as(
            "SELECT phone, holder_name, balance, updated_at FROM accounts WHERE phone = $1",
        )
        .bind(phone)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;
        Ok(row.map(Account::from))
    }

    async fn open_account(
        &self,
        phone: &str,
        opening_balance: i64,
        now: DateTime<Utc>,
    ) -> StoreResult<Account> {
        let mut tx = self.pool.begin().await.map_err(StoreError::backend)?;

        let opened: Option<AccountRow> = sqlx::query_as(
            "INSERT INTO accounts (phone, balance, updated_at) VALUES ($1, $2, $3)
             ON CONFLICT (phone) DO NOTHING
             RETURNING phone, holder_name, balance, updated_at",
        )
        .bind(phone)
        .bind(opening_balance)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await
        .map_err(StoreError::backend)?;

        let account = match opened {
            Some(row) => {
                if opening_balance != 0 {
                    record_transaction(&mut *tx, phone, opening_balance, "Opening balance", None, now)
                        .await
                        .map_err(StoreError::backend)?;
                }
                row
            }
            None => sqlx::query_as(
                "SELECT phone, holder_name, balance, updated_at FROM accounts WHERE phone = $1",
            )
            .bind(phone)
            .fetch_one(&mut *tx)
            .await
            .map_err(StoreError::backend)?,
        };

        tx.commit().await.map_err(StoreError::backend)?;
        Ok(account.into())
    }

    async fn credit(
        &self,
        phone: &str,
        amount: i64,
        description: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<i64> {
        let mut tx = self.pool.begin().await.map_err(StoreError::backend)?;

        let (balance,): (i64,) = sqlx::query_as(
            "INSERT INTO accounts (phone, balance, updated_at) VALUES ($1, $2, $3)
             ON CONFLICT (phone) DO UPDATE
             SET balance = accounts.balance + EXCLUDED.balance, updated_at = EXCLUDED.updated_at
             RETURNING balance",
        )
        .bind(phone)
        .bind(amount)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(StoreError::backend)?;

        record_transaction(&mut *tx, phone, amount, description, None, now)
            .await
            .map_err(StoreError::backend)?;
        tx.commit().await.map_err(StoreError::backend)?;
        Ok(balance)
    }

    async fn purchase(
        &self,
        booking: &NewBooking,
        description: &str,
    ) -> Result<(BookingId, i64), PurchaseError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::backend)?;

        let event: Option<(bool, i32)> = sqlx::query_as(
            "SELECT is_active, available_seats FROM events WHERE id = $1 FOR UPDATE",
        )
        .bind(booking.event_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(StoreError::backend)?;
        let available = match event {
            Some((true, available)) => available,
            _ => return Err(PurchaseError::EventNotFound(booking.event_id)),
        };

        let balance: Option<(i64,)> =
            sqlx::query_as("SELECT balance FROM accounts WHERE phone = $1 FOR UPDATE")
                .bind(&booking.phone)
                .fetch_optional(&mut *tx)
                .await
                .map_err(StoreError::backend)?;
        let balance = balance.map(|(b,)| b).unwrap_or_default();
        if balance < booking.total_price {
            return Err(PurchaseError::InsufficientBalance {
                required: booking.total_price,
                balance,
            });
        }

        let withheld = ledger::adjust_seats(
            &mut *tx,
            booking.event_id,
            booking.quantity,
            SeatAdjustment::Decrease,
        )
        .await
        .map_err(StoreError::backend)?;
        if !withheld {
            return Err(PurchaseError::InsufficientSeats {
                requested: booking.quantity,
                available,
            });
        }

        let id = booking_repo::insert_booking(&mut *tx, booking)
            .await
            .map_err(|e| match e {
                StoreError::DuplicateBookingRef(r) => PurchaseError::DuplicateBookingRef(r),
                other => PurchaseError::Store(other),
            })?;

        let (new_balance,): (i64,) = sqlx::query_as(
            "UPDATE accounts SET balance = balance - $2, holder_name = $3, updated_at = $4
             WHERE phone = $1
             RETURNING balance",
        )
        .bind(&booking.phone)
        .bind(booking.total_price)
        .bind(&booking.user_name)
        .bind(booking.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(StoreError::backend)?;

        record_transaction(
            &mut *tx,
            &booking.phone,
            -booking.total_price,
            description,
            Some(booking.booking_ref.as_str()),
            booking.created_at,
        )
        .await
        .map_err(StoreError::backend)?;

        tx.commit().await.map_err(StoreError::backend)?;
        Ok((id, new_balance))
    }
}
