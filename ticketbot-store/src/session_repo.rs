use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;

use ticketbot_core::repository::SessionRepository;
use ticketbot_core::{StoreError, StoreResult};
use ticketbot_shared::{ConversationState, Session};

pub struct PgSessionRepository {
    pool: PgPool,
}

impl PgSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    phone: String,
    context: serde_json::Value,
    last_activity: DateTime<Utc>,
}

#[async_trait]
impl SessionRepository for PgSessionRepository {
    async fn load_session(&self, phone: &str, now: DateTime<Utc>) -> StoreResult<Session> {
        let row: SessionRow = sqlx::query_as(
            "INSERT INTO sessions (phone, state, context, last_activity)
             VALUES ($1, 'INITIAL', $2, $3)
             ON CONFLICT (phone) DO UPDATE SET phone = EXCLUDED.phone
             RETURNING phone, context, last_activity",
        )
        .bind(phone)
        .bind(Json(ConversationState::Initial))
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        let state: ConversationState = serde_json::from_value(row.context).map_err(|e| {
            StoreError::Corrupt(format!("unreadable session context: {e}"))
        })?;
        Ok(Session {
            phone: row.phone,
            state,
            last_activity: row.last_activity,
        })
    }

    async fn save_session(
        &self,
        phone: &str,
        state: &ConversationState,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO sessions (phone, state, context, last_activity)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (phone) DO UPDATE
             SET state = EXCLUDED.state, context = EXCLUDED.context, last_activity = EXCLUDED.last_activity",
        )
        .bind(phone)
        .bind(state.name())
        .bind(Json(state))
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(StoreError::backend)?;
        Ok(())
    }

    async fn reset_session(&self, phone: &str, now: DateTime<Utc>) -> StoreResult<()> {
        self.save_session(phone, &ConversationState::Initial, now)
            .await
    }

    async fn delete_idle_sessions(&self, idle_since: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE last_activity < $1")
            .bind(idle_since)
            .execute(&self.pool)
            .await
            .map_err(StoreError::backend)?;
        Ok(result.rows_affected())
    }
}
