use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    routing::get,
    Router,
};
use tracing::{debug, info, warn};

use ticketbot_chat::parser::normalize_phone;
use ticketbot_chat::deliver;
use ticketbot_shared::pii::mask;
use ticketbot_whatsapp::{parse_inbound, VerifyQuery};

use crate::error::AppError;
use crate::state::AppState;

const RATE_WINDOW_SECONDS: i64 = 60;

pub fn routes() -> Router<AppState> {
    Router::new().route("/webhook", get(verify_subscription).post(receive_message))
}

/// POST /webhook
///
/// Always answers 200 so the provider does not redeliver; failures are logged.
pub async fn receive_message(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> StatusCode {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());

    let inbound = match parse_inbound(content_type, &body) {
        Ok(Some(inbound)) => inbound,
        Ok(None) => {
            debug!("Webhook carried no user message");
            return StatusCode::OK;
        }
        Err(e) => {
            warn!(error = %e, "Unreadable webhook payload");
            return StatusCode::OK;
        }
    };

    let phone = normalize_phone(&inbound.phone);
    if phone.is_empty() {
        warn!("Webhook sender has no digits");
        return StatusCode::OK;
    }

    if !within_rate_limit(&state, &phone).await {
        state.metrics.rate_limited.inc();
        warn!(phone = %mask(&phone), "Rate limit exceeded, message dropped");
        return StatusCode::OK;
    }

    state.metrics.inbound_messages.inc();
    info!(phone = %mask(&phone), message_id = ?inbound.message_id, "Inbound message");

    let replies = state.router.route(&phone, &inbound.body).await;
    let report = deliver(state.transport.as_ref(), &phone, &replies).await;
    if report.failed > 0 {
        state.metrics.delivery_failures.inc_by(report.failed as u64);
    }

    StatusCode::OK
}

/// Fails open: without Redis, or when Redis errors, the message is let through.
async fn within_rate_limit(state: &AppState, phone: &str) -> bool {
    let Some(redis) = &state.redis else {
        return true;
    };
    let key = format!("ratelimit:{}", phone);
    match redis
        .check_rate_limit(&key, state.business_rules.rate_limit_per_minute, RATE_WINDOW_SECONDS)
        .await
    {
        Ok(allowed) => allowed,
        Err(e) => {
            warn!(error = %e, "Rate limit check failed, allowing message");
            true
        }
    }
}

/// GET /webhook
///
/// WhatsApp Cloud API subscription handshake.
pub async fn verify_subscription(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> Result<String, AppError> {
    match query.accept(state.verify_token.as_deref()) {
        Some(challenge) => {
            info!("Webhook verified");
            Ok(challenge)
        }
        None => Err(AppError::Forbidden("Forbidden".into())),
    }
}
