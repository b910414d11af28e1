use axum::{
    extract::{Path, State},
    http::{header, Method},
    response::{IntoResponse, Redirect},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use ticketbot_core::clock::Clock;
use ticketbot_shared::BookingRef;

pub mod error;
pub mod metrics;
pub mod state;
pub mod webhooks;
pub mod worker;

pub use error::AppError;
pub use state::{AppState, Stores};

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::USER_AGENT]);

    Router::new()
        .merge(webhooks::routes())
        .route("/health", get(health))
        .route("/metrics", get(metrics_text))
        .route("/qr/{file}", get(qr_image))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health
async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": state.clock.now().to_rfc3339(),
        "checkout": state.business_rules.checkout,
    }))
}

/// GET /metrics
async fn metrics_text(State(state): State<AppState>) -> Result<String, AppError> {
    Ok(state.metrics.render()?)
}

/// GET /qr/{BKG-XXXXXX}.png
///
/// Redirects to the QR service rendering of the booking reference.
async fn qr_image(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let not_found = || AppError::NotFound("QR code not found".into());
    let booking_ref = file
        .strip_suffix(".png")
        .and_then(BookingRef::parse)
        .ok_or_else(not_found)?;

    if state.finalizer.retrieve(&booking_ref).await?.is_none() {
        return Err(not_found());
    }
    Ok(Redirect::temporary(&state.qr.image_url(&booking_ref)))
}
