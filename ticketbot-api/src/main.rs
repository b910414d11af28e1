use anyhow::Context;
use chrono::{Duration, Utc};
use std::net::SocketAddr;
use std::sync::Arc;
use ticketbot_api::{app, worker::Sweeper, AppState, Stores};
use ticketbot_core::clock::{Clock, SystemClock};
use ticketbot_core::messaging::MessageTransport;
use ticketbot_core::repository::EventRepository;
use ticketbot_order::HostedQrRenderer;
use ticketbot_shared::NewEvent;
use ticketbot_store::app_config::{Config, MessagingConfig, MessagingProvider};
use ticketbot_store::{DbClient, MemoryStore, RedisClient};
use ticketbot_whatsapp::{CloudApiTransport, LogTransport, TwilioTransport};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ticketbot_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!(
        port = config.server.port,
        checkout = ?config.business_rules.checkout,
        provider = ?config.messaging.provider,
        "Starting ticket bot"
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let stores = match &config.database.url {
        Some(url) => {
            let db = DbClient::new(url, config.database.max_connections)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;
            Stores::postgres(db.pool)
        }
        None => {
            tracing::warn!("No database configured, using the in-memory store");
            let store = Arc::new(MemoryStore::new());
            seed_demo_events(store.as_ref(), clock.now()).await?;
            Stores::memory(store)
        }
    };

    // Redis is optional: without it the sweep runs unleased and rate limiting is off.
    let redis = match &config.redis {
        Some(redis) => match RedisClient::new(&redis.url) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                tracing::warn!(error = %e, "Redis unavailable, continuing without it");
                None
            }
        },
        None => None,
    };

    let transport = transport_for(&config.messaging)?;
    let qr = HostedQrRenderer::new(
        &config.tickets.public_base_url,
        &config.tickets.qr_service_url,
        config.tickets.qr_size,
    )
    .context("Invalid tickets configuration")?;
    let verify_token = config.messaging.cloud.as_ref().and_then(|c| c.verify_token.clone());

    let state = AppState::build(
        stores,
        config.business_rules.clone(),
        qr,
        transport,
        redis,
        clock,
        verify_token,
    )?;

    let sweeper = Sweeper {
        reservations: state.reservations.clone(),
        sessions: state.sessions.clone(),
        clock: state.clock.clone(),
        redis: state.redis.clone(),
        metrics: state.metrics.clone(),
        session_timeout_minutes: config.business_rules.session_timeout_minutes,
        owner: format!(
            "{}:{}",
            std::env::var("HOSTNAME").unwrap_or_else(|_| "local".into()),
            std::process::id()
        ),
    };
    tokio::spawn(sweeper.run(std::time::Duration::from_secs(
        config.business_rules.sweep_interval_seconds.max(1),
    )));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;
    Ok(())
}

fn transport_for(config: &MessagingConfig) -> anyhow::Result<Arc<dyn MessageTransport>> {
    let transport: Arc<dyn MessageTransport> = match config.provider {
        MessagingProvider::Twilio => {
            let twilio = config
                .twilio
                .as_ref()
                .context("messaging.provider = twilio needs a [messaging.twilio] section")?;
            Arc::new(TwilioTransport::new(
                twilio.account_sid.clone(),
                twilio.auth_token.clone(),
                &twilio.from_number,
            ))
        }
        MessagingProvider::Cloud => {
            let cloud = config
                .cloud
                .as_ref()
                .context("messaging.provider = cloud needs a [messaging.cloud] section")?;
            Arc::new(CloudApiTransport::new(
                cloud.access_token.clone(),
                cloud.phone_number_id.clone(),
                cloud.api_version.clone(),
            ))
        }
        MessagingProvider::Log => Arc::new(LogTransport),
    };
    Ok(transport)
}

/// Sample catalogue for runs without Postgres (the SQL seed migration covers the database).
async fn seed_demo_events(store: &MemoryStore, now: chrono::DateTime<Utc>) -> anyhow::Result<()> {
    let demo = [
        ("Arijit Singh Live", "Mumbai", "NSCI Dome", 10, 100, 150_000),
        ("Sunburn Arena", "Pune", "Mahalakshmi Lawns", 21, 250, 200_000),
        ("Majestic to Whitefield Metro", "Bangalore", "Majestic Station", 1, 300, 4_500),
    ];
    for (title, city, venue, days, seats, price) in demo {
        store
            .create_event(&NewEvent {
                title: title.into(),
                description: None,
                city: city.into(),
                venue: venue.into(),
                event_date: now + Duration::days(days),
                total_seats: seats,
                price,
            })
            .await?;
    }
    Ok(())
}
