use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use nvg_api::{app, AppState};
use nvg_booking::MockPaymentProcessor;
use nvg_store::{Config, DbClient, RedisClient};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nvg_api=debug,nvg_booking=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting booking API on port {}", config.server.port);

    let db = DbClient::new(&config.database)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;

    let rules = match db.fetch_booking_rules(config.booking.clone()).await {
        Ok(rules) => rules,
        Err(e) => {
            tracing::warn!("Could not load business rules, using config values: {}", e);
            config.booking.clone()
        }
    };
    tracing::info!("Booking rules: {:?}", rules);

    // Intents settle as succeeded on their first retrieval.
    let processor = Arc::new(MockPaymentProcessor::new());
    let mut state = AppState::new(
        Arc::new(db.booking_store()),
        processor,
        rules,
        &config.payments,
    );

    if let Some(redis) = &config.redis {
        match RedisClient::new(&redis.url).await {
            Ok(client) => {
                state = state.with_rate_limit(Arc::new(client), redis.rate_limit_per_minute);
            }
            Err(e) => tracing::warn!("Redis unavailable, rate limiting disabled: {}", e),
        }
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
