use nvg_core::{BookingRules, SplitStrategy};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::{info, warn};

use crate::app_config::DatabaseConfig;
use crate::postgres::PgBookingStore;

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

#[derive(sqlx::FromRow)]
struct RuleRow {
    rule_key: String,
    rule_value: Value,
}

impl DbClient {
    pub async fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
            .connect(&config.url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        info!("Migrations completed successfully.");
        Ok(())
    }

    pub fn booking_store(&self) -> PgBookingStore {
        PgBookingStore::new(self.pool.clone())
    }

    /// Applies `business_rules` rows (`{"value": ...}`) on top of `defaults`.
    pub async fn fetch_booking_rules(&self, defaults: BookingRules) -> Result<BookingRules, sqlx::Error> {
        let rows = sqlx::query_as::<_, RuleRow>("SELECT rule_key, rule_value FROM business_rules")
            .fetch_all(&self.pool)
            .await?;

        let mut rules = defaults;
        for row in rows {
            let Some(v) = row.rule_value.get("value") else {
                warn!("Business rule {} has no value field, ignoring", row.rule_key);
                continue;
            };
            if !apply_rule(&mut rules, &row.rule_key, v) {
                warn!("Ignoring business rule {} = {}", row.rule_key, v);
            }
        }

        Ok(rules)
    }
}

/// Returns false for unknown keys and ill-typed values.
fn apply_rule(rules: &mut BookingRules, key: &str, v: &Value) -> bool {
    let applied = match key {
        "max_cargo_weight_kg" => v.as_f64().filter(|f| *f > 0.0).map(|f| rules.max_cargo_weight_kg = f),
        "default_seat_count" => v
            .as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .filter(|n| *n > 0)
            .map(|n| rules.default_seat_count = n),
        "schedule_buffer_minutes" => v
            .as_i64()
            .filter(|n| *n >= 0 && chrono::Duration::try_minutes(*n).is_some())
            .map(|n| rules.schedule_buffer_minutes = n),
        "tracking_prefix" => v.as_str().map(|s| rules.tracking_prefix = s.to_string()),
        "tracking_attempts" => v
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .filter(|n| *n > 0)
            .map(|n| rules.tracking_attempts = n),
        "payment_split" => match v.as_str() {
            Some("equal") => Some(rules.payment_split = SplitStrategy::Equal),
            Some("proportional") => Some(rules.payment_split = SplitStrategy::Proportional),
            _ => None,
        },
        "default_currency" => v.as_str().map(|s| rules.default_currency = s.to_ascii_lowercase()),
        _ => None,
    };
    applied.is_some()
}
