use chrono::Duration;
use serde::{Deserialize, Serialize};

/// How a batched payment's total is attributed to its tickets and cargo.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SplitStrategy {
    /// Each group's total divided evenly across the group's items.
    #[default]
    Equal,
    /// Each item carries its own price.
    Proportional,
}

/// Tunable booking limits. Loaded from config, optionally overridden from the
/// `business_rules` table at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRules {
    #[serde(default = "default_max_cargo_weight")]
    pub max_cargo_weight_kg: f64,
    /// Seat count used when neither the schedule nor its vessel provides one.
    #[serde(default = "default_seat_count")]
    pub default_seat_count: i32,
    /// A vessel may not sail twice within this many minutes of another sailing.
    #[serde(default = "default_buffer_minutes")]
    pub schedule_buffer_minutes: i64,
    #[serde(default = "default_tracking_prefix")]
    pub tracking_prefix: String,
    #[serde(default = "default_tracking_attempts")]
    pub tracking_attempts: u32,
    #[serde(default)]
    pub payment_split: SplitStrategy,
    #[serde(default = "default_currency")]
    pub default_currency: String,
}

fn default_max_cargo_weight() -> f64 {
    50_000.0
}

fn default_seat_count() -> i32 {
    50
}

fn default_buffer_minutes() -> i64 {
    60
}

fn default_tracking_prefix() -> String {
    "NGV-".to_string()
}

fn default_tracking_attempts() -> u32 {
    5
}

fn default_currency() -> String {
    "usd".to_string()
}

impl BookingRules {
    /// The turnaround buffer, or `None` when the configured minutes are
    /// negative or too large to represent.
    pub fn schedule_buffer(&self) -> Option<Duration> {
        if self.schedule_buffer_minutes < 0 {
            return None;
        }
        Duration::try_minutes(self.schedule_buffer_minutes)
    }
}

impl Default for BookingRules {
    fn default() -> Self {
        Self {
            max_cargo_weight_kg: default_max_cargo_weight(),
            default_seat_count: default_seat_count(),
            schedule_buffer_minutes: default_buffer_minutes(),
            tracking_prefix: default_tracking_prefix(),
            tracking_attempts: default_tracking_attempts(),
            payment_split: SplitStrategy::default(),
            default_currency: default_currency(),
        }
    }
}
