use std::sync::Arc;
use std::time::Duration;

use nvg_booking::{BookingService, PaymentReconciler, ScheduleService};
use nvg_core::{BookingRules, BookingStore, PaymentProcessor};
use nvg_store::app_config::PaymentsConfig;
use nvg_store::RedisClient;

use crate::middleware::CircuitBreaker;

pub struct RateLimiter {
    pub redis: Arc<RedisClient>,
    pub per_minute: i64,
}

#[derive(Clone)]
pub struct AppState {
    pub bookings: Arc<BookingService>,
    pub schedules: Arc<ScheduleService>,
    pub payments: Arc<PaymentReconciler>,
    pub payment_circuit: Arc<CircuitBreaker>,
    pub rate_limiter: Option<Arc<RateLimiter>>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn BookingStore>,
        processor: Arc<dyn PaymentProcessor>,
        rules: BookingRules,
        payments: &PaymentsConfig,
    ) -> Self {
        Self {
            bookings: Arc::new(BookingService::new(store.clone(), rules.clone())),
            schedules: Arc::new(ScheduleService::new(store.clone(), &rules)),
            payments: Arc::new(PaymentReconciler::new(store, processor, rules)),
            payment_circuit: Arc::new(CircuitBreaker::new(
                "payments",
                payments.circuit_failure_threshold as usize,
                Duration::from_secs(payments.circuit_reset_seconds),
            )),
            rate_limiter: None,
        }
    }

    pub fn with_rate_limit(mut self, redis: Arc<RedisClient>, per_minute: i64) -> Self {
        self.rate_limiter = Some(Arc::new(RateLimiter { redis, per_minute }));
        self
    }
}
