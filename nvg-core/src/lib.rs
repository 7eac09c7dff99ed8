pub mod models;
pub mod payment;
pub mod repository;
pub mod rules;

pub use models::{
    seat_sort_key, Cargo, CargoPayment, CargoStatus, Payment, Schedule, ScheduleFilter, Ticket,
    TicketPayment, Vessel,
};
pub use payment::{PaymentProcessor, PaymentStatus, ProcessorError, ProcessorIntent};
pub use repository::{BookingStore, StoreTx};
pub use rules::{BookingRules, SplitStrategy};

/// Unique constraint guarding one ticket per (schedule, seat).
pub const SEAT_CONSTRAINT: &str = "tickets_schedule_seat_key";
/// Unique constraint on cargo tracking numbers.
pub const TRACKING_CONSTRAINT: &str = "cargo_tracking_number_key";
/// Unique constraint on the processor's payment reference.
pub const PAYMENT_REFERENCE_CONSTRAINT: &str = "payments_processor_reference_key";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },
    #[error("Referenced row does not exist: {0}")]
    MissingReference(String),
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// True when the error is a uniqueness violation on `constraint`.
    pub fn violates(&self, constraint: &str) -> bool {
        matches!(self, StoreError::UniqueViolation { constraint: c } if c == constraint)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A single rejected input field, reported back to API callers.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}
