use nvg_capacity::AllocationError;
use nvg_core::{CargoStatus, FieldError, ProcessorError, StoreError};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Schedule not found with ID: {0}")]
    ScheduleNotFound(Uuid),

    #[error("Owner not found with ID: {0}")]
    OwnerNotFound(Uuid),

    #[error("Ticket not found with ID: {0}")]
    TicketNotFound(Uuid),

    #[error("Cargo not found: {0}")]
    CargoNotFound(String),

    #[error("Payment not found: {0}")]
    PaymentNotFound(String),

    #[error("Vessel not found with ID: {0}")]
    VesselNotFound(Uuid),

    #[error("Route not found with ID: {0}")]
    RouteNotFound(Uuid),

    #[error("Validation failed: {}", describe(.0))]
    Validation(Vec<FieldError>),

    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error("Invalid status '{0}'")]
    InvalidStatus(String),

    #[error("Cargo cannot move from {from} to {to}")]
    InvalidTransition { from: CargoStatus, to: CargoStatus },

    #[error("Vessel {0} is already scheduled during this time")]
    ScheduleConflict(Uuid),

    #[error("{0}")]
    Conflict(String),

    #[error("Payment processor failure: {0}")]
    Processor(#[from] ProcessorError),

    #[error("Storage failure: {0}")]
    Store(#[from] StoreError),
}

impl BookingError {
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        BookingError::Validation(vec![FieldError::new(field, message)])
    }
}

fn describe(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| format!("{}: {}", f.field, f.message))
        .collect::<Vec<_>>()
        .join("; ")
}

pub type BookingResult<T> = Result<T, BookingError>;
