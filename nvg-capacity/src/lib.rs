pub mod capacity;
pub mod cargo;
pub mod seat;

pub use capacity::{ScheduleCapacity, SeatSource, SeatTotal, UtilizationLevel};
pub use cargo::{CargoAllocator, CargoQuote};
pub use seat::{SeatAllocator, SeatNumber};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AllocationError {
    #[error("Invalid seat number '{0}': expected a letter followed by 1-3 digits")]
    InvalidSeatNumber(String),

    #[error("Seat {0} is already booked for this schedule")]
    SeatTaken(String),

    #[error("No seats available for this schedule ({total} of {total} booked)")]
    NoSeatsAvailable { total: i32 },

    #[error("Invalid weight {0}: weight must be positive")]
    InvalidWeight(f64),

    #[error("Weight {weight} kg exceeds the maximum of {max} kg per booking")]
    WeightAboveLimit { weight: f64, max: f64 },

    #[error("Insufficient cargo capacity: requested {requested} kg, available {available} kg")]
    InsufficientCapacity { available: f64, requested: f64 },
}
