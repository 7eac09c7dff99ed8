pub mod cargo;
pub mod error;
pub mod payments;
pub mod processor;
pub mod schedules;
pub mod service;
pub mod tickets;
pub mod tracking;
pub mod validation;

pub use cargo::{CargoBooking, CargoCapacityInfo};
pub use error::{BookingError, BookingResult};
pub use payments::{PaymentConfirmation, PaymentDetails, PaymentReceipt, PaymentReconciler, PaymentRequest};
pub use processor::MockPaymentProcessor;
pub use schedules::{ScheduleInput, ScheduleService};
pub use service::BookingService;
pub use tickets::{SeatInfo, TicketBooking, TicketUpdate};
pub use tracking::TrackingNumbers;
