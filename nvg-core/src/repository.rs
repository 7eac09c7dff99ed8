use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    Cargo, CargoPayment, CargoStatus, Payment, Schedule, ScheduleFilter, Ticket, TicketPayment,
    Vessel,
};
use crate::payment::PaymentStatus;
use crate::StoreResult;

/// Entry point to persistence. Every service operation runs inside one
/// transaction obtained from here; dropping a transaction without calling
/// [`StoreTx::commit`] discards its writes.
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>>;
}

/// A unit of work against the booking tables.
///
/// Capacity admission must call [`StoreTx::lock_schedule`] before reading
/// aggregates; the lock is held until the transaction ends.
#[async_trait]
pub trait StoreTx: Send {
    // Reference data
    async fn vessel(&mut self, id: Uuid) -> StoreResult<Option<Vessel>>;
    /// Row-locks the vessel so placement checks for it run one at a time.
    async fn lock_vessel(&mut self, id: Uuid) -> StoreResult<Option<Vessel>>;
    async fn route_exists(&mut self, id: Uuid) -> StoreResult<bool>;
    async fn owner_exists(&mut self, id: Uuid) -> StoreResult<bool>;

    // Schedules
    async fn schedule(&mut self, id: Uuid) -> StoreResult<Option<Schedule>>;
    async fn lock_schedule(&mut self, id: Uuid) -> StoreResult<Option<Schedule>>;
    async fn list_schedules(&mut self) -> StoreResult<Vec<Schedule>>;
    /// Schedules matching `filter`, ordered by departure time.
    async fn find_schedules(&mut self, filter: &ScheduleFilter) -> StoreResult<Vec<Schedule>>;
    /// True when another schedule of `vessel_id` overlaps `[from, to]`.
    async fn vessel_busy(
        &mut self,
        vessel_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> StoreResult<bool>;
    async fn insert_schedule(&mut self, schedule: &Schedule) -> StoreResult<()>;
    async fn update_schedule(&mut self, schedule: &Schedule) -> StoreResult<()>;
    /// Removes the schedule together with its tickets and cargo.
    async fn delete_schedule(&mut self, id: Uuid) -> StoreResult<bool>;

    // Tickets
    async fn ticket(&mut self, id: Uuid) -> StoreResult<Option<Ticket>>;
    /// All tickets, optionally only those with the given paid flag.
    async fn list_tickets(&mut self, paid: Option<bool>) -> StoreResult<Vec<Ticket>>;
    /// Tickets of a schedule ordered by row letter, then seat position.
    async fn tickets_for_schedule(&mut self, schedule_id: Uuid) -> StoreResult<Vec<Ticket>>;
    async fn count_tickets(&mut self, schedule_id: Uuid) -> StoreResult<i64>;
    async fn seat_taken(&mut self, schedule_id: Uuid, seat_number: &str) -> StoreResult<bool>;
    async fn insert_ticket(&mut self, ticket: &Ticket) -> StoreResult<()>;
    /// Column-scoped writes; concurrent updates to other columns are kept.
    /// Each returns false when the row no longer exists.
    async fn set_ticket_seat(
        &mut self,
        id: Uuid,
        seat_number: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<bool>;
    async fn set_ticket_paid(&mut self, id: Uuid, paid: bool, at: DateTime<Utc>) -> StoreResult<bool>;
    async fn delete_ticket(&mut self, id: Uuid) -> StoreResult<bool>;
    /// Sets `paid = true` and returns the ids that were actually updated.
    async fn mark_tickets_paid(&mut self, ids: &[Uuid]) -> StoreResult<Vec<Uuid>>;

    // Cargo
    async fn cargo(&mut self, id: Uuid) -> StoreResult<Option<Cargo>>;
    /// All cargo, optionally only bookings in the given status.
    async fn list_cargo(&mut self, status: Option<CargoStatus>) -> StoreResult<Vec<Cargo>>;
    async fn cargo_by_tracking(&mut self, tracking_number: &str) -> StoreResult<Option<Cargo>>;
    async fn cargo_for_schedule(&mut self, schedule_id: Uuid) -> StoreResult<Vec<Cargo>>;
    async fn cargo_for_owner(&mut self, owner_id: Uuid) -> StoreResult<Vec<Cargo>>;
    /// Sum of non-cancelled cargo weight on the schedule, optionally leaving one cargo out.
    async fn booked_cargo_weight(
        &mut self,
        schedule_id: Uuid,
        excluding: Option<Uuid>,
    ) -> StoreResult<f64>;
    async fn insert_cargo(&mut self, cargo: &Cargo) -> StoreResult<()>;
    async fn set_cargo_status(
        &mut self,
        id: Uuid,
        status: CargoStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<bool>;
    async fn set_cargo_weight(
        &mut self,
        id: Uuid,
        weight: f64,
        price: f64,
        at: DateTime<Utc>,
    ) -> StoreResult<bool>;
    async fn delete_cargo(&mut self, id: Uuid) -> StoreResult<bool>;

    // Payments
    async fn insert_payment(
        &mut self,
        payment: &Payment,
        tickets: &[TicketPayment],
        cargo: &[CargoPayment],
    ) -> StoreResult<()>;
    async fn payment(&mut self, id: Uuid) -> StoreResult<Option<Payment>>;
    async fn payment_by_reference(&mut self, reference: &str) -> StoreResult<Option<Payment>>;
    async fn update_payment_status(&mut self, id: Uuid, status: &PaymentStatus) -> StoreResult<()>;
    async fn payment_links(
        &mut self,
        payment_id: Uuid,
    ) -> StoreResult<(Vec<TicketPayment>, Vec<CargoPayment>)>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;
}
