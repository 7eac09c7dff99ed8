use std::sync::Arc;

use nvg_capacity::{AllocationError, CargoAllocator, ScheduleCapacity, SeatAllocator, SeatNumber, SeatTotal};
use nvg_core::{BookingRules, BookingStore, Schedule, StoreError, StoreTx, SEAT_CONSTRAINT};
use tracing::warn;
use uuid::Uuid;

use crate::error::{BookingError, BookingResult};
use crate::tracking::TrackingNumbers;

/// Single entry point for ticket and cargo bookings.
///
/// Every operation that can change a schedule's occupancy runs in one store
/// transaction that first locks the schedule row, so the capacity check and
/// the write commit together.
pub struct BookingService {
    pub(crate) store: Arc<dyn BookingStore>,
    pub(crate) rules: BookingRules,
    pub(crate) seats: SeatAllocator,
    pub(crate) cargo: CargoAllocator,
    pub(crate) tracking: TrackingNumbers,
}

impl BookingService {
    pub fn new(store: Arc<dyn BookingStore>, rules: BookingRules) -> Self {
        Self {
            store,
            seats: SeatAllocator::new(),
            cargo: CargoAllocator::new(rules.max_cargo_weight_kg),
            tracking: TrackingNumbers::new(rules.tracking_prefix.clone()),
            rules,
        }
    }

    pub fn rules(&self) -> &BookingRules {
        &self.rules
    }

    /// Reads the schedule's occupancy inside `tx`. Pass `excluding_cargo` to
    /// leave one cargo's weight out of the total.
    pub(crate) async fn load_capacity(
        &self,
        tx: &mut dyn StoreTx,
        schedule: &Schedule,
        excluding_cargo: Option<Uuid>,
    ) -> BookingResult<ScheduleCapacity> {
        let total_seats = self.seat_total(tx, schedule).await?;
        let booked_seats = tx.count_tickets(schedule.id).await?;
        let booked_cargo = tx.booked_cargo_weight(schedule.id, excluding_cargo).await?;

        Ok(ScheduleCapacity::new(
            total_seats,
            booked_seats,
            schedule.total_cargo_capacity,
            booked_cargo,
        ))
    }

    pub(crate) async fn seat_total(
        &self,
        tx: &mut dyn StoreTx,
        schedule: &Schedule,
    ) -> BookingResult<SeatTotal> {
        let vessel = match schedule.total_seats {
            Some(seats) if seats > 0 => None,
            _ => tx.vessel(schedule.vessel_id).await?,
        };
        Ok(SeatTotal::resolve(schedule, vessel.as_ref(), self.rules.default_seat_count))
    }

    pub(crate) async fn locked_schedule(
        &self,
        tx: &mut dyn StoreTx,
        schedule_id: Uuid,
    ) -> BookingResult<Schedule> {
        tx.lock_schedule(schedule_id)
            .await?
            .ok_or(BookingError::ScheduleNotFound(schedule_id))
    }
}

/// A writer that lost the race on the seat constraint gets the same error as
/// one rejected by the up-front check.
pub(crate) fn seat_conflict(err: StoreError, seat: &SeatNumber) -> BookingError {
    if err.violates(SEAT_CONSTRAINT) {
        warn!("Seat {} lost a concurrent booking race", seat);
        BookingError::Allocation(AllocationError::SeatTaken(seat.to_string()))
    } else {
        BookingError::Store(err)
    }
}
