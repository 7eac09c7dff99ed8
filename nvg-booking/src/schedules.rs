use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use nvg_core::{BookingRules, BookingStore, FieldError, Schedule, ScheduleFilter, StoreTx};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{BookingError, BookingResult};
use crate::validation;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleInput {
    pub vessel_id: Uuid,
    pub route_id: Uuid,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub total_seats: i32,
    pub total_cargo_capacity: f64,
    pub seat_price: f64,
    pub cargo_price_per_kg: f64,
}

/// Operator-facing schedule management.
pub struct ScheduleService {
    store: Arc<dyn BookingStore>,
    buffer: Duration,
}

impl ScheduleService {
    pub fn new(store: Arc<dyn BookingStore>, rules: &BookingRules) -> Self {
        let buffer = rules.schedule_buffer().unwrap_or_else(|| {
            let fallback = BookingRules::default();
            warn!(
                "Schedule buffer of {} minutes is out of range, using {}",
                rules.schedule_buffer_minutes, fallback.schedule_buffer_minutes
            );
            Duration::minutes(fallback.schedule_buffer_minutes)
        });
        Self { store, buffer }
    }

    pub async fn create(&self, input: ScheduleInput) -> BookingResult<Schedule> {
        let now = Utc::now();
        validation::schedule_input(&input, now)?;

        let mut tx = self.store.begin().await?;
        self.check_placement(tx.as_mut(), &input, None).await?;

        let schedule = Schedule {
            id: Uuid::new_v4(),
            vessel_id: input.vessel_id,
            route_id: input.route_id,
            departure_time: input.departure_time,
            arrival_time: input.arrival_time,
            total_seats: Some(input.total_seats),
            total_cargo_capacity: input.total_cargo_capacity,
            seat_price: input.seat_price,
            cargo_price_per_kg: input.cargo_price_per_kg,
            created_at: now,
            updated_at: now,
        };
        tx.insert_schedule(&schedule).await?;
        tx.commit().await?;

        info!(
            "Schedule {} created for vessel {}: {} seats, {} kg cargo",
            schedule.id, schedule.vessel_id, input.total_seats, schedule.total_cargo_capacity
        );
        Ok(schedule)
    }

    /// Replaces every operator-controlled field. Capacities may not drop
    /// below what is already booked.
    pub async fn update(&self, id: Uuid, input: ScheduleInput) -> BookingResult<Schedule> {
        let now = Utc::now();
        validation::schedule_input(&input, now)?;

        let mut tx = self.store.begin().await?;
        let mut schedule = tx
            .lock_schedule(id)
            .await?
            .ok_or(BookingError::ScheduleNotFound(id))?;
        self.check_placement(tx.as_mut(), &input, Some(id)).await?;

        let booked_seats = tx.count_tickets(id).await?;
        let booked_cargo = tx.booked_cargo_weight(id, None).await?;
        let mut errors = Vec::new();
        if booked_seats > i64::from(input.total_seats) {
            errors.push(FieldError::new(
                "totalSeats",
                format!("{} seats are already booked", booked_seats),
            ));
        }
        if booked_cargo > input.total_cargo_capacity {
            errors.push(FieldError::new(
                "totalCargoCapacity",
                format!("{} kg of cargo is already booked", booked_cargo),
            ));
        }
        if !errors.is_empty() {
            return Err(BookingError::Validation(errors));
        }

        schedule.vessel_id = input.vessel_id;
        schedule.route_id = input.route_id;
        schedule.departure_time = input.departure_time;
        schedule.arrival_time = input.arrival_time;
        schedule.total_seats = Some(input.total_seats);
        schedule.total_cargo_capacity = input.total_cargo_capacity;
        schedule.seat_price = input.seat_price;
        schedule.cargo_price_per_kg = input.cargo_price_per_kg;
        schedule.updated_at = now;

        tx.update_schedule(&schedule).await?;
        tx.commit().await?;

        info!("Schedule {} updated", schedule.id);
        Ok(schedule)
    }

    /// Deletes the schedule and, with it, its tickets and cargo.
    pub async fn delete(&self, id: Uuid) -> BookingResult<()> {
        let mut tx = self.store.begin().await?;
        if !tx.delete_schedule(id).await? {
            return Err(BookingError::ScheduleNotFound(id));
        }
        tx.commit().await?;

        info!("Schedule {} deleted", id);
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> BookingResult<Schedule> {
        let mut tx = self.store.begin().await?;
        tx.schedule(id).await?.ok_or(BookingError::ScheduleNotFound(id))
    }

    pub async fn list(&self) -> BookingResult<Vec<Schedule>> {
        let mut tx = self.store.begin().await?;
        Ok(tx.list_schedules().await?)
    }

    pub async fn for_vessel(&self, vessel_id: Uuid) -> BookingResult<Vec<Schedule>> {
        let mut tx = self.store.begin().await?;
        if tx.vessel(vessel_id).await?.is_none() {
            return Err(BookingError::VesselNotFound(vessel_id));
        }
        Ok(tx.find_schedules(&ScheduleFilter::Vessel(vessel_id)).await?)
    }

    pub async fn for_route(&self, route_id: Uuid) -> BookingResult<Vec<Schedule>> {
        let mut tx = self.store.begin().await?;
        if !tx.route_exists(route_id).await? {
            return Err(BookingError::RouteNotFound(route_id));
        }
        Ok(tx.find_schedules(&ScheduleFilter::Route(route_id)).await?)
    }

    pub async fn departing_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> BookingResult<Vec<Schedule>> {
        check_window(start, end)?;
        let mut tx = self.store.begin().await?;
        Ok(tx.find_schedules(&ScheduleFilter::DepartingBetween(start, end)).await?)
    }

    pub async fn arriving_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> BookingResult<Vec<Schedule>> {
        check_window(start, end)?;
        let mut tx = self.store.begin().await?;
        Ok(tx.find_schedules(&ScheduleFilter::ArrivingBetween(start, end)).await?)
    }

    async fn check_placement(
        &self,
        tx: &mut dyn StoreTx,
        input: &ScheduleInput,
        exclude: Option<Uuid>,
    ) -> BookingResult<()> {
        // Holding the vessel row makes the overlap check and the write atomic
        // against other placements of the same vessel.
        if tx.lock_vessel(input.vessel_id).await?.is_none() {
            return Err(BookingError::VesselNotFound(input.vessel_id));
        }
        if !tx.route_exists(input.route_id).await? {
            return Err(BookingError::RouteNotFound(input.route_id));
        }

        let from = input.departure_time - self.buffer;
        let to = input.arrival_time + self.buffer;
        if tx.vessel_busy(input.vessel_id, from, to, exclude).await? {
            return Err(BookingError::ScheduleConflict(input.vessel_id));
        }
        Ok(())
    }
}

fn check_window(start: DateTime<Utc>, end: DateTime<Utc>) -> BookingResult<()> {
    if start > end {
        return Err(BookingError::invalid("start", "start must not be after end"));
    }
    Ok(())
}
