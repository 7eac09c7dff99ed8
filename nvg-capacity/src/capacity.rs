use nvg_core::{Schedule, Vessel};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Where a schedule's seat total came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatSource {
    Schedule,
    /// Degraded: schedule row has no seat count, vessel capacity used instead.
    Vessel,
    /// Degraded: neither schedule nor vessel had a usable count.
    Default,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeatTotal {
    pub seats: i32,
    pub source: SeatSource,
}

impl SeatTotal {
    /// Resolves the seat total: the schedule's own count, else the vessel's
    /// capacity, else `default_seats`. Both fallbacks are logged.
    pub fn resolve(schedule: &Schedule, vessel: Option<&Vessel>, default_seats: i32) -> Self {
        if let Some(seats) = schedule.total_seats.filter(|s| *s > 0) {
            return Self { seats, source: SeatSource::Schedule };
        }

        if let Some(capacity) = vessel.map(|v| v.capacity).filter(|c| *c > 0) {
            warn!(
                "Schedule {} has no seat count, using vessel {} capacity of {}",
                schedule.id, schedule.vessel_id, capacity
            );
            return Self { seats: capacity, source: SeatSource::Vessel };
        }

        warn!(
            "Unable to determine total seats for schedule {}, using default of {}",
            schedule.id, default_seats
        );
        Self { seats: default_seats, source: SeatSource::Default }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UtilizationLevel {
    High,
    Medium,
    Low,
}

impl UtilizationLevel {
    pub fn from_percentage(pct: f64) -> Self {
        if pct >= 90.0 {
            UtilizationLevel::High
        } else if pct >= 70.0 {
            UtilizationLevel::Medium
        } else {
            UtilizationLevel::Low
        }
    }
}

/// Seat and cargo occupancy of one schedule, built from freshly read rows.
///
/// Never cache one of these across requests: admission decisions are only
/// valid against the state read under the schedule lock.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ScheduleCapacity {
    pub total_seats: SeatTotal,
    pub booked_seats: i64,
    pub total_cargo_kg: f64,
    pub booked_cargo_kg: f64,
}

impl ScheduleCapacity {
    pub fn new(total_seats: SeatTotal, booked_seats: i64, total_cargo_kg: f64, booked_cargo_kg: f64) -> Self {
        Self {
            total_seats,
            booked_seats,
            total_cargo_kg,
            booked_cargo_kg,
        }
    }

    pub fn available_seats(&self) -> i64 {
        (i64::from(self.total_seats.seats) - self.booked_seats).max(0)
    }

    pub fn available_cargo_kg(&self) -> f64 {
        (self.total_cargo_kg - self.booked_cargo_kg).max(0.0)
    }

    pub fn can_add_seat(&self) -> bool {
        self.booked_seats < i64::from(self.total_seats.seats)
    }

    pub fn can_add_cargo(&self, weight_kg: f64) -> bool {
        self.booked_cargo_kg + weight_kg <= self.total_cargo_kg
    }

    /// Booked cargo weight as a percentage of total capacity, clamped to 0-100.
    pub fn cargo_utilization(&self) -> f64 {
        if self.total_cargo_kg <= 0.0 {
            return 0.0;
        }
        (self.booked_cargo_kg / self.total_cargo_kg * 100.0).clamp(0.0, 100.0)
    }

    pub fn cargo_utilization_level(&self) -> UtilizationLevel {
        UtilizationLevel::from_percentage(self.cargo_utilization())
    }
}
