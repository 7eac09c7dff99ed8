use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::payment::PaymentStatus;

/// Vessel reference data. Only the seat capacity matters to booking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Vessel {
    pub id: Uuid,
    pub name: String,
    pub capacity: i32,
}

/// One sailing of one vessel on one route.
///
/// Booked seats and cargo weight are never stored here; they are derived from
/// the ticket and cargo rows pointing at the schedule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub id: Uuid,
    pub vessel_id: Uuid,
    pub route_id: Uuid,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    /// `None` only for rows created before schedules carried their own seat count.
    pub total_seats: Option<i32>,
    pub total_cargo_capacity: f64,
    pub seat_price: f64,
    pub cargo_price_per_kg: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Narrows a schedule listing. Time windows are inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleFilter {
    Vessel(Uuid),
    Route(Uuid),
    DepartingBetween(DateTime<Utc>, DateTime<Utc>),
    ArrivingBetween(DateTime<Utc>, DateTime<Utc>),
}

impl ScheduleFilter {
    pub fn matches(&self, schedule: &Schedule) -> bool {
        match *self {
            ScheduleFilter::Vessel(id) => schedule.vessel_id == id,
            ScheduleFilter::Route(id) => schedule.route_id == id,
            ScheduleFilter::DepartingBetween(start, end) => {
                (start..=end).contains(&schedule.departure_time)
            }
            ScheduleFilter::ArrivingBetween(start, end) => {
                (start..=end).contains(&schedule.arrival_time)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: Uuid,
    pub schedule_id: Uuid,
    pub seat_number: String,
    pub price: f64,
    pub paid: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Orders seats by row letter, then numerically by position, so "A2" sorts before "A10".
pub fn seat_sort_key(seat: &str) -> (String, u32) {
    let split = seat
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(seat.len());
    let (row, position) = seat.split_at(split);
    (row.to_ascii_uppercase(), position.parse().unwrap_or(u32::MAX))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Cargo {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub schedule_id: Uuid,
    pub description: String,
    pub weight: f64,
    pub tracking_number: String,
    pub status: CargoStatus,
    pub price: f64,
    pub special_requirements: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cargo {
    /// Weight this cargo currently holds against its schedule's capacity.
    pub fn committed_weight(&self) -> f64 {
        if self.status.releases_capacity() {
            0.0
        } else {
            self.weight
        }
    }
}

/// Cargo workflow status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CargoStatus {
    Pending,
    Received,
    Inspected,
    ReadyForShipment,
    InTransit,
    AtPort,
    CustomsHold,
    Delayed,
    Damaged,
    Stored,
    OutForDelivery,
    Delivered,
    Returned,
    Lost,
    Cancelled,
}

impl CargoStatus {
    pub const ALL: [CargoStatus; 15] = [
        CargoStatus::Pending,
        CargoStatus::Received,
        CargoStatus::Inspected,
        CargoStatus::ReadyForShipment,
        CargoStatus::InTransit,
        CargoStatus::AtPort,
        CargoStatus::CustomsHold,
        CargoStatus::Delayed,
        CargoStatus::Damaged,
        CargoStatus::Stored,
        CargoStatus::OutForDelivery,
        CargoStatus::Delivered,
        CargoStatus::Returned,
        CargoStatus::Lost,
        CargoStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CargoStatus::Pending => "PENDING",
            CargoStatus::Received => "RECEIVED",
            CargoStatus::Inspected => "INSPECTED",
            CargoStatus::ReadyForShipment => "READY_FOR_SHIPMENT",
            CargoStatus::InTransit => "IN_TRANSIT",
            CargoStatus::AtPort => "AT_PORT",
            CargoStatus::CustomsHold => "CUSTOMS_HOLD",
            CargoStatus::Delayed => "DELAYED",
            CargoStatus::Damaged => "DAMAGED",
            CargoStatus::Stored => "STORED",
            CargoStatus::OutForDelivery => "OUT_FOR_DELIVERY",
            CargoStatus::Delivered => "DELIVERED",
            CargoStatus::Returned => "RETURNED",
            CargoStatus::Lost => "LOST",
            CargoStatus::Cancelled => "CANCELLED",
        }
    }

    /// No transition leaves these states.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CargoStatus::Returned | CargoStatus::Lost | CargoStatus::Cancelled
        )
    }

    /// Cancelled cargo no longer counts against the schedule's capacity.
    pub fn releases_capacity(&self) -> bool {
        matches!(self, CargoStatus::Cancelled)
    }

    pub fn can_transition_to(&self, next: CargoStatus) -> bool {
        if *self == next {
            return true;
        }
        match self {
            s if s.is_terminal() => false,
            CargoStatus::Delivered => next == CargoStatus::Returned,
            _ => true,
        }
    }

    /// Every accepted status name, in lifecycle order.
    pub fn valid_names() -> Vec<&'static str> {
        Self::ALL.iter().map(|s| s.as_str()).collect()
    }
}

impl fmt::Display for CargoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid cargo status '{0}'")]
pub struct UnknownCargoStatus(pub String);

impl FromStr for CargoStatus {
    type Err = UnknownCargoStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| UnknownCargoStatus(s.to_string()))
    }
}

/// One processor transaction covering any number of tickets and cargo.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: f64,
    pub currency: String,
    pub status: PaymentStatus,
    pub method: String,
    pub paid_at: DateTime<Utc>,
    pub processor_reference: String,
}

/// Share of a payment attributed to one ticket. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TicketPayment {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub ticket_id: Uuid,
    pub amount: f64,
}

/// Share of a payment attributed to one cargo booking. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CargoPayment {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub cargo_id: Uuid,
    pub amount: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parsing_is_case_insensitive() {
        assert_eq!("in_transit".parse::<CargoStatus>().unwrap(), CargoStatus::InTransit);
        assert_eq!(" DELIVERED ".parse::<CargoStatus>().unwrap(), CargoStatus::Delivered);
        assert!("shipped".parse::<CargoStatus>().is_err());
    }

    #[test]
    fn test_status_serde_uses_screaming_case() {
        let json = serde_json::to_string(&CargoStatus::ReadyForShipment).unwrap();
        assert_eq!(json, "\"READY_FOR_SHIPMENT\"");
    }

    #[test]
    fn test_terminal_states_are_final() {
        assert!(!CargoStatus::Cancelled.can_transition_to(CargoStatus::Pending));
        assert!(!CargoStatus::Lost.can_transition_to(CargoStatus::Delivered));
        assert!(CargoStatus::Cancelled.can_transition_to(CargoStatus::Cancelled));
        assert!(CargoStatus::Delivered.can_transition_to(CargoStatus::Returned));
        assert!(!CargoStatus::Delivered.can_transition_to(CargoStatus::InTransit));
        assert!(CargoStatus::Delayed.can_transition_to(CargoStatus::InTransit));
        assert!(CargoStatus::Pending.can_transition_to(CargoStatus::Cancelled));
    }

    #[test]
    fn test_seats_sort_numerically_within_a_row() {
        let mut seats = vec!["B1", "A10", "A2", "A1"];
        seats.sort_by_key(|s| seat_sort_key(s));
        assert_eq!(seats, vec!["A1", "A2", "A10", "B1"]);
    }

    #[test]
    fn test_schedule_filter_windows_are_inclusive() {
        let now = Utc::now();
        let schedule = Schedule {
            id: Uuid::new_v4(),
            vessel_id: Uuid::new_v4(),
            route_id: Uuid::new_v4(),
            departure_time: now,
            arrival_time: now + chrono::Duration::hours(3),
            total_seats: Some(10),
            total_cargo_capacity: 100.0,
            seat_price: 10.0,
            cargo_price_per_kg: 1.0,
            created_at: now,
            updated_at: now,
        };
        assert!(ScheduleFilter::Vessel(schedule.vessel_id).matches(&schedule));
        assert!(!ScheduleFilter::Route(schedule.vessel_id).matches(&schedule));
        assert!(ScheduleFilter::DepartingBetween(now, now).matches(&schedule));
        assert!(!ScheduleFilter::ArrivingBetween(now, now).matches(&schedule));
        assert!(ScheduleFilter::ArrivingBetween(now, schedule.arrival_time).matches(&schedule));
    }

    #[test]
    fn test_cancelled_cargo_releases_weight() {
        let now = Utc::now();
        let mut cargo = Cargo {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            schedule_id: Uuid::new_v4(),
            description: "Coffee sacks".to_string(),
            weight: 120.0,
            tracking_number: "NGV-ABCD1234".to_string(),
            status: CargoStatus::InTransit,
            price: 240.0,
            special_requirements: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(cargo.committed_weight(), 120.0);
        cargo.status = CargoStatus::Cancelled;
        assert_eq!(cargo.committed_weight(), 0.0);
    }
}
