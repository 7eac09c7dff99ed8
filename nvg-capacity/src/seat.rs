use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

use crate::capacity::ScheduleCapacity;
use crate::AllocationError;

static SEAT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]\d{1,3}$").expect("seat pattern is valid"));

/// A validated seat identifier, upper-cased so "a1" and "A1" are the same seat.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeatNumber(String);

impl SeatNumber {
    pub fn parse(raw: &str) -> Result<Self, AllocationError> {
        let trimmed = raw.trim();
        if !SEAT_PATTERN.is_match(trimmed) {
            return Err(AllocationError::InvalidSeatNumber(raw.to_string()));
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for SeatNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Seat admission against a schedule's current occupancy.
///
/// Makes a decision only; the caller persists the ticket in the same
/// transaction that produced `capacity` and `taken`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeatAllocator;

impl SeatAllocator {
    pub fn new() -> Self {
        Self
    }

    /// `taken` is whether a ticket already exists for (schedule, seat).
    pub fn reserve(
        &self,
        capacity: &ScheduleCapacity,
        seat: &SeatNumber,
        taken: bool,
    ) -> Result<(), AllocationError> {
        if taken {
            return Err(AllocationError::SeatTaken(seat.to_string()));
        }
        if !capacity.can_add_seat() {
            return Err(AllocationError::NoSeatsAvailable {
                total: capacity.total_seats.seats,
            });
        }
        Ok(())
    }

    /// Moving an existing ticket to another seat does not change occupancy,
    /// so only uniqueness is checked.
    pub fn reassign(&self, seat: &SeatNumber, taken: bool) -> Result<(), AllocationError> {
        if taken {
            return Err(AllocationError::SeatTaken(seat.to_string()));
        }
        Ok(())
    }
}
