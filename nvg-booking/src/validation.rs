use chrono::{DateTime, Utc};
use nvg_core::FieldError;
use regex::Regex;
use std::sync::LazyLock;

use crate::error::{BookingError, BookingResult};
use crate::schedules::ScheduleInput;

const MAX_DESCRIPTION_LEN: usize = 500;

static SPECIAL_REQUIREMENTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{3}-\d{4}-[A-Z]{2}$").expect("requirements pattern is valid"));

fn finish(errors: Vec<FieldError>) -> BookingResult<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(BookingError::Validation(errors))
    }
}

pub fn cargo_details(description: &str, special_requirements: Option<&str>) -> BookingResult<()> {
    let mut errors = Vec::new();

    if description.trim().is_empty() {
        errors.push(FieldError::new("description", "Description is required"));
    } else if description.chars().count() > MAX_DESCRIPTION_LEN {
        errors.push(FieldError::new("description", "Description cannot exceed 500 characters"));
    }

    if let Some(code) = special_requirements {
        if !SPECIAL_REQUIREMENTS.is_match(code) {
            errors.push(FieldError::new(
                "specialRequirements",
                "Special requirements code must be in format 'ABC-1234-XY'",
            ));
        }
    }

    finish(errors)
}

pub fn schedule_input(input: &ScheduleInput, now: DateTime<Utc>) -> BookingResult<()> {
    let mut errors = Vec::new();

    if input.departure_time <= now {
        errors.push(FieldError::new("departureTime", "Departure time must be in the future"));
    }
    if input.arrival_time <= now {
        errors.push(FieldError::new("arrivalTime", "Arrival time must be in the future"));
    }
    if input.arrival_time <= input.departure_time {
        errors.push(FieldError::new("arrivalTime", "Arrival time must be after departure time"));
    }
    if input.total_seats <= 0 {
        errors.push(FieldError::new("totalSeats", "Total seats must be positive"));
    }
    if !input.total_cargo_capacity.is_finite() || input.total_cargo_capacity <= 0.0 {
        errors.push(FieldError::new("totalCargoCapacity", "Total cargo capacity must be positive"));
    }
    if !input.seat_price.is_finite() || input.seat_price < 0.0 {
        errors.push(FieldError::new("seatPrice", "Seat price cannot be negative"));
    }
    if !input.cargo_price_per_kg.is_finite() || input.cargo_price_per_kg < 0.0 {
        errors.push(FieldError::new("cargoPricePerKg", "Cargo price per kg cannot be negative"));
    }

    finish(errors)
}

pub fn price(field: &str, value: f64) -> BookingResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(BookingError::invalid(field, "Price cannot be negative"))
    }
}

pub fn currency(code: &str) -> BookingResult<()> {
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(())
    } else {
        Err(BookingError::invalid("currency", "Currency must be a three-letter ISO code"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn input(now: DateTime<Utc>) -> ScheduleInput {
        ScheduleInput {
            vessel_id: Uuid::new_v4(),
            route_id: Uuid::new_v4(),
            departure_time: now + Duration::days(2),
            arrival_time: now + Duration::days(2) + Duration::hours(4),
            total_seats: 40,
            total_cargo_capacity: 2_000.0,
            seat_price: 15.0,
            cargo_price_per_kg: 1.5,
        }
    }

    fn fields(result: BookingResult<()>) -> Vec<String> {
        match result {
            Err(BookingError::Validation(errors)) => errors.into_iter().map(|e| e.field).collect(),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_special_requirements_code() {
        assert!(cargo_details("Frozen fish", Some("REF-1234-CX")).is_ok());
        assert!(cargo_details("Frozen fish", None).is_ok());
        assert_eq!(fields(cargo_details("Frozen fish", Some("REF-12-C"))), vec!["specialRequirements"]);
        assert_eq!(fields(cargo_details("  ", None)), vec!["description"]);
    }

    #[test]
    fn test_schedule_time_window() {
        let now = Utc::now();
        assert!(schedule_input(&input(now), now).is_ok());

        let mut reversed = input(now);
        reversed.arrival_time = reversed.departure_time - Duration::hours(1);
        assert_eq!(fields(schedule_input(&reversed, now)), vec!["arrivalTime"]);

        let mut past = input(now);
        past.departure_time = now - Duration::hours(1);
        assert_eq!(fields(schedule_input(&past, now)), vec!["departureTime"]);
    }

    #[test]
    fn test_schedule_positivity() {
        let now = Utc::now();
        let mut bad = input(now);
        bad.total_seats = 0;
        bad.total_cargo_capacity = -1.0;
        bad.seat_price = -5.0;
        assert_eq!(
            fields(schedule_input(&bad, now)),
            vec!["totalSeats", "totalCargoCapacity", "seatPrice"]
        );
    }

    #[test]
    fn test_currency() {
        assert!(currency("usd").is_ok());
        assert!(currency("RWF").is_ok());
        assert!(currency("dollars").is_err());
    }
}
