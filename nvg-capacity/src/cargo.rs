use serde::{Deserialize, Serialize};

use crate::capacity::ScheduleCapacity;
use crate::AllocationError;

/// Admitted weight and its price.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CargoQuote {
    pub weight_kg: f64,
    /// `weight_kg * price_per_kg`, unrounded.
    pub price: f64,
}

/// Weight-based admission against a schedule's cargo capacity.
#[derive(Debug, Clone, Copy)]
pub struct CargoAllocator {
    max_weight_kg: f64,
}

impl CargoAllocator {
    pub fn new(max_weight_kg: f64) -> Self {
        Self { max_weight_kg }
    }

    pub fn max_weight_kg(&self) -> f64 {
        self.max_weight_kg
    }

    pub fn validate_weight(&self, weight_kg: f64) -> Result<(), AllocationError> {
        if !weight_kg.is_finite() || weight_kg <= 0.0 {
            return Err(AllocationError::InvalidWeight(weight_kg));
        }
        if weight_kg > self.max_weight_kg {
            return Err(AllocationError::WeightAboveLimit {
                weight: weight_kg,
                max: self.max_weight_kg,
            });
        }
        Ok(())
    }

    pub fn quote(&self, weight_kg: f64, price_per_kg: f64) -> Result<CargoQuote, AllocationError> {
        self.validate_weight(weight_kg)?;
        Ok(CargoQuote {
            weight_kg,
            price: weight_kg * price_per_kg,
        })
    }

    /// Admits a new booking of `weight_kg`.
    pub fn reserve(
        &self,
        capacity: &ScheduleCapacity,
        weight_kg: f64,
        price_per_kg: f64,
    ) -> Result<CargoQuote, AllocationError> {
        self.validate_weight(weight_kg)?;
        if !capacity.can_add_cargo(weight_kg) {
            return Err(AllocationError::InsufficientCapacity {
                available: capacity.available_cargo_kg(),
                requested: weight_kg,
            });
        }
        self.quote(weight_kg, price_per_kg)
    }

    /// Changes the weight of an existing booking.
    ///
    /// `others` must describe the schedule with this cargo's own weight left
    /// out. Shrinking always succeeds; growing is admitted only if the new
    /// weight fits next to everything else.
    pub fn reweigh(
        &self,
        others: &ScheduleCapacity,
        current_kg: f64,
        new_kg: f64,
        price_per_kg: f64,
    ) -> Result<CargoQuote, AllocationError> {
        self.validate_weight(new_kg)?;
        let delta = new_kg - current_kg;
        if delta > 0.0 && !others.can_add_cargo(new_kg) {
            return Err(AllocationError::InsufficientCapacity {
                available: (others.available_cargo_kg() - current_kg).max(0.0),
                requested: delta,
            });
        }
        self.quote(new_kg, price_per_kg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capacity::{SeatSource, SeatTotal};

    fn capacity(total: f64, booked: f64) -> ScheduleCapacity {
        ScheduleCapacity::new(SeatTotal { seats: 10, source: SeatSource::Schedule }, 0, total, booked)
    }

    #[test]
    fn test_reserve_prices_by_weight() {
        let allocator = CargoAllocator::new(50_000.0);
        let quote = allocator.reserve(&capacity(100.0, 0.0), 60.0, 2.5).unwrap();
        assert_eq!(quote, CargoQuote { weight_kg: 60.0, price: 150.0 });
    }

    #[test]
    fn test_reserve_rejects_overflow_with_detail() {
        let allocator = CargoAllocator::new(50_000.0);
        let err = allocator.reserve(&capacity(100.0, 60.0), 60.0, 2.5).unwrap_err();
        assert_eq!(
            err,
            AllocationError::InsufficientCapacity { available: 40.0, requested: 60.0 }
        );
    }

    #[test]
    fn test_weight_bounds() {
        let allocator = CargoAllocator::new(50_000.0);
        let cap = capacity(1_000_000.0, 0.0);
        assert_eq!(allocator.reserve(&cap, 0.0, 1.0), Err(AllocationError::InvalidWeight(0.0)));
        assert_eq!(allocator.reserve(&cap, -3.0, 1.0), Err(AllocationError::InvalidWeight(-3.0)));
        assert!(matches!(
            allocator.reserve(&cap, 50_001.0, 1.0),
            Err(AllocationError::WeightAboveLimit { .. })
        ));
        assert!(allocator.reserve(&cap, 50_000.0, 1.0).is_ok());
    }

    #[test]
    fn test_reweigh_down_always_fits() {
        let allocator = CargoAllocator::new(50_000.0);
        // Schedule is over-full from the point of view of everyone else.
        let others = capacity(100.0, 100.0);
        let quote = allocator.reweigh(&others, 40.0, 25.0, 3.0).unwrap();
        assert_eq!(quote, CargoQuote { weight_kg: 25.0, price: 75.0 });
    }

    #[test]
    fn test_reweigh_up_checks_remaining_capacity() {
        let allocator = CargoAllocator::new(50_000.0);
        // Others hold 50kg of 100kg, this cargo holds 30kg.
        let others = capacity(100.0, 50.0);
        assert!(allocator.reweigh(&others, 30.0, 50.0, 1.0).is_ok());
        assert_eq!(
            allocator.reweigh(&others, 30.0, 60.0, 1.0),
            Err(AllocationError::InsufficientCapacity { available: 20.0, requested: 30.0 })
        );
    }
}
