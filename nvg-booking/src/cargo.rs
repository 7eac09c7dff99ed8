use chrono::Utc;
use nvg_capacity::UtilizationLevel;
use nvg_core::{Cargo, CargoStatus, TRACKING_CONSTRAINT};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{BookingError, BookingResult};
use crate::service::BookingService;
use crate::validation;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CargoBooking {
    pub owner_id: Uuid,
    pub schedule_id: Uuid,
    pub description: String,
    pub weight: f64,
    #[serde(default)]
    pub special_requirements: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CargoCapacityInfo {
    pub schedule_id: Uuid,
    pub total_capacity: f64,
    pub booked_weight: f64,
    pub available_capacity: f64,
    pub utilization_percentage: f64,
    pub utilization_level: UtilizationLevel,
}

impl BookingService {
    /// Books cargo on a schedule under the schedule lock, retrying tracking
    /// number collisions with fresh numbers.
    pub async fn book_cargo(&self, req: CargoBooking) -> BookingResult<Cargo> {
        validation::cargo_details(&req.description, req.special_requirements.as_deref())?;
        self.cargo.validate_weight(req.weight)?;

        let mut tx = self.store.begin().await?;
        if !tx.owner_exists(req.owner_id).await? {
            return Err(BookingError::OwnerNotFound(req.owner_id));
        }
        let schedule = self.locked_schedule(tx.as_mut(), req.schedule_id).await?;
        let capacity = self.load_capacity(tx.as_mut(), &schedule, None).await?;
        let quote = self.cargo.reserve(&capacity, req.weight, schedule.cargo_price_per_kg)?;

        let now = Utc::now();
        let mut cargo = Cargo {
            id: Uuid::new_v4(),
            owner_id: req.owner_id,
            schedule_id: schedule.id,
            description: req.description,
            weight: quote.weight_kg,
            tracking_number: String::new(),
            status: CargoStatus::Pending,
            price: quote.price,
            special_requirements: req.special_requirements,
            created_at: now,
            updated_at: now,
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            cargo.tracking_number = self.tracking.generate();
            match tx.insert_cargo(&cargo).await {
                Ok(()) => break,
                Err(e) if e.violates(TRACKING_CONSTRAINT) && attempt < self.rules.tracking_attempts => {
                    warn!(
                        "Tracking number {} already in use, retrying ({}/{})",
                        cargo.tracking_number, attempt, self.rules.tracking_attempts
                    );
                }
                Err(e) if e.violates(TRACKING_CONSTRAINT) => {
                    return Err(BookingError::Conflict(format!(
                        "Could not allocate a unique tracking number after {} attempts",
                        attempt
                    )));
                }
                Err(e) => return Err(e.into()),
            }
        }
        tx.commit().await?;

        info!(
            "Cargo {} booked: {} kg on schedule {} as {} ({} kg left)",
            cargo.id,
            cargo.weight,
            schedule.id,
            cargo.tracking_number,
            capacity.available_cargo_kg() - cargo.weight
        );
        Ok(cargo)
    }

    pub async fn reweigh_cargo(&self, id: Uuid, new_weight: f64) -> BookingResult<Cargo> {
        self.cargo.validate_weight(new_weight)?;

        let mut tx = self.store.begin().await?;
        let schedule_id = tx
            .cargo(id)
            .await?
            .ok_or_else(|| BookingError::CargoNotFound(id.to_string()))?
            .schedule_id;
        let schedule = self.locked_schedule(tx.as_mut(), schedule_id).await?;

        // Re-read under the lock so the current weight is authoritative.
        let mut cargo = tx
            .cargo(id)
            .await?
            .ok_or_else(|| BookingError::CargoNotFound(id.to_string()))?;

        let quote = if cargo.status.releases_capacity() {
            self.cargo.quote(new_weight, schedule.cargo_price_per_kg)?
        } else {
            let others = self.load_capacity(tx.as_mut(), &schedule, Some(id)).await?;
            self.cargo
                .reweigh(&others, cargo.weight, new_weight, schedule.cargo_price_per_kg)?
        };

        let previous = cargo.weight;
        cargo.weight = quote.weight_kg;
        cargo.price = quote.price;
        cargo.updated_at = Utc::now();
        if !tx
            .set_cargo_weight(id, cargo.weight, cargo.price, cargo.updated_at)
            .await?
        {
            return Err(BookingError::CargoNotFound(id.to_string()));
        }
        tx.commit().await?;

        info!(
            "Cargo {} reweighed from {} kg to {} kg, price now {}",
            cargo.id, previous, cargo.weight, cargo.price
        );
        Ok(cargo)
    }

    pub async fn update_cargo_status(&self, id: Uuid, status: &str) -> BookingResult<Cargo> {
        let next: CargoStatus = status
            .parse()
            .map_err(|_| BookingError::InvalidStatus(status.to_string()))?;

        let mut tx = self.store.begin().await?;
        let schedule_id = tx
            .cargo(id)
            .await?
            .ok_or_else(|| BookingError::CargoNotFound(id.to_string()))?
            .schedule_id;

        // Cancelling releases weight, so this serialises with other admissions.
        tx.lock_schedule(schedule_id).await?;
        let mut cargo = tx
            .cargo(id)
            .await?
            .ok_or_else(|| BookingError::CargoNotFound(id.to_string()))?;

        if cargo.status == next {
            return Ok(cargo);
        }
        if !cargo.status.can_transition_to(next) {
            return Err(BookingError::InvalidTransition {
                from: cargo.status,
                to: next,
            });
        }

        let previous = cargo.status;
        cargo.status = next;
        cargo.updated_at = Utc::now();
        if !tx.set_cargo_status(id, next, cargo.updated_at).await? {
            return Err(BookingError::CargoNotFound(id.to_string()));
        }
        tx.commit().await?;

        info!("Cargo {} moved from {} to {}", cargo.id, previous, next);
        if next.releases_capacity() {
            info!(
                "Released {} kg on schedule {}",
                cargo.weight, cargo.schedule_id
            );
        }
        Ok(cargo)
    }

    pub async fn delete_cargo(&self, id: Uuid) -> BookingResult<()> {
        let mut tx = self.store.begin().await?;
        let cargo = tx
            .cargo(id)
            .await?
            .ok_or_else(|| BookingError::CargoNotFound(id.to_string()))?;
        self.locked_schedule(tx.as_mut(), cargo.schedule_id).await?;

        if !tx.delete_cargo(id).await? {
            return Err(BookingError::CargoNotFound(id.to_string()));
        }
        tx.commit().await?;

        info!("Cargo {} ({}) deleted", id, cargo.tracking_number);
        Ok(())
    }

    pub async fn get_cargo(&self, id: Uuid) -> BookingResult<Cargo> {
        let mut tx = self.store.begin().await?;
        tx.cargo(id)
            .await?
            .ok_or_else(|| BookingError::CargoNotFound(id.to_string()))
    }

    pub async fn find_by_tracking(&self, tracking_number: &str) -> BookingResult<Cargo> {
        let wanted = tracking_number.trim().to_ascii_uppercase();
        let mut tx = self.store.begin().await?;
        tx.cargo_by_tracking(&wanted)
            .await?
            .ok_or(BookingError::CargoNotFound(wanted))
    }

    pub async fn list_cargo(&self) -> BookingResult<Vec<Cargo>> {
        let mut tx = self.store.begin().await?;
        Ok(tx.list_cargo(None).await?)
    }

    pub async fn cargo_by_status(&self, status: &str) -> BookingResult<Vec<Cargo>> {
        let wanted: CargoStatus = status
            .parse()
            .map_err(|_| BookingError::InvalidStatus(status.to_string()))?;
        let mut tx = self.store.begin().await?;
        Ok(tx.list_cargo(Some(wanted)).await?)
    }

    pub async fn cargo_for_schedule(&self, schedule_id: Uuid) -> BookingResult<Vec<Cargo>> {
        let mut tx = self.store.begin().await?;
        if tx.schedule(schedule_id).await?.is_none() {
            return Err(BookingError::ScheduleNotFound(schedule_id));
        }
        Ok(tx.cargo_for_schedule(schedule_id).await?)
    }

    pub async fn cargo_for_owner(&self, owner_id: Uuid) -> BookingResult<Vec<Cargo>> {
        let mut tx = self.store.begin().await?;
        if !tx.owner_exists(owner_id).await? {
            return Err(BookingError::OwnerNotFound(owner_id));
        }
        Ok(tx.cargo_for_owner(owner_id).await?)
    }

    pub async fn cargo_capacity(&self, schedule_id: Uuid) -> BookingResult<CargoCapacityInfo> {
        let mut tx = self.store.begin().await?;
        let schedule = tx
            .schedule(schedule_id)
            .await?
            .ok_or(BookingError::ScheduleNotFound(schedule_id))?;
        let capacity = self.load_capacity(tx.as_mut(), &schedule, None).await?;

        Ok(CargoCapacityInfo {
            schedule_id,
            total_capacity: capacity.total_cargo_kg,
            booked_weight: capacity.booked_cargo_kg,
            available_capacity: capacity.available_cargo_kg(),
            utilization_percentage: capacity.cargo_utilization(),
            utilization_level: capacity.cargo_utilization_level(),
        })
    }

    pub fn valid_statuses(&self) -> Vec<&'static str> {
        CargoStatus::valid_names()
    }
}
