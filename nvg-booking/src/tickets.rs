use chrono::Utc;
use nvg_capacity::{ScheduleCapacity, SeatNumber, SeatSource};
use nvg_core::Ticket;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::{BookingError, BookingResult};
use crate::service::{seat_conflict, BookingService};
use crate::validation;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketBooking {
    pub schedule_id: Uuid,
    pub seat_number: String,
    #[serde(default)]
    pub paid: bool,
    /// Overrides the schedule's seat price when present.
    #[serde(default)]
    pub price: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketUpdate {
    pub seat_number: Option<String>,
    pub paid: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatInfo {
    pub schedule_id: Uuid,
    pub total_seats: i32,
    pub seat_source: SeatSource,
    pub booked_seats: i64,
    pub available_seats: i64,
    pub booked_seat_numbers: Vec<String>,
}

impl BookingService {
    pub async fn book_ticket(&self, req: TicketBooking) -> BookingResult<Ticket> {
        let seat = SeatNumber::parse(&req.seat_number)?;
        if let Some(price) = req.price {
            validation::price("price", price)?;
        }

        let mut tx = self.store.begin().await?;
        let schedule = self.locked_schedule(tx.as_mut(), req.schedule_id).await?;
        let capacity = self.load_capacity(tx.as_mut(), &schedule, None).await?;
        let taken = tx.seat_taken(schedule.id, seat.as_str()).await?;

        self.seats.reserve(&capacity, &seat, taken)?;

        let now = Utc::now();
        let ticket = Ticket {
            id: Uuid::new_v4(),
            schedule_id: schedule.id,
            seat_number: seat.as_str().to_string(),
            price: req.price.unwrap_or(schedule.seat_price),
            paid: req.paid,
            created_at: now,
            updated_at: now,
        };

        tx.insert_ticket(&ticket)
            .await
            .map_err(|e| seat_conflict(e, &seat))?;
        tx.commit().await?;

        info!(
            "Ticket {} booked: schedule {} seat {} ({} seats left)",
            ticket.id,
            schedule.id,
            ticket.seat_number,
            capacity.available_seats() - 1
        );
        Ok(ticket)
    }

    pub async fn update_ticket(&self, id: Uuid, update: TicketUpdate) -> BookingResult<Ticket> {
        let new_seat = update
            .seat_number
            .as_deref()
            .map(SeatNumber::parse)
            .transpose()?;

        let mut tx = self.store.begin().await?;
        let schedule_id = tx
            .ticket(id)
            .await?
            .ok_or(BookingError::TicketNotFound(id))?
            .schedule_id;

        // Seat moves compete with new bookings on the same schedule.
        self.locked_schedule(tx.as_mut(), schedule_id).await?;
        let current = tx.ticket(id).await?.ok_or(BookingError::TicketNotFound(id))?;
        let now = Utc::now();

        if let Some(seat) = new_seat.as_ref().filter(|s| s.as_str() != current.seat_number) {
            let taken = tx.seat_taken(schedule_id, seat.as_str()).await?;
            self.seats.reassign(seat, taken)?;
            let moved = tx
                .set_ticket_seat(id, seat.as_str(), now)
                .await
                .map_err(|e| seat_conflict(e, seat))?;
            if !moved {
                return Err(BookingError::TicketNotFound(id));
            }
        }
        // Paid is written only when sent; a seat move leaves it alone.
        if let Some(paid) = update.paid {
            if !tx.set_ticket_paid(id, paid, now).await? {
                return Err(BookingError::TicketNotFound(id));
            }
        }
        let ticket = tx.ticket(id).await?.ok_or(BookingError::TicketNotFound(id))?;
        tx.commit().await?;

        info!("Ticket {} updated: seat {} paid {}", ticket.id, ticket.seat_number, ticket.paid);
        Ok(ticket)
    }

    pub async fn delete_ticket(&self, id: Uuid) -> BookingResult<()> {
        let mut tx = self.store.begin().await?;
        let ticket = tx.ticket(id).await?.ok_or(BookingError::TicketNotFound(id))?;
        self.locked_schedule(tx.as_mut(), ticket.schedule_id).await?;

        if !tx.delete_ticket(id).await? {
            return Err(BookingError::TicketNotFound(id));
        }
        tx.commit().await?;

        info!("Ticket {} deleted, seat {} released", id, ticket.seat_number);
        Ok(())
    }

    pub async fn get_ticket(&self, id: Uuid) -> BookingResult<Ticket> {
        let mut tx = self.store.begin().await?;
        tx.ticket(id).await?.ok_or(BookingError::TicketNotFound(id))
    }

    pub async fn list_tickets(&self) -> BookingResult<Vec<Ticket>> {
        let mut tx = self.store.begin().await?;
        Ok(tx.list_tickets(None).await?)
    }

    pub async fn tickets_by_paid(&self, paid: bool) -> BookingResult<Vec<Ticket>> {
        let mut tx = self.store.begin().await?;
        Ok(tx.list_tickets(Some(paid)).await?)
    }

    pub async fn tickets_for_schedule(&self, schedule_id: Uuid) -> BookingResult<Vec<Ticket>> {
        let mut tx = self.store.begin().await?;
        if tx.schedule(schedule_id).await?.is_none() {
            return Err(BookingError::ScheduleNotFound(schedule_id));
        }
        Ok(tx.tickets_for_schedule(schedule_id).await?)
    }

    pub async fn seat_info(&self, schedule_id: Uuid) -> BookingResult<SeatInfo> {
        let mut tx = self.store.begin().await?;
        let schedule = tx
            .schedule(schedule_id)
            .await?
            .ok_or(BookingError::ScheduleNotFound(schedule_id))?;
        let total = self.seat_total(tx.as_mut(), &schedule).await?;
        let tickets = tx.tickets_for_schedule(schedule_id).await?;

        let capacity = ScheduleCapacity::new(total, tickets.len() as i64, schedule.total_cargo_capacity, 0.0);

        Ok(SeatInfo {
            schedule_id,
            total_seats: total.seats,
            seat_source: total.source,
            booked_seats: capacity.booked_seats,
            available_seats: capacity.available_seats(),
            booked_seat_numbers: tickets.into_iter().map(|t| t.seat_number).collect(),
        })
    }
}
