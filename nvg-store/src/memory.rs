use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nvg_core::{
    seat_sort_key, BookingStore, Cargo, CargoPayment, CargoStatus, Payment, PaymentStatus,
    Schedule, ScheduleFilter, StoreError, StoreResult, StoreTx, Ticket, TicketPayment, Vessel,
    PAYMENT_REFERENCE_CONSTRAINT, SEAT_CONSTRAINT, TRACKING_CONSTRAINT,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
struct State {
    vessels: HashMap<Uuid, Vessel>,
    routes: HashSet<Uuid>,
    owners: HashSet<Uuid>,
    schedules: HashMap<Uuid, Schedule>,
    tickets: HashMap<Uuid, Ticket>,
    cargo: HashMap<Uuid, Cargo>,
    payments: HashMap<Uuid, Payment>,
    ticket_payments: Vec<TicketPayment>,
    cargo_payments: Vec<CargoPayment>,
}

/// In-process store for tests and local runs.
///
/// A transaction holds the single state lock for its whole lifetime and works
/// on a copy, so transactions are fully serialised and an uncommitted one
/// leaves no trace. Unique and foreign-key constraints of the SQL schema are
/// checked on write.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_vessel(&self, name: &str, capacity: i32) -> Uuid {
        let id = Uuid::new_v4();
        let vessel = Vessel { id, name: name.to_string(), capacity };
        self.state.lock().await.vessels.insert(id, vessel);
        id
    }

    pub async fn add_route(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.state.lock().await.routes.insert(id);
        id
    }

    pub async fn add_owner(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.state.lock().await.owners.insert(id);
        id
    }

    /// Inserts a schedule row as-is, skipping service validation. Useful for
    /// legacy rows such as ones without a seat count.
    pub async fn put_schedule(&self, schedule: Schedule) {
        self.state.lock().await.schedules.insert(schedule.id, schedule);
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryTx { guard, staged }))
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<State>,
    staged: State,
}

fn unique(constraint: &str) -> StoreError {
    StoreError::UniqueViolation { constraint: constraint.to_string() }
}

impl MemoryTx {
    fn seat_clash(&self, id: Uuid, schedule_id: Uuid, seat_number: &str) -> bool {
        self.staged
            .tickets
            .values()
            .any(|t| t.id != id && t.schedule_id == schedule_id && t.seat_number == seat_number)
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn vessel(&mut self, id: Uuid) -> StoreResult<Option<Vessel>> {
        Ok(self.staged.vessels.get(&id).cloned())
    }

    async fn lock_vessel(&mut self, id: Uuid) -> StoreResult<Option<Vessel>> {
        Ok(self.staged.vessels.get(&id).cloned())
    }

    async fn route_exists(&mut self, id: Uuid) -> StoreResult<bool> {
        Ok(self.staged.routes.contains(&id))
    }

    async fn owner_exists(&mut self, id: Uuid) -> StoreResult<bool> {
        Ok(self.staged.owners.contains(&id))
    }

    async fn schedule(&mut self, id: Uuid) -> StoreResult<Option<Schedule>> {
        Ok(self.staged.schedules.get(&id).cloned())
    }

    async fn lock_schedule(&mut self, id: Uuid) -> StoreResult<Option<Schedule>> {
        // The whole state is already locked by this transaction.
        Ok(self.staged.schedules.get(&id).cloned())
    }

    async fn list_schedules(&mut self) -> StoreResult<Vec<Schedule>> {
        let mut schedules: Vec<Schedule> = self.staged.schedules.values().cloned().collect();
        schedules.sort_by_key(|s| s.departure_time);
        Ok(schedules)
    }

    async fn find_schedules(&mut self, filter: &ScheduleFilter) -> StoreResult<Vec<Schedule>> {
        let mut schedules: Vec<Schedule> = self
            .staged
            .schedules
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        schedules.sort_by_key(|s| s.departure_time);
        Ok(schedules)
    }

    async fn vessel_busy(
        &mut self,
        vessel_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> StoreResult<bool> {
        Ok(self.staged.schedules.values().any(|s| {
            s.vessel_id == vessel_id
                && Some(s.id) != exclude
                && s.departure_time < to
                && s.arrival_time > from
        }))
    }

    async fn insert_schedule(&mut self, schedule: &Schedule) -> StoreResult<()> {
        if !self.staged.vessels.contains_key(&schedule.vessel_id) {
            return Err(StoreError::MissingReference("schedules_vessel_id_fkey".into()));
        }
        if !self.staged.routes.contains(&schedule.route_id) {
            return Err(StoreError::MissingReference("schedules_route_id_fkey".into()));
        }
        self.staged.schedules.insert(schedule.id, schedule.clone());
        Ok(())
    }

    async fn update_schedule(&mut self, schedule: &Schedule) -> StoreResult<()> {
        if let Some(existing) = self.staged.schedules.get_mut(&schedule.id) {
            *existing = schedule.clone();
        }
        Ok(())
    }

    async fn delete_schedule(&mut self, id: Uuid) -> StoreResult<bool> {
        if self.staged.schedules.remove(&id).is_none() {
            return Ok(false);
        }
        let state = &mut self.staged;
        state.tickets.retain(|_, t| t.schedule_id != id);
        state.cargo.retain(|_, c| c.schedule_id != id);
        let tickets = &state.tickets;
        let cargo = &state.cargo;
        state.ticket_payments.retain(|l| tickets.contains_key(&l.ticket_id));
        state.cargo_payments.retain(|l| cargo.contains_key(&l.cargo_id));
        Ok(true)
    }

    async fn ticket(&mut self, id: Uuid) -> StoreResult<Option<Ticket>> {
        Ok(self.staged.tickets.get(&id).cloned())
    }

    async fn list_tickets(&mut self, paid: Option<bool>) -> StoreResult<Vec<Ticket>> {
        let mut tickets: Vec<Ticket> = self
            .staged
            .tickets
            .values()
            .filter(|t| paid.is_none_or(|p| t.paid == p))
            .cloned()
            .collect();
        tickets.sort_by_key(|t| t.created_at);
        Ok(tickets)
    }

    async fn tickets_for_schedule(&mut self, schedule_id: Uuid) -> StoreResult<Vec<Ticket>> {
        let mut tickets: Vec<Ticket> = self
            .staged
            .tickets
            .values()
            .filter(|t| t.schedule_id == schedule_id)
            .cloned()
            .collect();
        tickets.sort_by_key(|t| seat_sort_key(&t.seat_number));
        Ok(tickets)
    }

    async fn count_tickets(&mut self, schedule_id: Uuid) -> StoreResult<i64> {
        Ok(self.staged.tickets.values().filter(|t| t.schedule_id == schedule_id).count() as i64)
    }

    async fn seat_taken(&mut self, schedule_id: Uuid, seat_number: &str) -> StoreResult<bool> {
        Ok(self
            .staged
            .tickets
            .values()
            .any(|t| t.schedule_id == schedule_id && t.seat_number == seat_number))
    }

    async fn insert_ticket(&mut self, ticket: &Ticket) -> StoreResult<()> {
        if !self.staged.schedules.contains_key(&ticket.schedule_id) {
            return Err(StoreError::MissingReference("tickets_schedule_id_fkey".into()));
        }
        if self.seat_clash(ticket.id, ticket.schedule_id, &ticket.seat_number) {
            return Err(unique(SEAT_CONSTRAINT));
        }
        self.staged.tickets.insert(ticket.id, ticket.clone());
        Ok(())
    }

    async fn set_ticket_seat(
        &mut self,
        id: Uuid,
        seat_number: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let Some(schedule_id) = self.staged.tickets.get(&id).map(|t| t.schedule_id) else {
            return Ok(false);
        };
        if self.seat_clash(id, schedule_id, seat_number) {
            return Err(unique(SEAT_CONSTRAINT));
        }
        if let Some(ticket) = self.staged.tickets.get_mut(&id) {
            ticket.seat_number = seat_number.to_string();
            ticket.updated_at = at;
        }
        Ok(true)
    }

    async fn set_ticket_paid(&mut self, id: Uuid, paid: bool, at: DateTime<Utc>) -> StoreResult<bool> {
        match self.staged.tickets.get_mut(&id) {
            Some(ticket) => {
                ticket.paid = paid;
                ticket.updated_at = at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_ticket(&mut self, id: Uuid) -> StoreResult<bool> {
        let removed = self.staged.tickets.remove(&id).is_some();
        self.staged.ticket_payments.retain(|l| l.ticket_id != id);
        Ok(removed)
    }

    async fn mark_tickets_paid(&mut self, ids: &[Uuid]) -> StoreResult<Vec<Uuid>> {
        let now = Utc::now();
        let mut updated = Vec::new();
        for id in ids {
            if let Some(ticket) = self.staged.tickets.get_mut(id) {
                ticket.paid = true;
                ticket.updated_at = now;
                updated.push(*id);
            }
        }
        Ok(updated)
    }

    async fn cargo(&mut self, id: Uuid) -> StoreResult<Option<Cargo>> {
        Ok(self.staged.cargo.get(&id).cloned())
    }

    async fn list_cargo(&mut self, status: Option<CargoStatus>) -> StoreResult<Vec<Cargo>> {
        let mut cargo: Vec<Cargo> = self
            .staged
            .cargo
            .values()
            .filter(|c| status.is_none_or(|s| c.status == s))
            .cloned()
            .collect();
        cargo.sort_by_key(|c| c.created_at);
        Ok(cargo)
    }

    async fn cargo_by_tracking(&mut self, tracking_number: &str) -> StoreResult<Option<Cargo>> {
        Ok(self
            .staged
            .cargo
            .values()
            .find(|c| c.tracking_number == tracking_number)
            .cloned())
    }

    async fn cargo_for_schedule(&mut self, schedule_id: Uuid) -> StoreResult<Vec<Cargo>> {
        let mut cargo: Vec<Cargo> = self
            .staged
            .cargo
            .values()
            .filter(|c| c.schedule_id == schedule_id)
            .cloned()
            .collect();
        cargo.sort_by_key(|c| c.created_at);
        Ok(cargo)
    }

    async fn cargo_for_owner(&mut self, owner_id: Uuid) -> StoreResult<Vec<Cargo>> {
        let mut cargo: Vec<Cargo> = self
            .staged
            .cargo
            .values()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect();
        cargo.sort_by_key(|c| c.created_at);
        Ok(cargo)
    }

    async fn booked_cargo_weight(
        &mut self,
        schedule_id: Uuid,
        excluding: Option<Uuid>,
    ) -> StoreResult<f64> {
        Ok(self
            .staged
            .cargo
            .values()
            .filter(|c| c.schedule_id == schedule_id && Some(c.id) != excluding)
            .map(Cargo::committed_weight)
            .sum())
    }

    async fn insert_cargo(&mut self, cargo: &Cargo) -> StoreResult<()> {
        if !self.staged.owners.contains(&cargo.owner_id) {
            return Err(StoreError::MissingReference("cargo_owner_id_fkey".into()));
        }
        if !self.staged.schedules.contains_key(&cargo.schedule_id) {
            return Err(StoreError::MissingReference("cargo_schedule_id_fkey".into()));
        }
        if self
            .staged
            .cargo
            .values()
            .any(|c| c.tracking_number == cargo.tracking_number)
        {
            return Err(unique(TRACKING_CONSTRAINT));
        }
        self.staged.cargo.insert(cargo.id, cargo.clone());
        Ok(())
    }

    async fn set_cargo_status(
        &mut self,
        id: Uuid,
        status: CargoStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        match self.staged.cargo.get_mut(&id) {
            Some(cargo) => {
                cargo.status = status;
                cargo.updated_at = at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_cargo_weight(
        &mut self,
        id: Uuid,
        weight: f64,
        price: f64,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        match self.staged.cargo.get_mut(&id) {
            Some(cargo) => {
                cargo.weight = weight;
                cargo.price = price;
                cargo.updated_at = at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_cargo(&mut self, id: Uuid) -> StoreResult<bool> {
        let removed = self.staged.cargo.remove(&id).is_some();
        self.staged.cargo_payments.retain(|l| l.cargo_id != id);
        Ok(removed)
    }

    async fn insert_payment(
        &mut self,
        payment: &Payment,
        tickets: &[TicketPayment],
        cargo: &[CargoPayment],
    ) -> StoreResult<()> {
        if self
            .staged
            .payments
            .values()
            .any(|p| p.processor_reference == payment.processor_reference)
        {
            return Err(unique(PAYMENT_REFERENCE_CONSTRAINT));
        }
        if tickets.iter().any(|l| !self.staged.tickets.contains_key(&l.ticket_id)) {
            return Err(StoreError::MissingReference("ticket_payments_ticket_id_fkey".into()));
        }
        if cargo.iter().any(|l| !self.staged.cargo.contains_key(&l.cargo_id)) {
            return Err(StoreError::MissingReference("cargo_payments_cargo_id_fkey".into()));
        }
        self.staged.payments.insert(payment.id, payment.clone());
        self.staged.ticket_payments.extend_from_slice(tickets);
        self.staged.cargo_payments.extend_from_slice(cargo);
        Ok(())
    }

    async fn payment(&mut self, id: Uuid) -> StoreResult<Option<Payment>> {
        Ok(self.staged.payments.get(&id).cloned())
    }

    async fn payment_by_reference(&mut self, reference: &str) -> StoreResult<Option<Payment>> {
        Ok(self
            .staged
            .payments
            .values()
            .find(|p| p.processor_reference == reference)
            .cloned())
    }

    async fn update_payment_status(&mut self, id: Uuid, status: &PaymentStatus) -> StoreResult<()> {
        if let Some(payment) = self.staged.payments.get_mut(&id) {
            payment.status = status.clone();
        }
        Ok(())
    }

    async fn payment_links(
        &mut self,
        payment_id: Uuid,
    ) -> StoreResult<(Vec<TicketPayment>, Vec<CargoPayment>)> {
        let tickets = self
            .staged
            .ticket_payments
            .iter()
            .filter(|l| l.payment_id == payment_id)
            .cloned()
            .collect();
        let cargo = self
            .staged
            .cargo_payments
            .iter()
            .filter(|l| l.payment_id == payment_id)
            .cloned()
            .collect();
        Ok((tickets, cargo))
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryTx { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}
