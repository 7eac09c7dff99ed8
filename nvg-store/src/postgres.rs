use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nvg_core::{
    BookingStore, Cargo, CargoPayment, CargoStatus, Payment, PaymentStatus, Schedule,
    ScheduleFilter, StoreError, StoreResult, StoreTx, Ticket, TicketPayment, Vessel,
};
use sqlx::{Connection, PgPool, Postgres, Transaction};
use tracing::error;
use uuid::Uuid;

/// PostgreSQL-backed store. One `sqlx` transaction per [`StoreTx`].
#[derive(Clone)]
pub struct PgBookingStore {
    pool: PgPool,
}

impl PgBookingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookingStore for PgBookingStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await.map_err(store_error)?;
        Ok(Box::new(PgTx { tx }))
    }
}

struct PgTx {
    tx: Transaction<'static, Postgres>,
}

fn store_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        let constraint = db.constraint().unwrap_or_default().to_string();
        if db.is_unique_violation() {
            return StoreError::UniqueViolation { constraint };
        }
        if db.is_foreign_key_violation() {
            return StoreError::MissingReference(constraint);
        }
    }
    error!("Database error: {}", err);
    StoreError::Backend(err.to_string())
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct VesselRow {
    id: Uuid,
    name: String,
    capacity: i32,
}

#[derive(sqlx::FromRow)]
struct ScheduleRow {
    id: Uuid,
    vessel_id: Uuid,
    route_id: Uuid,
    departure_time: DateTime<Utc>,
    arrival_time: DateTime<Utc>,
    total_seats: Option<i32>,
    total_cargo_capacity: f64,
    seat_price: f64,
    cargo_price_per_kg: f64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ScheduleRow> for Schedule {
    fn from(r: ScheduleRow) -> Self {
        Schedule {
            id: r.id,
            vessel_id: r.vessel_id,
            route_id: r.route_id,
            departure_time: r.departure_time,
            arrival_time: r.arrival_time,
            total_seats: r.total_seats,
            total_cargo_capacity: r.total_cargo_capacity,
            seat_price: r.seat_price,
            cargo_price_per_kg: r.cargo_price_per_kg,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TicketRow {
    id: Uuid,
    schedule_id: Uuid,
    seat_number: String,
    price: f64,
    paid: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TicketRow> for Ticket {
    fn from(r: TicketRow) -> Self {
        Ticket {
            id: r.id,
            schedule_id: r.schedule_id,
            seat_number: r.seat_number,
            price: r.price,
            paid: r.paid,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CargoRow {
    id: Uuid,
    owner_id: Uuid,
    schedule_id: Uuid,
    description: String,
    weight: f64,
    tracking_number: String,
    status: String,
    price: f64,
    special_requirements: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CargoRow> for Cargo {
    type Error = StoreError;

    fn try_from(r: CargoRow) -> Result<Self, Self::Error> {
        let status = r.status.parse().map_err(|_| {
            StoreError::Backend(format!("cargo {} has unknown status '{}'", r.id, r.status))
        })?;
        Ok(Cargo {
            id: r.id,
            owner_id: r.owner_id,
            schedule_id: r.schedule_id,
            description: r.description,
            weight: r.weight,
            tracking_number: r.tracking_number,
            status,
            price: r.price,
            special_requirements: r.special_requirements,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    user_id: Uuid,
    amount: f64,
    currency: String,
    status: String,
    method: String,
    paid_at: DateTime<Utc>,
    processor_reference: String,
}

impl From<PaymentRow> for Payment {
    fn from(r: PaymentRow) -> Self {
        Payment {
            id: r.id,
            user_id: r.user_id,
            amount: r.amount,
            currency: r.currency,
            status: PaymentStatus::from(r.status),
            method: r.method,
            paid_at: r.paid_at,
            processor_reference: r.processor_reference,
        }
    }
}

#[derive(sqlx::FromRow)]
struct LinkRow {
    id: Uuid,
    payment_id: Uuid,
    item_id: Uuid,
    amount: f64,
}

const SCHEDULE_COLUMNS: &str = "id, vessel_id, route_id, departure_time, arrival_time, total_seats, \
     total_cargo_capacity, seat_price, cargo_price_per_kg, created_at, updated_at";
const TICKET_COLUMNS: &str = "id, schedule_id, seat_number, price, paid, created_at, updated_at";
const CARGO_COLUMNS: &str = "id, owner_id, schedule_id, description, weight, tracking_number, status, \
     price, special_requirements, created_at, updated_at";
/// Row letter first, then the numeric seat position.
const SEAT_ORDER: &str =
    r"LEFT(seat_number, 1), NULLIF(regexp_replace(seat_number, '\D', '', 'g'), '')::INT, seat_number";
const PAYMENT_COLUMNS: &str =
    "id, user_id, amount, currency, status, method, paid_at, processor_reference";

fn cargo_rows(rows: Vec<CargoRow>) -> StoreResult<Vec<Cargo>> {
    rows.into_iter().map(Cargo::try_from).collect()
}

#[async_trait]
impl StoreTx for PgTx {
    async fn vessel(&mut self, id: Uuid) -> StoreResult<Option<Vessel>> {
        let row = sqlx::query_as::<_, VesselRow>("SELECT id, name, capacity FROM vessels WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(store_error)?;
        Ok(row.map(|r| Vessel { id: r.id, name: r.name, capacity: r.capacity }))
    }

    async fn lock_vessel(&mut self, id: Uuid) -> StoreResult<Option<Vessel>> {
        let row = sqlx::query_as::<_, VesselRow>(
            "SELECT id, name, capacity FROM vessels WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(store_error)?;
        Ok(row.map(|r| Vessel { id: r.id, name: r.name, capacity: r.capacity }))
    }

    async fn route_exists(&mut self, id: Uuid) -> StoreResult<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM routes WHERE id = $1)")
            .bind(id)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(store_error)
    }

    async fn owner_exists(&mut self, id: Uuid) -> StoreResult<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(id)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(store_error)
    }

    async fn schedule(&mut self, id: Uuid) -> StoreResult<Option<Schedule>> {
        let sql = format!("SELECT {} FROM schedules WHERE id = $1", SCHEDULE_COLUMNS);
        let row = sqlx::query_as::<_, ScheduleRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(store_error)?;
        Ok(row.map(Schedule::from))
    }

    async fn lock_schedule(&mut self, id: Uuid) -> StoreResult<Option<Schedule>> {
        // Row lock held until commit/rollback; serialises admission per schedule.
        let sql = format!("SELECT {} FROM schedules WHERE id = $1 FOR UPDATE", SCHEDULE_COLUMNS);
        let row = sqlx::query_as::<_, ScheduleRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(store_error)?;
        Ok(row.map(Schedule::from))
    }

    async fn list_schedules(&mut self) -> StoreResult<Vec<Schedule>> {
        let sql = format!("SELECT {} FROM schedules ORDER BY departure_time", SCHEDULE_COLUMNS);
        let rows = sqlx::query_as::<_, ScheduleRow>(&sql)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(store_error)?;
        Ok(rows.into_iter().map(Schedule::from).collect())
    }

    async fn find_schedules(&mut self, filter: &ScheduleFilter) -> StoreResult<Vec<Schedule>> {
        let condition = match filter {
            ScheduleFilter::Vessel(_) => "vessel_id = $1",
            ScheduleFilter::Route(_) => "route_id = $1",
            ScheduleFilter::DepartingBetween(..) => "departure_time BETWEEN $1 AND $2",
            ScheduleFilter::ArrivingBetween(..) => "arrival_time BETWEEN $1 AND $2",
        };
        let sql = format!(
            "SELECT {} FROM schedules WHERE {} ORDER BY departure_time",
            SCHEDULE_COLUMNS, condition
        );
        let query = sqlx::query_as::<_, ScheduleRow>(&sql);
        let query = match *filter {
            ScheduleFilter::Vessel(id) | ScheduleFilter::Route(id) => query.bind(id),
            ScheduleFilter::DepartingBetween(start, end)
            | ScheduleFilter::ArrivingBetween(start, end) => query.bind(start).bind(end),
        };
        let rows = query.fetch_all(&mut *self.tx).await.map_err(store_error)?;
        Ok(rows.into_iter().map(Schedule::from).collect())
    }

    async fn vessel_busy(
        &mut self,
        vessel_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> StoreResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(
                SELECT 1 FROM schedules
                WHERE vessel_id = $1
                  AND departure_time < $3
                  AND arrival_time > $2
                  AND ($4::uuid IS NULL OR id <> $4)
            )",
        )
        .bind(vessel_id)
        .bind(from)
        .bind(to)
        .bind(exclude)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(store_error)
    }

    async fn insert_schedule(&mut self, s: &Schedule) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO schedules (id, vessel_id, route_id, departure_time, arrival_time, total_seats,
                total_cargo_capacity, seat_price, cargo_price_per_kg, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(s.id)
        .bind(s.vessel_id)
        .bind(s.route_id)
        .bind(s.departure_time)
        .bind(s.arrival_time)
        .bind(s.total_seats)
        .bind(s.total_cargo_capacity)
        .bind(s.seat_price)
        .bind(s.cargo_price_per_kg)
        .bind(s.created_at)
        .bind(s.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(store_error)?;
        Ok(())
    }

    async fn update_schedule(&mut self, s: &Schedule) -> StoreResult<()> {
        sqlx::query(
            "UPDATE schedules SET vessel_id = $2, route_id = $3, departure_time = $4, arrival_time = $5,
                total_seats = $6, total_cargo_capacity = $7, seat_price = $8, cargo_price_per_kg = $9,
                updated_at = $10
             WHERE id = $1",
        )
        .bind(s.id)
        .bind(s.vessel_id)
        .bind(s.route_id)
        .bind(s.departure_time)
        .bind(s.arrival_time)
        .bind(s.total_seats)
        .bind(s.total_cargo_capacity)
        .bind(s.seat_price)
        .bind(s.cargo_price_per_kg)
        .bind(s.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(store_error)?;
        Ok(())
    }

    async fn delete_schedule(&mut self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM schedules WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(store_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn ticket(&mut self, id: Uuid) -> StoreResult<Option<Ticket>> {
        let sql = format!("SELECT {} FROM tickets WHERE id = $1", TICKET_COLUMNS);
        let row = sqlx::query_as::<_, TicketRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(store_error)?;
        Ok(row.map(Ticket::from))
    }

    async fn list_tickets(&mut self, paid: Option<bool>) -> StoreResult<Vec<Ticket>> {
        let sql = format!(
            "SELECT {} FROM tickets WHERE ($1::BOOLEAN IS NULL OR paid = $1) ORDER BY created_at",
            TICKET_COLUMNS
        );
        let rows = sqlx::query_as::<_, TicketRow>(&sql)
            .bind(paid)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(store_error)?;
        Ok(rows.into_iter().map(Ticket::from).collect())
    }

    async fn tickets_for_schedule(&mut self, schedule_id: Uuid) -> StoreResult<Vec<Ticket>> {
        let sql = format!(
            "SELECT {} FROM tickets WHERE schedule_id = $1 ORDER BY {}",
            TICKET_COLUMNS, SEAT_ORDER
        );
        let rows = sqlx::query_as::<_, TicketRow>(&sql)
            .bind(schedule_id)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(store_error)?;
        Ok(rows.into_iter().map(Ticket::from).collect())
    }

    async fn count_tickets(&mut self, schedule_id: Uuid) -> StoreResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tickets WHERE schedule_id = $1")
            .bind(schedule_id)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(store_error)
    }

    async fn seat_taken(&mut self, schedule_id: Uuid, seat_number: &str) -> StoreResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM tickets WHERE schedule_id = $1 AND seat_number = $2)",
        )
        .bind(schedule_id)
        .bind(seat_number)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(store_error)
    }

    async fn insert_ticket(&mut self, t: &Ticket) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO tickets (id, schedule_id, seat_number, price, paid, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(t.id)
        .bind(t.schedule_id)
        .bind(&t.seat_number)
        .bind(t.price)
        .bind(t.paid)
        .bind(t.created_at)
        .bind(t.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(store_error)?;
        Ok(())
    }

    async fn set_ticket_seat(
        &mut self,
        id: Uuid,
        seat_number: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE tickets SET seat_number = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(seat_number)
            .bind(at)
            .execute(&mut *self.tx)
            .await
            .map_err(store_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_ticket_paid(&mut self, id: Uuid, paid: bool, at: DateTime<Utc>) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE tickets SET paid = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(paid)
            .bind(at)
            .execute(&mut *self.tx)
            .await
            .map_err(store_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_ticket(&mut self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM tickets WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(store_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_tickets_paid(&mut self, ids: &[Uuid]) -> StoreResult<Vec<Uuid>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_scalar::<_, Uuid>(
            "UPDATE tickets SET paid = TRUE, updated_at = NOW() WHERE id = ANY($1) RETURNING id",
        )
        .bind(ids)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(store_error)
    }

    async fn cargo(&mut self, id: Uuid) -> StoreResult<Option<Cargo>> {
        let sql = format!("SELECT {} FROM cargo WHERE id = $1", CARGO_COLUMNS);
        let row = sqlx::query_as::<_, CargoRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(store_error)?;
        row.map(Cargo::try_from).transpose()
    }

    async fn list_cargo(&mut self, status: Option<CargoStatus>) -> StoreResult<Vec<Cargo>> {
        let sql = format!(
            "SELECT {} FROM cargo WHERE ($1::TEXT IS NULL OR status = $1) ORDER BY created_at",
            CARGO_COLUMNS
        );
        let rows = sqlx::query_as::<_, CargoRow>(&sql)
            .bind(status.map(|s| s.as_str()))
            .fetch_all(&mut *self.tx)
            .await
            .map_err(store_error)?;
        cargo_rows(rows)
    }

    async fn cargo_by_tracking(&mut self, tracking_number: &str) -> StoreResult<Option<Cargo>> {
        let sql = format!("SELECT {} FROM cargo WHERE tracking_number = $1", CARGO_COLUMNS);
        let row = sqlx::query_as::<_, CargoRow>(&sql)
            .bind(tracking_number)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(store_error)?;
        row.map(Cargo::try_from).transpose()
    }

    async fn cargo_for_schedule(&mut self, schedule_id: Uuid) -> StoreResult<Vec<Cargo>> {
        let sql = format!(
            "SELECT {} FROM cargo WHERE schedule_id = $1 ORDER BY created_at",
            CARGO_COLUMNS
        );
        let rows = sqlx::query_as::<_, CargoRow>(&sql)
            .bind(schedule_id)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(store_error)?;
        cargo_rows(rows)
    }

    async fn cargo_for_owner(&mut self, owner_id: Uuid) -> StoreResult<Vec<Cargo>> {
        let sql = format!(
            "SELECT {} FROM cargo WHERE owner_id = $1 ORDER BY created_at",
            CARGO_COLUMNS
        );
        let rows = sqlx::query_as::<_, CargoRow>(&sql)
            .bind(owner_id)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(store_error)?;
        cargo_rows(rows)
    }

    async fn booked_cargo_weight(
        &mut self,
        schedule_id: Uuid,
        excluding: Option<Uuid>,
    ) -> StoreResult<f64> {
        sqlx::query_scalar::<_, f64>(
            "SELECT COALESCE(SUM(weight), 0)::DOUBLE PRECISION FROM cargo
             WHERE schedule_id = $1 AND status <> 'CANCELLED' AND ($2::uuid IS NULL OR id <> $2)",
        )
        .bind(schedule_id)
        .bind(excluding)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(store_error)
    }

    async fn insert_cargo(&mut self, c: &Cargo) -> StoreResult<()> {
        // A tracking-number collision must not poison the booking transaction,
        // so the insert runs in a savepoint the caller can retry past.
        let mut savepoint = self.tx.begin().await.map_err(store_error)?;
        let inserted = sqlx::query(
            "INSERT INTO cargo (id, owner_id, schedule_id, description, weight, tracking_number, status,
                price, special_requirements, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(c.id)
        .bind(c.owner_id)
        .bind(c.schedule_id)
        .bind(&c.description)
        .bind(c.weight)
        .bind(&c.tracking_number)
        .bind(c.status.as_str())
        .bind(c.price)
        .bind(&c.special_requirements)
        .bind(c.created_at)
        .bind(c.updated_at)
        .execute(&mut *savepoint)
        .await;

        match inserted {
            Ok(_) => savepoint.commit().await.map_err(store_error),
            Err(e) => {
                savepoint.rollback().await.map_err(store_error)?;
                Err(store_error(e))
            }
        }
    }

    async fn set_cargo_status(
        &mut self,
        id: Uuid,
        status: CargoStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE cargo SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .bind(at)
            .execute(&mut *self.tx)
            .await
            .map_err(store_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_cargo_weight(
        &mut self,
        id: Uuid,
        weight: f64,
        price: f64,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let result =
            sqlx::query("UPDATE cargo SET weight = $2, price = $3, updated_at = $4 WHERE id = $1")
                .bind(id)
                .bind(weight)
                .bind(price)
                .bind(at)
                .execute(&mut *self.tx)
                .await
                .map_err(store_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_cargo(&mut self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM cargo WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(store_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_payment(
        &mut self,
        payment: &Payment,
        tickets: &[TicketPayment],
        cargo: &[CargoPayment],
    ) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO payments (id, user_id, amount, currency, status, method, paid_at, processor_reference)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(payment.id)
        .bind(payment.user_id)
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(payment.status.as_str())
        .bind(&payment.method)
        .bind(payment.paid_at)
        .bind(&payment.processor_reference)
        .execute(&mut *self.tx)
        .await
        .map_err(store_error)?;

        for link in tickets {
            sqlx::query(
                "INSERT INTO ticket_payments (id, payment_id, ticket_id, amount) VALUES ($1, $2, $3, $4)",
            )
            .bind(link.id)
            .bind(link.payment_id)
            .bind(link.ticket_id)
            .bind(link.amount)
            .execute(&mut *self.tx)
            .await
            .map_err(store_error)?;
        }
        for link in cargo {
            sqlx::query(
                "INSERT INTO cargo_payments (id, payment_id, cargo_id, amount) VALUES ($1, $2, $3, $4)",
            )
            .bind(link.id)
            .bind(link.payment_id)
            .bind(link.cargo_id)
            .bind(link.amount)
            .execute(&mut *self.tx)
            .await
            .map_err(store_error)?;
        }
        Ok(())
    }

    async fn payment(&mut self, id: Uuid) -> StoreResult<Option<Payment>> {
        let sql = format!("SELECT {} FROM payments WHERE id = $1", PAYMENT_COLUMNS);
        let row = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(store_error)?;
        Ok(row.map(Payment::from))
    }

    async fn payment_by_reference(&mut self, reference: &str) -> StoreResult<Option<Payment>> {
        let sql = format!(
            "SELECT {} FROM payments WHERE processor_reference = $1",
            PAYMENT_COLUMNS
        );
        let row = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(reference)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(store_error)?;
        Ok(row.map(Payment::from))
    }

    async fn update_payment_status(&mut self, id: Uuid, status: &PaymentStatus) -> StoreResult<()> {
        sqlx::query("UPDATE payments SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn payment_links(
        &mut self,
        payment_id: Uuid,
    ) -> StoreResult<(Vec<TicketPayment>, Vec<CargoPayment>)> {
        let tickets = sqlx::query_as::<_, LinkRow>(
            "SELECT id, payment_id, ticket_id AS item_id, amount FROM ticket_payments WHERE payment_id = $1",
        )
        .bind(payment_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(store_error)?
        .into_iter()
        .map(|r| TicketPayment {
            id: r.id,
            payment_id: r.payment_id,
            ticket_id: r.item_id,
            amount: r.amount,
        })
        .collect();

        let cargo = sqlx::query_as::<_, LinkRow>(
            "SELECT id, payment_id, cargo_id AS item_id, amount FROM cargo_payments WHERE payment_id = $1",
        )
        .bind(payment_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(store_error)?
        .into_iter()
        .map(|r| CargoPayment {
            id: r.id,
            payment_id: r.payment_id,
            cargo_id: r.item_id,
            amount: r.amount,
        })
        .collect();

        Ok((tickets, cargo))
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await.map_err(store_error)
    }
}
