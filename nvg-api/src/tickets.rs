use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use nvg_booking::{SeatInfo, TicketBooking, TicketUpdate};
use nvg_core::Ticket;
use uuid::Uuid;

use crate::error::{AppJson, AppPath, AppResult};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tickets", get(list_tickets).post(book_ticket))
        .route("/tickets/status/{paid}", get(tickets_by_paid))
        .route(
            "/tickets/{id}",
            get(get_ticket).patch(update_ticket).delete(delete_ticket),
        )
        .route("/tickets/schedule/{schedule_id}", get(tickets_for_schedule))
        .route("/tickets/schedule/{schedule_id}/seats/info", get(seat_info))
}

/// POST /tickets
/// 409 SEAT_TAKEN when the seat is booked, whether detected up front or by
/// losing a concurrent insert.
async fn book_ticket(
    State(state): State<AppState>,
    AppJson(req): AppJson<TicketBooking>,
) -> AppResult<(StatusCode, Json<Ticket>)> {
    let ticket = state.bookings.book_ticket(req).await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

async fn list_tickets(State(state): State<AppState>) -> AppResult<Json<Vec<Ticket>>> {
    Ok(Json(state.bookings.list_tickets().await?))
}

/// GET /tickets/status/{paid}
/// `paid` is `true` or `false`.
async fn tickets_by_paid(
    State(state): State<AppState>,
    AppPath(paid): AppPath<bool>,
) -> AppResult<Json<Vec<Ticket>>> {
    Ok(Json(state.bookings.tickets_by_paid(paid).await?))
}

async fn get_ticket(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<Ticket>> {
    Ok(Json(state.bookings.get_ticket(id).await?))
}

async fn update_ticket(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
    AppJson(update): AppJson<TicketUpdate>,
) -> AppResult<Json<Ticket>> {
    Ok(Json(state.bookings.update_ticket(id, update).await?))
}

async fn delete_ticket(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<StatusCode> {
    state.bookings.delete_ticket(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn tickets_for_schedule(
    State(state): State<AppState>,
    AppPath(schedule_id): AppPath<Uuid>,
) -> AppResult<Json<Vec<Ticket>>> {
    Ok(Json(state.bookings.tickets_for_schedule(schedule_id).await?))
}

/// GET /tickets/schedule/{schedule_id}/seats/info
async fn seat_info(
    State(state): State<AppState>,
    AppPath(schedule_id): AppPath<Uuid>,
) -> AppResult<Json<SeatInfo>> {
    Ok(Json(state.bookings.seat_info(schedule_id).await?))
}
