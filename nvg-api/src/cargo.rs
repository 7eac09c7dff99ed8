use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use nvg_booking::{CargoBooking, CargoCapacityInfo};
use nvg_core::Cargo;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppJson, AppPath, AppResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WeightUpdate {
    pub weight: f64,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct StatusList {
    pub statuses: Vec<&'static str>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/cargo", get(list_cargo).post(book_cargo))
        .route("/cargo/statuses", get(valid_statuses))
        .route("/cargo/status/{status}", get(cargo_by_status))
        .route("/cargo/{id}", get(get_cargo).delete(delete_cargo))
        .route("/cargo/{id}/weight", patch(reweigh_cargo))
        .route("/cargo/{id}/status", patch(update_status))
        .route("/cargo/tracking/{tracking_number}", get(find_by_tracking))
        .route("/cargo/schedule/{schedule_id}", get(cargo_for_schedule))
        .route("/cargo/schedule/{schedule_id}/capacity", get(capacity))
        .route("/cargo/owner/{owner_id}", get(cargo_for_owner))
}

/// POST /cargo
async fn book_cargo(
    State(state): State<AppState>,
    AppJson(req): AppJson<CargoBooking>,
) -> AppResult<(StatusCode, Json<Cargo>)> {
    let cargo = state.bookings.book_cargo(req).await?;
    Ok((StatusCode::CREATED, Json(cargo)))
}

async fn list_cargo(State(state): State<AppState>) -> AppResult<Json<Vec<Cargo>>> {
    Ok(Json(state.bookings.list_cargo().await?))
}

/// GET /cargo/status/{status}
/// 400 INVALID_STATUS for unknown status names.
async fn cargo_by_status(
    State(state): State<AppState>,
    AppPath(status): AppPath<String>,
) -> AppResult<Json<Vec<Cargo>>> {
    Ok(Json(state.bookings.cargo_by_status(&status).await?))
}

async fn get_cargo(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<Cargo>> {
    Ok(Json(state.bookings.get_cargo(id).await?))
}

async fn delete_cargo(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<StatusCode> {
    state.bookings.delete_cargo(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /cargo/{id}/weight
/// Price is recomputed from the new weight.
async fn reweigh_cargo(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<WeightUpdate>,
) -> AppResult<Json<Cargo>> {
    Ok(Json(state.bookings.reweigh_cargo(id, req.weight).await?))
}

async fn update_status(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<StatusUpdate>,
) -> AppResult<Json<Cargo>> {
    Ok(Json(state.bookings.update_cargo_status(id, &req.status).await?))
}

async fn find_by_tracking(
    State(state): State<AppState>,
    AppPath(tracking_number): AppPath<String>,
) -> AppResult<Json<Cargo>> {
    Ok(Json(state.bookings.find_by_tracking(&tracking_number).await?))
}

async fn cargo_for_schedule(
    State(state): State<AppState>,
    AppPath(schedule_id): AppPath<Uuid>,
) -> AppResult<Json<Vec<Cargo>>> {
    Ok(Json(state.bookings.cargo_for_schedule(schedule_id).await?))
}

async fn cargo_for_owner(
    State(state): State<AppState>,
    AppPath(owner_id): AppPath<Uuid>,
) -> AppResult<Json<Vec<Cargo>>> {
    Ok(Json(state.bookings.cargo_for_owner(owner_id).await?))
}

/// GET /cargo/schedule/{schedule_id}/capacity
async fn capacity(
    State(state): State<AppState>,
    AppPath(schedule_id): AppPath<Uuid>,
) -> AppResult<Json<CargoCapacityInfo>> {
    Ok(Json(state.bookings.cargo_capacity(schedule_id).await?))
}

async fn valid_statuses(State(state): State<AppState>) -> Json<StatusList> {
    Json(StatusList {
        statuses: state.bookings.valid_statuses(),
    })
}
