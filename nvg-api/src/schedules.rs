use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use nvg_booking::ScheduleInput;
use nvg_core::Schedule;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppJson, AppPath, AppQuery, AppResult};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/schedules", get(list_schedules).post(create_schedule))
        .route(
            "/schedules/{id}",
            get(get_schedule).put(update_schedule).delete(delete_schedule),
        )
        .route("/schedules/vessel/{vessel_id}", get(schedules_for_vessel))
        .route("/schedules/route/{route_id}", get(schedules_for_route))
        .route("/schedules/departure", get(departing_between))
        .route("/schedules/arrival", get(arriving_between))
}

/// Inclusive time window, RFC 3339 timestamps.
#[derive(Debug, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// POST /schedules
async fn create_schedule(
    State(state): State<AppState>,
    AppJson(input): AppJson<ScheduleInput>,
) -> AppResult<(StatusCode, Json<Schedule>)> {
    let schedule = state.schedules.create(input).await?;
    Ok((StatusCode::CREATED, Json(schedule)))
}

async fn list_schedules(State(state): State<AppState>) -> AppResult<Json<Vec<Schedule>>> {
    Ok(Json(state.schedules.list().await?))
}

async fn get_schedule(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<Schedule>> {
    Ok(Json(state.schedules.get(id).await?))
}

/// PUT /schedules/{id}
/// Replaces the schedule. Capacities cannot drop below current bookings.
async fn update_schedule(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
    AppJson(input): AppJson<ScheduleInput>,
) -> AppResult<Json<Schedule>> {
    Ok(Json(state.schedules.update(id, input).await?))
}

async fn delete_schedule(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<StatusCode> {
    state.schedules.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /schedules/vessel/{vessel_id}
async fn schedules_for_vessel(
    State(state): State<AppState>,
    AppPath(vessel_id): AppPath<Uuid>,
) -> AppResult<Json<Vec<Schedule>>> {
    Ok(Json(state.schedules.for_vessel(vessel_id).await?))
}

async fn schedules_for_route(
    State(state): State<AppState>,
    AppPath(route_id): AppPath<Uuid>,
) -> AppResult<Json<Vec<Schedule>>> {
    Ok(Json(state.schedules.for_route(route_id).await?))
}

/// GET /schedules/departure?start=..&end=..
async fn departing_between(
    State(state): State<AppState>,
    AppQuery(window): AppQuery<TimeWindow>,
) -> AppResult<Json<Vec<Schedule>>> {
    Ok(Json(
        state.schedules.departing_between(window.start, window.end).await?,
    ))
}

/// GET /schedules/arrival?start=..&end=..
async fn arriving_between(
    State(state): State<AppState>,
    AppQuery(window): AppQuery<TimeWindow>,
) -> AppResult<Json<Vec<Schedule>>> {
    Ok(Json(
        state.schedules.arriving_between(window.start, window.end).await?,
    ))
}
