use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::net::SocketAddr;

use crate::state::AppState;

const WINDOW_SECONDS: i64 = 60;

/// Per-IP fixed window limit. Requests pass untouched when Redis is not
/// configured, when the peer address is unknown, or when Redis errors.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let Some(limiter) = state.rate_limiter.as_ref() else {
        return next.run(req).await;
    };
    let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>().cloned() else {
        return next.run(req).await;
    };

    let client = addr.ip().to_string();
    match limiter
        .redis
        .check_rate_limit(&client, limiter.per_minute, WINDOW_SECONDS)
        .await
    {
        Ok(decision) if decision.allowed => next.run(req).await,
        Ok(decision) => {
            tracing::warn!("Rate limit exceeded for {} ({} requests)", client, decision.count);
            (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({
                    "error": "RATE_LIMITED",
                    "message": "Rate limit exceeded, try again later",
                })),
            )
                .into_response()
        }
        Err(e) => {
            tracing::warn!("Rate limiter unavailable, allowing request: {}", e);
            next.run(req).await
        }
    }
}
