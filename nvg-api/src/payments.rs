use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use nvg_booking::{PaymentConfirmation, PaymentDetails, PaymentReceipt, PaymentRequest};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppJson, AppPath, AppResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    /// Processor reference, or the client secret issued with it.
    #[serde(alias = "clientSecret", alias = "paymentIntentId")]
    pub reference: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/payments", post(initiate_payment))
        .route("/payments/confirm", post(confirm_payment))
        .route("/payments/{id}", get(get_payment))
}

/// POST /payments
/// Creates a processor intent for the listed tickets and cargo. The client
/// secret is only ever returned here.
async fn initiate_payment(
    State(state): State<AppState>,
    AppJson(req): AppJson<PaymentRequest>,
) -> AppResult<(StatusCode, Json<PaymentReceipt>)> {
    let receipt = state.payments.initiate(req).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// POST /payments/confirm
async fn confirm_payment(
    State(state): State<AppState>,
    AppJson(req): AppJson<ConfirmRequest>,
) -> AppResult<Json<PaymentConfirmation>> {
    Ok(Json(state.payments.confirm(&req.reference).await?))
}

async fn get_payment(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<PaymentDetails>> {
    Ok(Json(state.payments.get(id).await?))
}
