use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use nvg_booking::BookingError;
use nvg_capacity::AllocationError;
use nvg_core::{CargoStatus, FieldError};
use serde_json::{json, Map, Value};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Booking(#[from] BookingError),
    /// Body or path could not be decoded.
    #[error("{0}")]
    BadRequest(String),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

/// `axum::Json` with failures reported in the API's error shape.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// `axum::extract::Path` with failures reported in the API's error shape.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct AppPath<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);

struct ErrorBody {
    status: StatusCode,
    code: &'static str,
    message: String,
    detail: Map<String, Value>,
}

impl ErrorBody {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            detail: Map::new(),
        }
    }

    fn with(mut self, key: &str, value: Value) -> Self {
        self.detail.insert(key.to_string(), value);
        self
    }

    fn fields(self, fields: &[FieldError]) -> Self {
        self.with("fields", json!(fields))
    }
}

fn field(name: &str, message: String) -> Vec<FieldError> {
    vec![FieldError::new(name, message)]
}

fn allocation_body(err: AllocationError) -> ErrorBody {
    let message = err.to_string();
    match err {
        AllocationError::InvalidSeatNumber(_) => {
            ErrorBody::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", "Validation failed")
                .fields(&field("seatNumber", message))
        }
        AllocationError::InvalidWeight(_) | AllocationError::WeightAboveLimit { .. } => {
            ErrorBody::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", "Validation failed")
                .fields(&field("weight", message))
        }
        AllocationError::SeatTaken(seat) => {
            ErrorBody::new(StatusCode::CONFLICT, "SEAT_TAKEN", message).with("seatNumber", json!(seat))
        }
        AllocationError::NoSeatsAvailable { total } => {
            ErrorBody::new(StatusCode::CONFLICT, "CAPACITY_EXCEEDED", message)
                .with("available", json!(0))
                .with("requested", json!(1))
                .with("totalSeats", json!(total))
        }
        AllocationError::InsufficientCapacity { available, requested } => {
            ErrorBody::new(StatusCode::BAD_REQUEST, "CAPACITY_EXCEEDED", message)
                .with("available", json!(available))
                .with("requested", json!(requested))
        }
    }
}

fn booking_body(err: BookingError) -> ErrorBody {
    let message = err.to_string();
    match err {
        BookingError::ScheduleNotFound(_)
        | BookingError::OwnerNotFound(_)
        | BookingError::TicketNotFound(_)
        | BookingError::CargoNotFound(_)
        | BookingError::PaymentNotFound(_)
        | BookingError::VesselNotFound(_)
        | BookingError::RouteNotFound(_) => ErrorBody::new(StatusCode::NOT_FOUND, "NOT_FOUND", message),
        BookingError::Validation(fields) => {
            ErrorBody::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", "Validation failed").fields(&fields)
        }
        BookingError::Allocation(err) => allocation_body(err),
        BookingError::InvalidStatus(_) => ErrorBody::new(StatusCode::BAD_REQUEST, "INVALID_STATUS", message)
            .with("valid_statuses", json!(CargoStatus::valid_names())),
        BookingError::InvalidTransition { from, to } => {
            ErrorBody::new(StatusCode::CONFLICT, "INVALID_TRANSITION", message)
                .with("from", json!(from))
                .with("to", json!(to))
        }
        BookingError::ScheduleConflict(_) => ErrorBody::new(StatusCode::CONFLICT, "SCHEDULE_CONFLICT", message),
        BookingError::Conflict(_) => ErrorBody::new(StatusCode::CONFLICT, "CONFLICT", message),
        BookingError::Processor(err) => {
            tracing::error!("Payment processor error: {}", err);
            ErrorBody::new(
                StatusCode::BAD_GATEWAY,
                "PAYMENT_PROCESSOR_ERROR",
                "Payment processor request failed, please try again",
            )
        }
        BookingError::Store(err) => {
            tracing::error!("Internal Server Error: {}", err);
            ErrorBody::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal Server Error, please try again",
            )
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = match self {
            AppError::Booking(err) => booking_body(err),
            AppError::BadRequest(msg) => {
                ErrorBody::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg)
            }
        };

        let mut payload = Map::new();
        payload.insert("error".into(), json!(body.code));
        payload.insert("message".into(), json!(body.message));
        payload.extend(body.detail);

        (body.status, Json(Value::Object(payload))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn render(err: AppError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_capacity_error_carries_detail() {
        let err = BookingError::Allocation(AllocationError::InsufficientCapacity {
            available: 40.0,
            requested: 60.0,
        });
        let (status, body) = render(err.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "CAPACITY_EXCEEDED");
        assert_eq!(body["available"], 40.0);
        assert_eq!(body["requested"], 60.0);
    }

    #[tokio::test]
    async fn test_store_errors_are_not_leaked() {
        let err = BookingError::Store(nvg_core::StoreError::Backend("relation \"cargo\" is locked".into()));
        let (status, body) = render(err.into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body["message"].as_str().unwrap().contains("cargo"));
    }

    #[tokio::test]
    async fn test_invalid_status_lists_valid_ones() {
        let (status, body) = render(BookingError::InvalidStatus("SHIPPED".into()).into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["valid_statuses"].as_array().unwrap().len(), 15);
    }
}
