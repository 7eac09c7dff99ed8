use async_trait::async_trait;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Payment status as reported by the processor.
///
/// The processor's vocabulary is passed through untouched: known values get a
/// variant, anything else is carried verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PaymentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    Succeeded,
    Canceled,
    Failed,
    Other(String),
}

impl PaymentStatus {
    pub fn as_str(&self) -> &str {
        match self {
            PaymentStatus::RequiresPaymentMethod => "requires_payment_method",
            PaymentStatus::RequiresConfirmation => "requires_confirmation",
            PaymentStatus::RequiresAction => "requires_action",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Canceled => "canceled",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Other(raw) => raw,
        }
    }

    pub fn is_succeeded(&self) -> bool {
        *self == PaymentStatus::Succeeded
    }
}

impl From<String> for PaymentStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "requires_payment_method" => PaymentStatus::RequiresPaymentMethod,
            "requires_confirmation" => PaymentStatus::RequiresConfirmation,
            "requires_action" => PaymentStatus::RequiresAction,
            "processing" => PaymentStatus::Processing,
            "succeeded" => PaymentStatus::Succeeded,
            "canceled" => PaymentStatus::Canceled,
            "failed" => PaymentStatus::Failed,
            _ => PaymentStatus::Other(raw),
        }
    }
}

impl From<PaymentStatus> for String {
    fn from(status: PaymentStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client secret handed out once when an intent is created.
///
/// Masked in `Debug`/`Display` so it never lands in logs; serialized in full
/// because the client needs it.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct ClientSecret(pub String);

impl fmt::Debug for ClientSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl fmt::Display for ClientSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl Serialize for ClientSecret {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl ClientSecret {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorIntent {
    /// Processor's own id for the intent (e.g. `pi_123`).
    pub reference: String,
    /// Amount in minor currency units.
    pub amount_minor: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub client_secret: Option<ClientSecret>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    #[error("Payment intent not found: {0}")]
    IntentNotFound(String),
    #[error("Payment processor unavailable: {0}")]
    Unavailable(String),
    #[error("Payment processor rejected request: {0}")]
    Rejected(String),
}

/// External payment gateway, opaque beyond intents and their status.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Create a payment intent with the provider
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        method: Option<&str>,
    ) -> Result<ProcessorIntent, ProcessorError>;

    /// Retrieve intent status
    async fn retrieve_intent(&self, reference: &str) -> Result<ProcessorIntent, ProcessorError>;
}

/// Strips the `_secret_...` suffix when a client secret is passed instead of a reference.
pub fn reference_from_secret(value: &str) -> &str {
    match value.split_once("_secret_") {
        Some((reference, _)) => reference,
        None => value,
    }
}
