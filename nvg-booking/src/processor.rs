use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use nvg_core::payment::ClientSecret;
use nvg_core::{PaymentProcessor, PaymentStatus, ProcessorError, ProcessorIntent};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// In-process stand-in for the payment gateway.
///
/// New intents start in `requires_payment_method`; the first retrieval
/// settles them to the configured outcome (`succeeded` unless changed).
pub struct MockPaymentProcessor {
    intents: Mutex<HashMap<String, ProcessorIntent>>,
    settle_as: Mutex<PaymentStatus>,
    available: AtomicBool,
}

impl Default for MockPaymentProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPaymentProcessor {
    pub fn new() -> Self {
        Self {
            intents: Mutex::new(HashMap::new()),
            settle_as: Mutex::new(PaymentStatus::Succeeded),
            available: AtomicBool::new(true),
        }
    }

    /// Status that pending intents settle to on their next retrieval.
    pub async fn settle_as(&self, status: PaymentStatus) {
        *self.settle_as.lock().await = status;
    }

    /// Forces the status of one intent.
    pub async fn set_status(&self, reference: &str, status: PaymentStatus) -> bool {
        match self.intents.lock().await.get_mut(reference) {
            Some(intent) => {
                intent.status = status;
                true
            }
            None => false,
        }
    }

    /// Simulates a gateway outage while `false`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), ProcessorError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ProcessorError::Unavailable("Simulated payment gateway failure".into()))
        }
    }
}

#[async_trait]
impl PaymentProcessor for MockPaymentProcessor {
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        method: Option<&str>,
    ) -> Result<ProcessorIntent, ProcessorError> {
        self.ensure_available()?;
        if amount_minor <= 0 {
            return Err(ProcessorError::Rejected(format!("Invalid amount {}", amount_minor)));
        }

        let reference = format!("pi_mock_{}", Uuid::new_v4().simple());
        let intent = ProcessorIntent {
            client_secret: Some(ClientSecret(format!("{}_secret_{}", reference, Uuid::new_v4().simple()))),
            reference: reference.clone(),
            amount_minor,
            currency: currency.to_ascii_lowercase(),
            status: PaymentStatus::RequiresPaymentMethod,
        };
        debug!(
            "Mock intent {} created for {} {} via {}",
            reference,
            amount_minor,
            intent.currency,
            method.unwrap_or("card")
        );

        self.intents.lock().await.insert(reference, intent.clone());
        Ok(intent)
    }

    async fn retrieve_intent(&self, reference: &str) -> Result<ProcessorIntent, ProcessorError> {
        self.ensure_available()?;
        let settle_as = self.settle_as.lock().await.clone();

        let mut intents = self.intents.lock().await;
        let intent = intents
            .get_mut(reference)
            .ok_or_else(|| ProcessorError::IntentNotFound(reference.to_string()))?;
        if intent.status == PaymentStatus::RequiresPaymentMethod {
            intent.status = settle_as;
        }

        let mut view = intent.clone();
        view.client_secret = None;
        Ok(view)
    }
}
