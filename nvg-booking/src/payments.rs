use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use nvg_core::payment::{reference_from_secret, ClientSecret};
use nvg_core::{
    BookingRules, BookingStore, CargoPayment, Payment, PaymentProcessor, PaymentStatus,
    SplitStrategy, StoreError, StoreTx, TicketPayment, PAYMENT_REFERENCE_CONSTRAINT,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{BookingError, BookingResult};
use crate::validation;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub user_id: Uuid,
    #[serde(default)]
    pub ticket_ids: Vec<Uuid>,
    #[serde(default)]
    pub cargo_ids: Vec<Uuid>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
}

/// Returned once, when the intent is created. The client secret is not
/// stored and cannot be fetched again.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub payment: Payment,
    pub client_secret: Option<ClientSecret>,
    pub tickets: Vec<TicketPayment>,
    pub cargo: Vec<CargoPayment>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentConfirmation {
    pub payment: Payment,
    /// Tickets flipped to paid by this confirmation.
    pub paid_ticket_ids: Vec<Uuid>,
    /// Cargo covered by a succeeded payment. Their workflow status is left alone.
    pub paid_cargo_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    pub payment: Payment,
    pub tickets: Vec<TicketPayment>,
    pub cargo: Vec<CargoPayment>,
}

/// Links processor intents to bookings and applies their outcome.
pub struct PaymentReconciler {
    store: Arc<dyn BookingStore>,
    processor: Arc<dyn PaymentProcessor>,
    rules: BookingRules,
}

impl PaymentReconciler {
    pub fn new(
        store: Arc<dyn BookingStore>,
        processor: Arc<dyn PaymentProcessor>,
        rules: BookingRules,
    ) -> Self {
        Self { store, processor, rules }
    }

    pub async fn initiate(&self, req: PaymentRequest) -> BookingResult<PaymentReceipt> {
        if req.ticket_ids.is_empty() && req.cargo_ids.is_empty() {
            return Err(BookingError::invalid(
                "ticketIds",
                "At least one ticket or cargo id is required",
            ));
        }
        if has_duplicates(&req.ticket_ids) {
            return Err(BookingError::invalid("ticketIds", "Ticket ids must be unique"));
        }
        if has_duplicates(&req.cargo_ids) {
            return Err(BookingError::invalid("cargoIds", "Cargo ids must be unique"));
        }
        let currency = req
            .currency
            .as_deref()
            .unwrap_or(&self.rules.default_currency)
            .to_ascii_lowercase();
        validation::currency(&currency)?;

        // Prices are read up front; the processor call happens outside any transaction.
        let (ticket_prices, cargo_prices) = {
            let mut tx = self.store.begin().await?;
            if !tx.owner_exists(req.user_id).await? {
                return Err(BookingError::OwnerNotFound(req.user_id));
            }
            let mut ticket_prices = Vec::with_capacity(req.ticket_ids.len());
            for id in &req.ticket_ids {
                let ticket = tx.ticket(*id).await?.ok_or(BookingError::TicketNotFound(*id))?;
                ticket_prices.push(ticket.price);
            }
            let mut cargo_prices = Vec::with_capacity(req.cargo_ids.len());
            for id in &req.cargo_ids {
                let cargo = tx
                    .cargo(*id)
                    .await?
                    .ok_or_else(|| BookingError::CargoNotFound(id.to_string()))?;
                cargo_prices.push(cargo.price);
            }
            (ticket_prices, cargo_prices)
        };

        let total: f64 = ticket_prices.iter().chain(cargo_prices.iter()).sum();
        if total <= 0.0 {
            return Err(BookingError::invalid("amount", "Payment total must be positive"));
        }

        let intent = self
            .processor
            .create_intent(to_minor_units(total), &currency, req.payment_method.as_deref())
            .await
            .map_err(|e| {
                error!("Failed to create payment intent for user {}: {}", req.user_id, e);
                BookingError::from(e)
            })?;

        let payment = Payment {
            id: Uuid::new_v4(),
            user_id: req.user_id,
            amount: total,
            currency,
            status: intent.status.clone(),
            method: req.payment_method.unwrap_or_else(|| "card".to_string()),
            paid_at: Utc::now(),
            processor_reference: intent.reference.clone(),
        };

        let strategy = self.rules.payment_split;
        let tickets: Vec<TicketPayment> = req
            .ticket_ids
            .iter()
            .zip(split(strategy, &ticket_prices))
            .map(|(ticket_id, amount)| TicketPayment {
                id: Uuid::new_v4(),
                payment_id: payment.id,
                ticket_id: *ticket_id,
                amount,
            })
            .collect();
        let cargo: Vec<CargoPayment> = req
            .cargo_ids
            .iter()
            .zip(split(strategy, &cargo_prices))
            .map(|(cargo_id, amount)| CargoPayment {
                id: Uuid::new_v4(),
                payment_id: payment.id,
                cargo_id: *cargo_id,
                amount,
            })
            .collect();

        // Items may have been deleted while the processor was being called.
        let mut tx = self.store.begin().await?;
        if let Some(missing) = missing_item(tx.as_mut(), &req.ticket_ids, &req.cargo_ids).await? {
            warn!("Payment {} abandoned, a booked item is gone: {}", intent.reference, missing);
            return Err(missing);
        }
        let inserted = tx.insert_payment(&payment, &tickets, &cargo).await;
        match inserted {
            Ok(()) => {}
            Err(e) if e.violates(PAYMENT_REFERENCE_CONSTRAINT) => {
                return Err(BookingError::Conflict(format!(
                    "Payment reference {} is already recorded",
                    payment.processor_reference
                )));
            }
            Err(StoreError::MissingReference(constraint)) => {
                drop(tx);
                let mut tx = self.store.begin().await?;
                let missing = missing_item(tx.as_mut(), &req.ticket_ids, &req.cargo_ids).await?;
                return Err(missing
                    .unwrap_or(BookingError::Store(StoreError::MissingReference(constraint))));
            }
            Err(e) => return Err(e.into()),
        }
        tx.commit().await?;

        info!(
            "Payment {} initiated: {} {} over {} tickets and {} cargo, status {}",
            payment.id,
            payment.amount,
            payment.currency,
            tickets.len(),
            cargo.len(),
            payment.status
        );
        Ok(PaymentReceipt {
            payment,
            client_secret: intent.client_secret,
            tickets,
            cargo,
        })
    }

    /// Refreshes the payment's status from the processor. Accepts either the
    /// processor reference or the client secret issued with it.
    pub async fn confirm(&self, reference_or_secret: &str) -> BookingResult<PaymentConfirmation> {
        let reference = reference_from_secret(reference_or_secret.trim());
        if reference.is_empty() {
            return Err(BookingError::invalid("reference", "Payment reference is required"));
        }

        let payment_id = {
            let mut tx = self.store.begin().await?;
            tx.payment_by_reference(reference)
                .await?
                .ok_or_else(|| BookingError::PaymentNotFound(reference.to_string()))?
                .id
        };

        let intent = self.processor.retrieve_intent(reference).await.map_err(|e| {
            error!("Failed to retrieve payment intent {}: {}", reference, e);
            BookingError::from(e)
        })?;

        let mut tx = self.store.begin().await?;
        let mut payment = tx
            .payment(payment_id)
            .await?
            .ok_or_else(|| BookingError::PaymentNotFound(reference.to_string()))?;

        let previous = payment.status.clone();
        if previous != intent.status {
            tx.update_payment_status(payment.id, &intent.status).await?;
            payment.status = intent.status;
        }

        let (ticket_links, cargo_links) = tx.payment_links(payment.id).await?;
        let (paid_ticket_ids, paid_cargo_ids) = if payment.status == PaymentStatus::Succeeded {
            let ticket_ids: Vec<Uuid> = ticket_links.iter().map(|l| l.ticket_id).collect();
            let paid = tx.mark_tickets_paid(&ticket_ids).await?;
            (paid, cargo_links.iter().map(|l| l.cargo_id).collect())
        } else {
            (Vec::new(), Vec::new())
        };
        tx.commit().await?;

        info!(
            "Payment {} confirmed: {} -> {}, {} tickets marked paid",
            payment.id,
            previous,
            payment.status,
            paid_ticket_ids.len()
        );
        Ok(PaymentConfirmation {
            payment,
            paid_ticket_ids,
            paid_cargo_ids,
        })
    }

    pub async fn get(&self, id: Uuid) -> BookingResult<PaymentDetails> {
        let mut tx = self.store.begin().await?;
        let payment = tx
            .payment(id)
            .await?
            .ok_or_else(|| BookingError::PaymentNotFound(id.to_string()))?;
        let (tickets, cargo) = tx.payment_links(id).await?;
        Ok(PaymentDetails { payment, tickets, cargo })
    }
}

/// The not-found error for the first requested ticket or cargo that no longer exists.
async fn missing_item(
    tx: &mut dyn StoreTx,
    ticket_ids: &[Uuid],
    cargo_ids: &[Uuid],
) -> BookingResult<Option<BookingError>> {
    for id in ticket_ids {
        if tx.ticket(*id).await?.is_none() {
            return Ok(Some(BookingError::TicketNotFound(*id)));
        }
    }
    for id in cargo_ids {
        if tx.cargo(*id).await?.is_none() {
            return Ok(Some(BookingError::CargoNotFound(id.to_string())));
        }
    }
    Ok(None)
}

/// Amounts attributed to each item of one group (tickets or cargo).
pub fn split(strategy: SplitStrategy, prices: &[f64]) -> Vec<f64> {
    match strategy {
        SplitStrategy::Equal => {
            if prices.is_empty() {
                return Vec::new();
            }
            let share = prices.iter().sum::<f64>() / prices.len() as f64;
            vec![share; prices.len()]
        }
        SplitStrategy::Proportional => prices.to_vec(),
    }
}

fn to_minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

fn has_duplicates(ids: &[Uuid]) -> bool {
    let mut seen = HashSet::with_capacity(ids.len());
    !ids.iter().all(|id| seen.insert(*id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_split_spreads_group_total() {
        let shares = split(SplitStrategy::Equal, &[10.0, 30.0]);
        assert_eq!(shares, vec![20.0, 20.0]);
        assert!(split(SplitStrategy::Equal, &[]).is_empty());
    }

    #[test]
    fn test_proportional_split_keeps_item_prices() {
        assert_eq!(split(SplitStrategy::Proportional, &[10.0, 30.0]), vec![10.0, 30.0]);
    }

    #[test]
    fn test_split_sums_to_total_within_tolerance() {
        let prices = [12.34, 56.78, 9.1];
        let total: f64 = prices.iter().sum();
        for strategy in [SplitStrategy::Equal, SplitStrategy::Proportional] {
            let attributed: f64 = split(strategy, &prices).iter().sum();
            assert!((attributed - total).abs() < 1e-9);
        }
    }

    #[test]
    fn test_minor_units_round() {
        assert_eq!(to_minor_units(25.0), 2500);
        assert_eq!(to_minor_units(0.1 + 0.2), 30);
        assert_eq!(to_minor_units(19.999), 2000);
    }

    #[test]
    fn test_duplicate_detection() {
        let id = Uuid::new_v4();
        assert!(has_duplicates(&[id, Uuid::new_v4(), id]));
        assert!(!has_duplicates(&[id, Uuid::new_v4()]));
    }
}
