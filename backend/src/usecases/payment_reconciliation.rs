use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};
use vtc_core::{
    domain::{
        entities::payments::{InsertPaymentEntity, PaymentEntity, UpdatePaymentEntity},
        repositories::payments::PaymentRepository,
        value_objects::enums::payment_statuses::PaymentStatus,
    },
    payments::types::PaymentWebhookEvent,
};

use crate::usecases::payment_gateway::PaymentGateway;

/// Sub-resources fetched alongside an intent so its receipt can be read.
pub const RECEIPT_EXPANSIONS: [&str; 1] = ["latest_charge"];

pub fn receipt_expansions() -> Vec<String> {
    RECEIPT_EXPANSIONS.iter().map(|field| field.to_string()).collect()
}

/// Keeps local payment records in line with what the provider reports. Store
/// failures stop here: they are logged and never reach the caller.
pub struct PaymentReconciler<R, G>
where
    R: PaymentRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    payment_repo: Arc<R>,
    payment_gateway: Arc<G>,
}

/// Everything known about an intent right after the provider created it.
#[derive(Debug, Clone, Copy)]
pub struct CreatedIntent<'a> {
    pub payment_intent_id: &'a str,
    pub amount_minor: i64,
    pub currency: &'a str,
    pub user_id: Option<&'a str>,
    pub ride_id: Option<&'a str>,
    pub initial_status: &'a str,
}

impl<R, G> PaymentReconciler<R, G>
where
    R: PaymentRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    pub fn new(payment_repo: Arc<R>, payment_gateway: Arc<G>) -> Self {
        Self {
            payment_repo,
            payment_gateway,
        }
    }

    pub async fn record_intent_created(&self, created: CreatedIntent<'_>) {
        let payment_intent_id = created.payment_intent_id;

        let Ok(status) = created.initial_status.parse::<PaymentStatus>() else {
            warn!(
                payment_intent_id,
                provider_status = created.initial_status,
                "reconciliation: provider status has no local equivalent, record not created"
            );
            return;
        };

        if !self.payment_repo.is_available().await {
            warn!(
                payment_intent_id,
                "reconciliation: payment store unavailable, record not created"
            );
            return;
        }

        let now = Utc::now();
        let insert = InsertPaymentEntity {
            payment_intent_id: payment_intent_id.to_string(),
            amount_minor: created.amount_minor,
            currency: created.currency.to_string(),
            status: status.to_string(),
            user_id: created.user_id.map(str::to_string),
            ride_id: created.ride_id.map(str::to_string),
            created_at: now,
            updated_at: now,
        };

        match self.payment_repo.upsert_by_intent_id(insert).await {
            Ok(record) => info!(
                payment_intent_id,
                status = %record.status,
                "reconciliation: payment record created"
            ),
            Err(err) => warn!(
                payment_intent_id,
                db_error = ?err,
                "reconciliation: failed to create payment record"
            ),
        }
    }

    pub async fn apply_webhook_event(&self, event: PaymentWebhookEvent) {
        match event {
            PaymentWebhookEvent::PaymentIntentSucceeded(intent) => {
                info!(payment_intent_id = %intent.id, "reconciliation: payment intent succeeded");
                self.apply_succeeded(&intent.id).await;
            }
            PaymentWebhookEvent::PaymentIntentFailed(intent) => {
                info!(payment_intent_id = %intent.id, "reconciliation: payment intent failed");
                let changes = UpdatePaymentEntity {
                    status: PaymentStatus::Failed.to_string(),
                    payment_method: None,
                    receipt_url: None,
                    updated_at: Utc::now(),
                };
                if let Some(existing) = self.existing_record(&intent.id).await {
                    self.update_record(existing, changes).await;
                }
            }
            PaymentWebhookEvent::Other { event_type } => {
                info!(%event_type, "reconciliation: unhandled event type, nothing to apply");
            }
        }
    }

    async fn apply_succeeded(&self, payment_intent_id: &str) {
        let Some(existing) = self.existing_record(payment_intent_id).await else {
            return;
        };

        // The webhook only says "something happened"; receipt details come from a fresh read.
        let intent = match self
            .payment_gateway
            .retrieve_payment_intent(payment_intent_id, &receipt_expansions())
            .await
        {
            Ok(intent) => intent,
            Err(err) => {
                error!(
                    payment_intent_id,
                    error = %err,
                    "reconciliation: failed to re-fetch succeeded payment intent"
                );
                return;
            }
        };

        let changes = UpdatePaymentEntity {
            status: PaymentStatus::Succeeded.to_string(),
            payment_method: intent.payment_method_type().map(str::to_string),
            receipt_url: intent.receipt_url().map(str::to_string),
            updated_at: Utc::now(),
        };
        self.update_record(existing, changes).await;
    }

    /// Looks the record up, treating an unreachable store and an absent record
    /// alike: logged, and no mutation follows.
    async fn existing_record(&self, payment_intent_id: &str) -> Option<PaymentEntity> {
        if !self.payment_repo.is_available().await {
            warn!(
                payment_intent_id,
                "reconciliation: payment store unavailable, webhook not applied"
            );
            return None;
        }

        match self.payment_repo.find_by_intent_id(payment_intent_id).await {
            Ok(Some(record)) => Some(record),
            Ok(None) => {
                warn!(
                    payment_intent_id,
                    "reconciliation: no payment record for intent, webhook not applied"
                );
                None
            }
            Err(err) => {
                warn!(
                    payment_intent_id,
                    db_error = ?err,
                    "reconciliation: failed to load payment record"
                );
                None
            }
        }
    }

    async fn update_record(&self, existing: PaymentEntity, changes: UpdatePaymentEntity) {
        let payment_intent_id = existing.payment_intent_id.as_str();

        // No ordering guard: a replayed older event still wins. Flag it so it shows up.
        let previous = existing.status.parse::<PaymentStatus>().ok();
        if previous.is_some_and(|status| status.is_terminal())
            && existing.status != changes.status
        {
            warn!(
                payment_intent_id,
                previous_status = %existing.status,
                new_status = %changes.status,
                "reconciliation: overwriting a terminal status"
            );
        }

        match self
            .payment_repo
            .update_by_intent_id(payment_intent_id, changes)
            .await
        {
            Ok(Some(record)) => info!(
                payment_intent_id,
                status = %record.status,
                payment_method = ?record.payment_method,
                receipt_url = ?record.receipt_url,
                "reconciliation: payment record updated"
            ),
            Ok(None) => warn!(
                payment_intent_id,
                "reconciliation: payment record vanished before update"
            ),
            Err(err) => warn!(
                payment_intent_id,
                db_error = ?err,
                "reconciliation: failed to update payment record"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::{
        payment_gateway::MockPaymentGateway,
        test_support::{InMemoryPaymentRepository, intent, succeeded_intent},
    };
    use serde_json::json;
    use std::sync::atomic::Ordering;
    use vtc_core::{
        domain::repositories::payments::MockPaymentRepository,
        payments::errors::PaymentGatewayError,
    };

    const RECEIPT: &str = "https://example/receipt";

    fn record(id: &str, status: PaymentStatus) -> PaymentEntity {
        let now = Utc::now();
        PaymentEntity {
            payment_intent_id: id.to_string(),
            amount_minor: 10000,
            currency: "eur".to_string(),
            status: status.to_string(),
            user_id: Some("u1".to_string()),
            ride_id: Some("r1".to_string()),
            payment_method: None,
            receipt_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn created(id: &'static str, status: &'static str) -> CreatedIntent<'static> {
        CreatedIntent {
            payment_intent_id: id,
            amount_minor: 10000,
            currency: "eur",
            user_id: Some("u1"),
            ride_id: Some("r1"),
            initial_status: status,
        }
    }

    fn succeeded_event(id: &str) -> PaymentWebhookEvent {
        PaymentWebhookEvent::PaymentIntentSucceeded(intent(json!({ "id": id, "status": "succeeded" })))
    }

    fn failed_event(id: &str) -> PaymentWebhookEvent {
        PaymentWebhookEvent::PaymentIntentFailed(intent(json!({ "id": id })))
    }

    fn gateway_returning_receipt(times: usize) -> MockPaymentGateway {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_retrieve_payment_intent()
            .withf(|id, expand| id == "pi_123" && expand.len() == 1 && expand[0] == "latest_charge")
            .times(times)
            .returning(|_, _| Ok(succeeded_intent("pi_123", RECEIPT)));
        gateway
    }

    #[test]
    fn receipt_lookups_expand_the_latest_charge() {
        assert_eq!(receipt_expansions(), vec!["latest_charge".to_string()]);
    }

    #[tokio::test]
    async fn records_created_intent_with_provider_status() {
        let repo = Arc::new(InMemoryPaymentRepository::default());
        let reconciler = PaymentReconciler::new(Arc::clone(&repo), Arc::new(MockPaymentGateway::new()));

        reconciler
            .record_intent_created(created("pi_123", "requires_payment_method"))
            .await;

        let stored = repo.get("pi_123").unwrap();
        assert_eq!(stored.amount_minor, 10000);
        assert_eq!(stored.currency, "eur");
        assert_eq!(stored.status, "requires_payment_method");
        assert_eq!(stored.ride_id.as_deref(), Some("r1"));
        assert_eq!(stored.user_id.as_deref(), Some("u1"));
    }

    #[tokio::test]
    async fn skips_creation_when_store_is_unavailable() {
        let mut repo = MockPaymentRepository::new();
        repo.expect_is_available().times(1).returning(|| false);
        repo.expect_upsert_by_intent_id().never();
        let reconciler = PaymentReconciler::new(Arc::new(repo), Arc::new(MockPaymentGateway::new()));

        reconciler
            .record_intent_created(created("pi_123", "requires_payment_method"))
            .await;
    }

    #[tokio::test]
    async fn swallows_store_errors_during_creation() {
        let mut repo = MockPaymentRepository::new();
        repo.expect_is_available().returning(|| true);
        repo.expect_upsert_by_intent_id()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("connection reset by peer")));
        let reconciler = PaymentReconciler::new(Arc::new(repo), Arc::new(MockPaymentGateway::new()));

        reconciler
            .record_intent_created(created("pi_123", "requires_payment_method"))
            .await;
    }

    #[tokio::test]
    async fn skips_creation_for_statuses_outside_the_record_enum() {
        let mut repo = MockPaymentRepository::new();
        repo.expect_is_available().never();
        repo.expect_upsert_by_intent_id().never();
        let reconciler = PaymentReconciler::new(Arc::new(repo), Arc::new(MockPaymentGateway::new()));

        reconciler
            .record_intent_created(created("pi_123", "requires_action"))
            .await;
    }

    #[tokio::test]
    async fn succeeded_event_refetches_and_stores_receipt_and_method() {
        let repo = Arc::new(InMemoryPaymentRepository::default());
        repo.seed(record("pi_123", PaymentStatus::RequiresPaymentMethod));
        let reconciler = PaymentReconciler::new(Arc::clone(&repo), Arc::new(gateway_returning_receipt(1)));

        reconciler.apply_webhook_event(succeeded_event("pi_123")).await;

        let stored = repo.get("pi_123").unwrap();
        assert_eq!(stored.status, "succeeded");
        assert_eq!(stored.receipt_url.as_deref(), Some(RECEIPT));
        assert_eq!(stored.payment_method.as_deref(), Some("card"));
    }

    #[tokio::test]
    async fn applying_the_same_succeeded_event_twice_is_harmless() {
        let repo = Arc::new(InMemoryPaymentRepository::default());
        repo.seed(record("pi_123", PaymentStatus::RequiresPaymentMethod));
        let reconciler = PaymentReconciler::new(Arc::clone(&repo), Arc::new(gateway_returning_receipt(2)));

        reconciler.apply_webhook_event(succeeded_event("pi_123")).await;
        let first = repo.get("pi_123").unwrap();
        reconciler.apply_webhook_event(succeeded_event("pi_123")).await;
        let second = repo.get("pi_123").unwrap();

        assert_eq!(second.status, "succeeded");
        assert_eq!(second.receipt_url, first.receipt_url);
        assert_eq!(second.payment_method, first.payment_method);
        assert_eq!(second.amount_minor, first.amount_minor);
    }

    #[tokio::test]
    async fn event_for_unknown_intent_is_a_no_op() {
        let mut repo = MockPaymentRepository::new();
        repo.expect_is_available().returning(|| true);
        repo.expect_find_by_intent_id()
            .withf(|id| id == "pi_unknown")
            .times(2)
            .returning(|_| Ok(None));
        repo.expect_update_by_intent_id().never();
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_retrieve_payment_intent().never();
        let reconciler = PaymentReconciler::new(Arc::new(repo), Arc::new(gateway));

        reconciler.apply_webhook_event(succeeded_event("pi_unknown")).await;
        reconciler.apply_webhook_event(failed_event("pi_unknown")).await;
    }

    #[tokio::test]
    async fn webhook_during_store_outage_is_logged_and_dropped() {
        let repo = Arc::new(InMemoryPaymentRepository::offline());
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_retrieve_payment_intent().never();
        let reconciler = PaymentReconciler::new(Arc::clone(&repo), Arc::new(gateway));

        reconciler.apply_webhook_event(succeeded_event("pi_123")).await;

        assert_eq!(repo.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_event_updates_status_without_refetching() {
        let repo = Arc::new(InMemoryPaymentRepository::default());
        repo.seed(record("pi_123", PaymentStatus::Processing));
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_retrieve_payment_intent().never();
        let reconciler = PaymentReconciler::new(Arc::clone(&repo), Arc::new(gateway));

        reconciler.apply_webhook_event(failed_event("pi_123")).await;

        let stored = repo.get("pi_123").unwrap();
        assert_eq!(stored.status, "failed");
        assert_eq!(stored.receipt_url, None);
    }

    #[tokio::test]
    async fn refetch_failure_leaves_record_untouched() {
        let repo = Arc::new(InMemoryPaymentRepository::default());
        repo.seed(record("pi_123", PaymentStatus::RequiresPaymentMethod));
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_retrieve_payment_intent()
            .times(1)
            .returning(|_, _| Err(PaymentGatewayError::provider("api unreachable")));
        let reconciler = PaymentReconciler::new(Arc::clone(&repo), Arc::new(gateway));

        reconciler.apply_webhook_event(succeeded_event("pi_123")).await;

        assert_eq!(repo.get("pi_123").unwrap().status, "requires_payment_method");
        assert_eq!(repo.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn other_events_touch_nothing() {
        let mut repo = MockPaymentRepository::new();
        repo.expect_is_available().never();
        repo.expect_find_by_intent_id().never();
        let reconciler = PaymentReconciler::new(Arc::new(repo), Arc::new(MockPaymentGateway::new()));

        reconciler
            .apply_webhook_event(PaymentWebhookEvent::Other {
                event_type: "charge.refunded".to_string(),
            })
            .await;
    }

    #[tokio::test]
    async fn stale_failed_event_still_overwrites_succeeded() {
        let repo = Arc::new(InMemoryPaymentRepository::default());
        let mut succeeded = record("pi_123", PaymentStatus::Succeeded);
        succeeded.receipt_url = Some(RECEIPT.to_string());
        repo.seed(succeeded);
        let reconciler = PaymentReconciler::new(Arc::clone(&repo), Arc::new(MockPaymentGateway::new()));

        reconciler.apply_webhook_event(failed_event("pi_123")).await;

        let stored = repo.get("pi_123").unwrap();
        assert_eq!(stored.status, "failed");
        assert_eq!(stored.receipt_url.as_deref(), Some(RECEIPT));
    }
}
