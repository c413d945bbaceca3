use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;

use crate::domain::entities::payments::{InsertPaymentEntity, PaymentEntity, UpdatePaymentEntity};

/// Returned (wrapped in `anyhow`) by store calls made while no database is reachable.
#[derive(Debug, Error)]
#[error("payment record store is unavailable")]
pub struct StorageUnavailable;

/// Best-effort persistence for payment records. Callers must treat every method as
/// fallible and never let a store failure fail a payment operation.
#[automock]
#[async_trait]
pub trait PaymentRepository {
    async fn is_available(&self) -> bool;

    async fn upsert_by_intent_id(&self, payment: InsertPaymentEntity) -> Result<PaymentEntity>;

    async fn find_by_intent_id(&self, payment_intent_id: &str) -> Result<Option<PaymentEntity>>;

    /// Returns `None` when no record carries `payment_intent_id`.
    async fn update_by_intent_id(
        &self,
        payment_intent_id: &str,
        changes: UpdatePaymentEntity,
    ) -> Result<Option<PaymentEntity>>;
}
