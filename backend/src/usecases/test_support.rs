use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use vtc_core::{
    domain::{
        entities::payments::{InsertPaymentEntity, PaymentEntity, UpdatePaymentEntity},
        repositories::payments::{PaymentRepository, StorageUnavailable},
    },
    payments::types::PaymentIntent,
};

/// Store fake that keeps records in memory and can be switched offline.
#[derive(Default)]
pub struct InMemoryPaymentRepository {
    records: Mutex<HashMap<String, PaymentEntity>>,
    offline: AtomicBool,
    pub writes: AtomicUsize,
}

impl InMemoryPaymentRepository {
    pub fn offline() -> Self {
        let repo = Self::default();
        repo.offline.store(true, Ordering::SeqCst);
        repo
    }

    pub fn seed(&self, record: PaymentEntity) {
        self.records
            .lock()
            .unwrap()
            .insert(record.payment_intent_id.clone(), record);
    }

    pub fn get(&self, payment_intent_id: &str) -> Option<PaymentEntity> {
        self.records.lock().unwrap().get(payment_intent_id).cloned()
    }

    fn ensure_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StorageUnavailable.into());
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentRepository for InMemoryPaymentRepository {
    async fn is_available(&self) -> bool {
        !self.offline.load(Ordering::SeqCst)
    }

    async fn upsert_by_intent_id(&self, payment: InsertPaymentEntity) -> Result<PaymentEntity> {
        self.ensure_online()?;
        self.writes.fetch_add(1, Ordering::SeqCst);

        let mut records = self.records.lock().unwrap();
        let record = match records.get(&payment.payment_intent_id) {
            Some(existing) => PaymentEntity {
                amount_minor: payment.amount_minor,
                currency: payment.currency,
                status: payment.status,
                user_id: payment.user_id,
                ride_id: payment.ride_id,
                updated_at: payment.updated_at,
                ..existing.clone()
            },
            None => PaymentEntity {
                payment_intent_id: payment.payment_intent_id,
                amount_minor: payment.amount_minor,
                currency: payment.currency,
                status: payment.status,
                user_id: payment.user_id,
                ride_id: payment.ride_id,
                payment_method: None,
                receipt_url: None,
                created_at: payment.created_at,
                updated_at: payment.updated_at,
            },
        };
        records.insert(record.payment_intent_id.clone(), record.clone());
        Ok(record)
    }

    async fn find_by_intent_id(&self, payment_intent_id: &str) -> Result<Option<PaymentEntity>> {
        self.ensure_online()?;
        Ok(self.get(payment_intent_id))
    }

    async fn update_by_intent_id(
        &self,
        payment_intent_id: &str,
        changes: UpdatePaymentEntity,
    ) -> Result<Option<PaymentEntity>> {
        self.ensure_online()?;

        let mut records = self.records.lock().unwrap();
        let Some(record) = records.get_mut(payment_intent_id) else {
            return Ok(None);
        };
        self.writes.fetch_add(1, Ordering::SeqCst);
        record.status = changes.status;
        if changes.payment_method.is_some() {
            record.payment_method = changes.payment_method;
        }
        if changes.receipt_url.is_some() {
            record.receipt_url = changes.receipt_url;
        }
        record.updated_at = changes.updated_at;
        Ok(Some(record.clone()))
    }
}

pub fn intent(value: serde_json::Value) -> PaymentIntent {
    serde_json::from_value(value).unwrap()
}

pub fn created_intent(id: &str, client_secret: &str) -> PaymentIntent {
    intent(json!({
        "id": id,
        "client_secret": client_secret,
        "status": "requires_payment_method",
        "payment_method_types": ["card"]
    }))
}

pub fn succeeded_intent(id: &str, receipt_url: &str) -> PaymentIntent {
    intent(json!({
        "id": id,
        "status": "succeeded",
        "payment_method_types": ["card"],
        "latest_charge": { "id": "ch_1", "receipt_url": receipt_url }
    }))
}
