use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{RunQueryDsl, insert_into, prelude::*, update, upsert::excluded};
use tracing::warn;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::payments},
};
use domain::{
    entities::payments::{InsertPaymentEntity, PaymentEntity, UpdatePaymentEntity},
    repositories::payments::{PaymentRepository, StorageUnavailable},
};

const AVAILABILITY_PROBE_TIMEOUT: Duration = Duration::from_millis(1500);

pub struct PaymentPostgres {
    db_pool: Option<Arc<PgPoolSquad>>,
}

impl PaymentPostgres {
    pub fn new(db_pool: Option<Arc<PgPoolSquad>>) -> Self {
        Self { db_pool }
    }

    fn pool(&self) -> Result<&Arc<PgPoolSquad>> {
        self.db_pool
            .as_ref()
            .ok_or_else(|| anyhow::Error::new(StorageUnavailable))
    }
}

#[async_trait]
impl PaymentRepository for PaymentPostgres {
    async fn is_available(&self) -> bool {
        let Some(pool) = self.db_pool.as_ref() else {
            return false;
        };

        let pool = Arc::clone(pool);
        match tokio::task::spawn_blocking(move || pool.get_timeout(AVAILABILITY_PROBE_TIMEOUT))
            .await
        {
            Ok(Ok(_conn)) => true,
            Ok(Err(err)) => {
                warn!(db_error = %err, "payments store: no connection available");
                false
            }
            Err(err) => {
                warn!(error = %err, "payments store: availability probe aborted");
                false
            }
        }
    }

    async fn upsert_by_intent_id(&self, payment: InsertPaymentEntity) -> Result<PaymentEntity> {
        let pool = Arc::clone(self.pool()?);

        tokio::task::spawn_blocking(move || -> Result<PaymentEntity> {
            let mut conn = pool.get()?;

            let record = insert_into(payments::table)
                .values(&payment)
                .on_conflict(payments::payment_intent_id)
                .do_update()
                .set((
                    payments::amount_minor.eq(excluded(payments::amount_minor)),
                    payments::currency.eq(excluded(payments::currency)),
                    payments::status.eq(excluded(payments::status)),
                    payments::user_id.eq(excluded(payments::user_id)),
                    payments::ride_id.eq(excluded(payments::ride_id)),
                    payments::updated_at.eq(Utc::now()),
                ))
                .returning(PaymentEntity::as_returning())
                .get_result::<PaymentEntity>(&mut conn)?;

            Ok(record)
        })
        .await?
    }

    async fn find_by_intent_id(&self, payment_intent_id: &str) -> Result<Option<PaymentEntity>> {
        let pool = Arc::clone(self.pool()?);
        let payment_intent_id = payment_intent_id.to_string();

        tokio::task::spawn_blocking(move || -> Result<Option<PaymentEntity>> {
            let mut conn = pool.get()?;

            let record = payments::table
                .filter(payments::payment_intent_id.eq(&payment_intent_id))
                .select(PaymentEntity::as_select())
                .first::<PaymentEntity>(&mut conn)
                .optional()?;

            Ok(record)
        })
        .await?
    }

    async fn update_by_intent_id(
        &self,
        payment_intent_id: &str,
        changes: UpdatePaymentEntity,
    ) -> Result<Option<PaymentEntity>> {
        let pool = Arc::clone(self.pool()?);
        let payment_intent_id = payment_intent_id.to_string();

        tokio::task::spawn_blocking(move || -> Result<Option<PaymentEntity>> {
            let mut conn = pool.get()?;

            let record = update(payments::table)
                .filter(payments::payment_intent_id.eq(&payment_intent_id))
                .set(&changes)
                .returning(PaymentEntity::as_returning())
                .get_result::<PaymentEntity>(&mut conn)
                .optional()?;

            Ok(record)
        })
        .await?
    }
}
