use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::infra::db::postgres::schema::payments;

/// Durable record of one payment attempt, keyed by the provider's intent id.
#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = payments)]
#[diesel(primary_key(payment_intent_id))]
pub struct PaymentEntity {
    pub payment_intent_id: String,
    pub amount_minor: i64,
    pub currency: String,
    pub status: String,
    pub user_id: Option<String>,
    pub ride_id: Option<String>,
    pub payment_method: Option<String>,
    pub receipt_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = payments)]
pub struct InsertPaymentEntity {
    pub payment_intent_id: String,
    pub amount_minor: i64,
    pub currency: String,
    pub status: String,
    pub user_id: Option<String>,
    pub ride_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Targeted webhook-driven mutation. `None` fields are left untouched.
#[derive(Debug, Clone, PartialEq, AsChangeset)]
#[diesel(table_name = payments)]
pub struct UpdatePaymentEntity {
    pub status: String,
    pub payment_method: Option<String>,
    pub receipt_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}
