use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_CURRENCY: &str = "eur";
pub const RIDE_ID_METADATA_KEY: &str = "rideId";
pub const USER_ID_METADATA_KEY: &str = "userId";

/// Body of `POST /api/payments/create-payment-intent`. `amount` stays untyped so a
/// non-numeric value is reported as a validation error instead of a parse failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentIntentModel {
    pub amount: Option<Value>,
    pub currency: Option<String>,
    pub ride_id: Option<String>,
    pub user_id: Option<String>,
}

/// A validated intent-creation request, ready for the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPaymentIntent {
    pub amount_minor: i64,
    pub currency: String,
    pub metadata: IntentMetadata,
}

impl CreatePaymentIntentModel {
    pub fn validate(self) -> Result<NewPaymentIntent, String> {
        let amount_minor = match self.amount {
            Some(Value::Number(number)) => number
                .as_i64()
                .filter(|amount| *amount > 0)
                .ok_or_else(|| "amount must be a positive integer in minor units".to_string())?,
            Some(_) | None => return Err("amount is required and must be a number".to_string()),
        };

        let currency = self
            .currency
            .map(|currency| currency.trim().to_ascii_lowercase())
            .filter(|currency| !currency.is_empty())
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

        Ok(NewPaymentIntent {
            amount_minor,
            currency,
            metadata: IntentMetadata::for_ride(self.ride_id, self.user_id),
        })
    }
}

/// Metadata attached to a provider intent. Known keys are always present; a missing
/// value is kept as an explicit `None` rather than dropping the key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntentMetadata(BTreeMap<String, Option<String>>);

impl IntentMetadata {
    pub fn for_ride(ride_id: Option<String>, user_id: Option<String>) -> Self {
        let mut metadata = Self::default();
        metadata.insert(RIDE_ID_METADATA_KEY, ride_id);
        metadata.insert(USER_ID_METADATA_KEY, user_id);
        metadata
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Option<String>) {
        let value = value.filter(|value| !value.trim().is_empty());
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|value| value.as_deref())
    }

    pub fn ride_id(&self) -> Option<&str> {
        self.get(RIDE_ID_METADATA_KEY)
    }

    pub fn user_id(&self) -> Option<&str> {
        self.get(USER_ID_METADATA_KEY)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.0
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_deref()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentCreatedDto {
    pub client_secret: String,
    pub payment_intent_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusDto {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookAckDto {
    pub received: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}
