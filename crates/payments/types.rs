use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

pub const PAYMENT_INTENT_SUCCEEDED: &str = "payment_intent.succeeded";
pub const PAYMENT_INTENT_PAYMENT_FAILED: &str = "payment_intent.payment_failed";

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub type_: String,
    pub created: Option<i64>,
    pub livemode: Option<bool>,
    pub data: StripeEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    pub object: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: Option<String>,
    #[serde(default)]
    pub status: String,
    pub amount: Option<i64>,
    pub currency: Option<String>,
    #[serde(default)]
    pub payment_method_types: Vec<String>,
    /// Only present on older API versions, or when expanded.
    pub charges: Option<ChargeList>,
    pub latest_charge: Option<ExpandableCharge>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChargeList {
    #[serde(default)]
    pub data: Vec<Charge>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Charge {
    pub id: Option<String>,
    pub receipt_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ExpandableCharge {
    Id(String),
    Object(Charge),
}

impl PaymentIntent {
    /// Receipt of the first charge in the list, falling back to an expanded
    /// `latest_charge` when the list is absent.
    pub fn receipt_url(&self) -> Option<&str> {
        self.charges
            .as_ref()
            .and_then(|charges| charges.data.first())
            .and_then(|charge| charge.receipt_url.as_deref())
            .or_else(|| match self.latest_charge.as_ref() {
                Some(ExpandableCharge::Object(charge)) => charge.receipt_url.as_deref(),
                _ => None,
            })
    }

    pub fn payment_method_type(&self) -> Option<&str> {
        self.payment_method_types.first().map(String::as_str)
    }
}

/// A verified provider event, narrowed to the cases reconciliation acts on.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentWebhookEvent {
    PaymentIntentSucceeded(PaymentIntent),
    PaymentIntentFailed(PaymentIntent),
    Other { event_type: String },
}

impl PaymentWebhookEvent {
    pub fn event_type(&self) -> &str {
        match self {
            PaymentWebhookEvent::PaymentIntentSucceeded(_) => PAYMENT_INTENT_SUCCEEDED,
            PaymentWebhookEvent::PaymentIntentFailed(_) => PAYMENT_INTENT_PAYMENT_FAILED,
            PaymentWebhookEvent::Other { event_type } => event_type,
        }
    }
}

impl From<StripeEvent> for PaymentWebhookEvent {
    fn from(event: StripeEvent) -> Self {
        let StripeEvent { id, type_, data, .. } = event;
        let wrap: fn(PaymentIntent) -> PaymentWebhookEvent = match type_.as_str() {
            PAYMENT_INTENT_SUCCEEDED => PaymentWebhookEvent::PaymentIntentSucceeded,
            PAYMENT_INTENT_PAYMENT_FAILED => PaymentWebhookEvent::PaymentIntentFailed,
            _ => return PaymentWebhookEvent::Other { event_type: type_ },
        };

        match serde_json::from_value::<PaymentIntent>(data.object) {
            Ok(intent) => wrap(intent),
            Err(err) => {
                warn!(
                    event_id = ?id,
                    event_type = %type_,
                    error = %err,
                    "stripe: event object is not a payment intent"
                );
                PaymentWebhookEvent::Other { event_type: type_ }
            }
        }
    }
}
