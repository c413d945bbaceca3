use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{
    StatusCode,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, error, warn};

use crate::{
    domain::value_objects::payments::NewPaymentIntent,
    payments::{
        errors::PaymentGatewayError,
        types::{PaymentIntent, StripeEvent},
    },
};

type HmacSha256 = Hmac<Sha256>;
type GatewayResult<T> = std::result::Result<T, PaymentGatewayError>;

pub const DEFAULT_API_BASE: &str = "https://api.stripe.com";
pub const DEFAULT_WEBHOOK_TOLERANCE_SECS: i64 = 300;

/// Minimal Stripe client built on reqwest. Both secrets are optional: without a secret
/// key every API call fails fast, without a webhook secret events are never trusted.
pub struct StripeClient {
    http: reqwest::Client,
    api_base: String,
    secret_key: Option<String>,
    webhook_secret: Option<String>,
    webhook_tolerance_secs: i64,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorDetails,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetails {
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<String>,
    message: Option<String>,
    param: Option<String>,
    decline_code: Option<String>,
}

impl StripeClient {
    pub fn new(secret_key: Option<String>, webhook_secret: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            secret_key,
            webhook_secret,
            webhook_tolerance_secs: DEFAULT_WEBHOOK_TOLERANCE_SECS,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_webhook_tolerance(mut self, tolerance_secs: i64) -> Self {
        self.webhook_tolerance_secs = tolerance_secs;
        self
    }

    pub fn payments_enabled(&self) -> bool {
        self.secret_key.is_some()
    }

    pub fn webhooks_enabled(&self) -> bool {
        self.webhook_secret.is_some()
    }

    fn secret_key(&self) -> GatewayResult<&str> {
        self.secret_key
            .as_deref()
            .ok_or_else(|| PaymentGatewayError::provider("payment provider is not configured"))
    }

    async fn ensure_success(
        resp: reqwest::Response,
        context: &str,
    ) -> GatewayResult<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let request_id = resp
            .headers()
            .get("request-id")
            .or_else(|| resp.headers().get("stripe-request-id"))
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let details = serde_json::from_str::<StripeErrorEnvelope>(&body)
            .ok()
            .map(|envelope| envelope.error);

        error!(
            status = %status,
            stripe_request_id = ?request_id,
            stripe_error_type = ?details.as_ref().and_then(|d| d.type_.as_deref()),
            stripe_error_code = ?details.as_ref().and_then(|d| d.code.as_deref()),
            stripe_error_param = ?details.as_ref().and_then(|d| d.param.as_deref()),
            stripe_decline_code = ?details.as_ref().and_then(|d| d.decline_code.as_deref()),
            response_body = %body,
            context = %context,
            "stripe: api request failed"
        );

        let (code, message) = match details {
            Some(details) => (details.code, details.message),
            None => (None, None),
        };

        Err(PaymentGatewayError::Provider {
            status: Some(status.as_u16()),
            code,
            message: message.unwrap_or_else(|| {
                format!(
                    "Stripe API request failed: {context} ({})",
                    status.canonical_reason().unwrap_or("unknown status")
                )
            }),
        })
    }

    /// Creates a PaymentIntent with automatic payment methods enabled.
    /// https://stripe.com/docs/api/payment_intents/create
    pub async fn create_payment_intent(
        &self,
        intent: &NewPaymentIntent,
    ) -> GatewayResult<PaymentIntent> {
        let secret_key = self.secret_key()?;
        let body = payment_intent_form(intent);

        let resp = self
            .http
            .post(format!("{}/v1/payment_intents", self.api_base))
            .header(AUTHORIZATION, format!("Bearer {}", secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(&body)
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "create payment intent").await?;

        let parsed: PaymentIntent = resp.json().await?;
        Ok(parsed)
    }

    /// https://stripe.com/docs/api/payment_intents/retrieve
    pub async fn retrieve_payment_intent(
        &self,
        payment_intent_id: &str,
        expand: &[String],
    ) -> GatewayResult<PaymentIntent> {
        let secret_key = self.secret_key()?;
        let query: Vec<(&str, &str)> = expand
            .iter()
            .map(|field| ("expand[]", field.as_str()))
            .collect();

        let resp = self
            .http
            .get(format!(
                "{}/v1/payment_intents/{}",
                self.api_base, payment_intent_id
            ))
            .header(AUTHORIZATION, format!("Bearer {}", secret_key))
            .query(&query)
            .send()
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            warn!(payment_intent_id, "stripe: payment intent not found");
            return Err(PaymentGatewayError::NotFound(payment_intent_id.to_string()));
        }
        let resp = Self::ensure_success(resp, "retrieve payment intent").await?;

        let parsed: PaymentIntent = resp.json().await?;
        Ok(parsed)
    }

    /// Verifies the `Stripe-Signature` header against the configured webhook secret.
    /// https://stripe.com/docs/webhooks/signatures
    pub fn verify_webhook_event(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> GatewayResult<StripeEvent> {
        let webhook_secret = self
            .webhook_secret
            .as_deref()
            .ok_or(PaymentGatewayError::WebhooksDisabled)?;

        construct_event(
            payload,
            signature_header,
            webhook_secret,
            self.webhook_tolerance_secs,
            Utc::now().timestamp(),
        )
    }
}

/// Form body for a PaymentIntent. Every metadata key is sent; a missing value goes
/// out as the empty string, which Stripe stores as "no value".
pub fn payment_intent_form(intent: &NewPaymentIntent) -> Vec<(String, String)> {
    let mut body: Vec<(String, String)> = vec![
        ("amount".to_string(), intent.amount_minor.to_string()),
        ("currency".to_string(), intent.currency.clone()),
        (
            "automatic_payment_methods[enabled]".to_string(),
            "true".to_string(),
        ),
    ];

    for (key, value) in intent.metadata.iter() {
        body.push((
            format!("metadata[{}]", key),
            value.unwrap_or_default().to_string(),
        ));
    }

    body
}

/// Checks a signature header of the form `t=<unix>,v1=<hex>[,v1=<hex>...]` and parses
/// the payload once it is trusted.
pub fn construct_event(
    payload: &[u8],
    signature_header: &str,
    webhook_secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> GatewayResult<StripeEvent> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in signature_header.split(',') {
        let part = part.trim();
        if let Some(rest) = part.strip_prefix("t=") {
            timestamp = Some(rest);
        } else if let Some(rest) = part.strip_prefix("v1=") {
            signatures.push(rest);
        }
    }

    let timestamp = timestamp.ok_or_else(|| {
        PaymentGatewayError::SignatureInvalid("missing timestamp in stripe-signature".into())
    })?;
    if signatures.is_empty() {
        return Err(PaymentGatewayError::SignatureInvalid(
            "missing v1 in stripe-signature".into(),
        ));
    }

    let signed_at: i64 = timestamp.parse().map_err(|_| {
        PaymentGatewayError::SignatureInvalid("timestamp in stripe-signature is not a number".into())
    })?;
    let within_tolerance = now
        .checked_sub(signed_at)
        .map(i64::unsigned_abs)
        .is_some_and(|age| age <= tolerance_secs.unsigned_abs());
    if !within_tolerance {
        return Err(PaymentGatewayError::SignatureInvalid(
            "timestamp outside the tolerance zone".into(),
        ));
    }

    let mut mac = HmacSha256::new_from_slice(webhook_secret.as_bytes())
        .map_err(|err| PaymentGatewayError::SignatureInvalid(err.to_string()))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);

    let matched = signatures.iter().any(|signature| {
        hex::decode(signature)
            .map(|provided| mac.clone().verify_slice(&provided).is_ok())
            .unwrap_or(false)
    });
    if !matched {
        return Err(PaymentGatewayError::SignatureInvalid(
            "no signatures found matching the expected signature for payload".into(),
        ));
    }

    debug!(signed_at, "stripe: webhook signature verified");

    serde_json::from_slice::<StripeEvent>(payload)
        .map_err(|err| PaymentGatewayError::MalformedEvent(err.to_string()))
}
