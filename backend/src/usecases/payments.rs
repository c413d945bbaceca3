use std::sync::Arc;

use axum::http::StatusCode;
use thiserror::Error;
use tracing::{error, info, warn};
use vtc_core::{
    domain::{
        repositories::payments::PaymentRepository,
        value_objects::payments::{
            CreatePaymentIntentModel, PaymentIntentCreatedDto, PaymentStatusDto,
        },
    },
    payments::{errors::PaymentGatewayError, types::PaymentWebhookEvent},
};

use crate::usecases::{
    payment_gateway::PaymentGateway,
    payment_reconciliation::{CreatedIntent, PaymentReconciler, receipt_expansions},
};

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("payment intent not found: {0}")]
    NotFound(String),
    #[error("payment provider error: {0}")]
    PaymentProvider(String),
    #[error("{0}")]
    SignatureInvalid(String),
}

impl PaymentError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PaymentError::InvalidRequest(_) | PaymentError::SignatureInvalid(_) => {
                StatusCode::BAD_REQUEST
            }
            PaymentError::NotFound(_) => StatusCode::NOT_FOUND,
            PaymentError::PaymentProvider(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Human-readable part of the error, without the category prefix.
    pub fn message(&self) -> String {
        match self {
            PaymentError::InvalidRequest(message)
            | PaymentError::PaymentProvider(message)
            | PaymentError::SignatureInvalid(message) => message.clone(),
            PaymentError::NotFound(_) => self.to_string(),
        }
    }
}

impl From<PaymentGatewayError> for PaymentError {
    fn from(err: PaymentGatewayError) -> Self {
        match err {
            PaymentGatewayError::NotFound(id) => PaymentError::NotFound(id),
            PaymentGatewayError::SignatureInvalid(_) | PaymentGatewayError::MalformedEvent(_) => {
                PaymentError::SignatureInvalid(err.to_string())
            }
            PaymentGatewayError::Provider { message, .. } => PaymentError::PaymentProvider(message),
            PaymentGatewayError::WebhooksDisabled => PaymentError::PaymentProvider(err.to_string()),
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, PaymentError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Processed { event_type: String },
    /// No webhook secret configured: acknowledged so the provider stops retrying, but
    /// the payload was neither verified nor applied.
    WebhooksDisabled,
}

pub struct PaymentUseCase<R, G>
where
    R: PaymentRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    payment_gateway: Arc<G>,
    reconciler: PaymentReconciler<R, G>,
}

impl<R, G> PaymentUseCase<R, G>
where
    R: PaymentRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    pub fn new(payment_repo: Arc<R>, payment_gateway: Arc<G>) -> Self {
        Self {
            reconciler: PaymentReconciler::new(payment_repo, Arc::clone(&payment_gateway)),
            payment_gateway,
        }
    }

    pub async fn create_payment_intent(
        &self,
        model: CreatePaymentIntentModel,
    ) -> UseCaseResult<PaymentIntentCreatedDto> {
        let request = model.validate().map_err(|message| {
            let err = PaymentError::InvalidRequest(message);
            warn!(
                status = err.status_code().as_u16(),
                error = %err,
                "payments: invalid create payment intent request"
            );
            err
        })?;

        info!(
            amount_minor = request.amount_minor,
            currency = %request.currency,
            ride_id = ?request.metadata.ride_id(),
            user_id = ?request.metadata.user_id(),
            "payments: creating payment intent"
        );

        let intent = self
            .payment_gateway
            .create_payment_intent(&request)
            .await
            .map_err(|err| {
                error!(
                    amount_minor = request.amount_minor,
                    currency = %request.currency,
                    error = %err,
                    "payments: stripe payment intent creation failed"
                );
                PaymentError::from(err)
            })?;

        let client_secret = intent.client_secret.clone().ok_or_else(|| {
            error!(
                payment_intent_id = %intent.id,
                "payments: stripe returned a payment intent without client secret"
            );
            PaymentError::PaymentProvider("payment intent has no client secret".to_string())
        })?;

        self.reconciler
            .record_intent_created(CreatedIntent {
                payment_intent_id: &intent.id,
                amount_minor: request.amount_minor,
                currency: &request.currency,
                user_id: request.metadata.user_id(),
                ride_id: request.metadata.ride_id(),
                initial_status: &intent.status,
            })
            .await;

        info!(
            payment_intent_id = %intent.id,
            status = %intent.status,
            "payments: payment intent created"
        );

        Ok(PaymentIntentCreatedDto {
            client_secret,
            payment_intent_id: intent.id,
        })
    }

    pub async fn get_payment_status(&self, payment_intent_id: &str) -> UseCaseResult<PaymentStatusDto> {
        let intent = self
            .payment_gateway
            .retrieve_payment_intent(payment_intent_id, &receipt_expansions())
            .await
            .map_err(|err| {
                error!(
                    payment_intent_id,
                    error = %err,
                    "payments: failed to retrieve payment intent"
                );
                PaymentError::from(err)
            })?;

        Ok(PaymentStatusDto {
            receipt_url: intent.receipt_url().map(str::to_string),
            status: intent.status,
        })
    }

    pub async fn handle_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> UseCaseResult<WebhookOutcome> {
        let event = match self.payment_gateway.verify_webhook_event(payload, signature) {
            Ok(event) => event,
            Err(PaymentGatewayError::WebhooksDisabled) => {
                warn!("payments: STRIPE_WEBHOOK_SECRET is not set, webhook acknowledged but ignored");
                return Ok(WebhookOutcome::WebhooksDisabled);
            }
            Err(err) => {
                let err = PaymentError::from(err);
                warn!(
                    status = err.status_code().as_u16(),
                    error = %err,
                    "payments: stripe webhook verification failed"
                );
                return Err(err);
            }
        };

        info!(
            event_id = ?event.id,
            event_type = %event.type_,
            "payments: stripe webhook verified"
        );

        let event = PaymentWebhookEvent::from(event);
        let event_type = event.event_type().to_string();
        self.reconciler.apply_webhook_event(event).await;

        Ok(WebhookOutcome::Processed { event_type })
    }
}
