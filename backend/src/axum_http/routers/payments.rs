use crate::usecases::{
    payment_gateway::PaymentGateway,
    payments::{PaymentError, PaymentUseCase, WebhookOutcome},
};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use std::sync::Arc;
use tracing::warn;
use vtc_core::domain::{
    repositories::payments::PaymentRepository,
    value_objects::payments::{CreatePaymentIntentModel, WebhookAckDto},
};

pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

pub fn routes<R, G>(payments_usecase: Arc<PaymentUseCase<R, G>>) -> Router
where
    R: PaymentRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    Router::new()
        .route("/create-payment-intent", post(create_payment_intent::<R, G>))
        .route("/payment-status/:id", get(get_payment_status::<R, G>))
        .route("/webhook", post(handle_webhook::<R, G>))
        .with_state(payments_usecase)
}

pub async fn create_payment_intent<R, G>(
    State(payments_usecase): State<Arc<PaymentUseCase<R, G>>>,
    payload: Result<Json<CreatePaymentIntentModel>, JsonRejection>,
) -> Response
where
    R: PaymentRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    let Json(create_model) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!(
                error = %rejection.body_text(),
                "payments: rejected create payment intent body"
            );
            return PaymentError::InvalidRequest("invalid request body".to_string())
                .into_response();
        }
    };

    match payments_usecase.create_payment_intent(create_model).await {
        Ok(created) => (StatusCode::OK, Json(created)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn get_payment_status<R, G>(
    State(payments_usecase): State<Arc<PaymentUseCase<R, G>>>,
    Path(payment_intent_id): Path<String>,
) -> Response
where
    R: PaymentRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    match payments_usecase.get_payment_status(&payment_intent_id).await {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Takes the raw body: the signature covers the exact bytes the provider sent.
pub async fn handle_webhook<R, G>(
    State(payments_usecase): State<Arc<PaymentUseCase<R, G>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    R: PaymentRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    match payments_usecase.handle_webhook(&body, signature).await {
        Ok(WebhookOutcome::Processed { .. }) => (
            StatusCode::OK,
            Json(WebhookAckDto {
                received: true,
                warning: None,
            }),
        )
            .into_response(),
        Ok(WebhookOutcome::WebhooksDisabled) => (
            StatusCode::OK,
            Json(WebhookAckDto {
                received: true,
                warning: Some("Webhook secret not configured".to_string()),
            }),
        )
            .into_response(),
        Err(err @ (PaymentError::SignatureInvalid(_) | PaymentError::InvalidRequest(_))) => (
            StatusCode::BAD_REQUEST,
            format!("Webhook Error: {}", err.message()),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}
